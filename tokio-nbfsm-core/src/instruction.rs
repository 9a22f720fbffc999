/// Result of a state entry or exit action.
///
/// Returning [`Instruction::TransitionTo`] makes the engine attempt a further
/// transition to that state within the same processing turn, before any other
/// queued event is looked at.
///
/// # Example
///
/// ```rust
/// # use tokio_nbfsm_core::Instruction;
/// # #[derive(Debug, PartialEq)] enum Light { Red }
/// fn on_fault() -> Instruction<Light> {
///     Instruction::to(Light::Red)
/// }
/// assert_eq!(on_fault(), Instruction::TransitionTo(Light::Red));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Instruction<S> {
    /// Nothing further to do.
    #[default]
    Nothing,
    /// Immediately attempt a transition to the given state.
    TransitionTo(S),
}

impl<S> Instruction<S> {
    /// Requests a chained transition to `state`.
    #[must_use]
    pub fn to(state: S) -> Self {
        Self::TransitionTo(state)
    }

    /// The inert instruction.
    #[must_use]
    pub fn nothing() -> Self {
        Self::Nothing
    }

    /// Extracts the requested target, if any.
    #[must_use]
    pub fn into_target(self) -> Option<S> {
        match self {
            Self::Nothing => None,
            Self::TransitionTo(state) => Some(state),
        }
    }
}
