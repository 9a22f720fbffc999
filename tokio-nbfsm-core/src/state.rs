//! The state trait every machine is generic over.

use std::fmt::Debug;
use std::hash::Hash;

/// A finite, totally ordered, enumerable state type.
///
/// Usually derived with `#[derive(State)]` on a fieldless enum, which fills
/// in [`State::ALL`] and [`State::name`] from the variant list.
///
/// # Example
///
/// ```rust
/// use tokio_nbfsm_core::State;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// enum Door {
///     Open,
///     Closed,
/// }
///
/// impl State for Door {
///     const ALL: &'static [Self] = &[Door::Open, Door::Closed];
///
///     fn name(&self) -> &'static str {
///         match self {
///             Door::Open => "Open",
///             Door::Closed => "Closed",
///         }
///     }
/// }
///
/// assert_eq!(Door::from_name("Closed"), Some(Door::Closed));
/// assert_eq!(Door::from_name("Ajar"), None);
/// ```
pub trait State: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Every value of the type, in declaration order.
    const ALL: &'static [Self];

    /// The declared name of this value.
    fn name(&self) -> &'static str;

    /// Resolves a declared name back to a value.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.name() == name)
    }
}
