use std::sync::Arc;

/// Per-engine context handed to every event, hook and action.
///
/// Only the engine's commit step advances the transition count; user code
/// receives the context by shared reference and can only read it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    name: Arc<str>,
    transition_count: u64,
}

impl ExecutionContext {
    pub(crate) fn new(name: Arc<str>) -> Self {
        Self {
            name,
            transition_count: 0,
        }
    }

    /// Name of the engine this context belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of transitions committed so far.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub(crate) fn record_transition(&mut self) -> u64 {
        self.transition_count += 1;
        self.transition_count
    }
}
