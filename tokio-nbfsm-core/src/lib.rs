//! Core runtime for tokio-nbfsm.
//!
//! A [`Model`] describes which transitions exist and which actions run on
//! entering and leaving states. An [`Engine`] owns the current state and a
//! single worker task that pulls [`Event`]s off a queue and applies the model
//! to them one at a time, so producers on any thread never contend for the
//! state itself.

mod context;
mod declare;
mod engine;
mod error;
mod event;
mod instruction;
mod model;
mod state;
mod transition;

#[cfg(test)]
mod test_support;

pub use crate::context::ExecutionContext;
pub use crate::declare::{
    Callback, Declarations, Declared, MethodDecl, Role, StateCallback, TransitionDecl,
};
pub use crate::engine::{Coalesce, Engine, EngineStatus, ShutdownMode, Snapshot};
pub use crate::error::{ActionKind, ModelError, Rollback};
pub use crate::event::{Event, LifecycleAware, TransitionRequest};
pub use crate::instruction::Instruction;
pub use crate::model::{Model, ModelBuilder};
pub use crate::state::State;
pub use crate::transition::{StateEntryAction, StateExitAction, Transition, TransitionAction};
