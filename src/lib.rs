//! # tokio-nbfsm
//!
//! A non-blocking finite state machine engine for Tokio. Any thread submits
//! events and returns at once; a single worker task evaluates them one at a
//! time, runs exit, transition and entry actions, and publishes the new state.
//!
//! Models are built either with [`Model::builder`] or declaratively with
//! `#[state_machine]` on an impl block.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tokio_nbfsm::{
//!     Engine, Event, ExecutionContext, Instruction, Model, Rollback, State, TransitionRequest,
//!     state_machine,
//! };
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, State)]
//! enum Power {
//!     Off,
//!     On,
//! }
//!
//! struct Switch;
//!
//! #[state_machine(
//!     state = Power,
//!     transition(name = "switch_on", from(Off), to = On),
//!     transition(name = "switch_off", from(On), to = Off),
//! )]
//! impl Switch {
//!     #[on_transition(from(Off), to = On)]
//!     fn powering_up(
//!         &self,
//!         _from: Power,
//!         _to: Power,
//!         _event: &dyn Event<Power>,
//!         _ctx: &ExecutionContext,
//!     ) -> Result<(), Rollback> {
//!         Ok(())
//!     }
//!
//!     #[on_entry(state = On)]
//!     fn lamp_on(
//!         &self,
//!         _previous: Power,
//!         _entered: Power,
//!         _event: &dyn Event<Power>,
//!         _ctx: &ExecutionContext,
//!     ) -> Instruction<Power> {
//!         Instruction::Nothing
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let model = Model::declarative(Arc::new(Switch)).unwrap();
//! let engine = Engine::new("switch", Arc::new(model), Power::Off, tokio::runtime::Handle::current());
//! engine.start();
//!
//! engine.process(TransitionRequest::new(Power::On));
//! engine.wait_for_state(Power::On).await.unwrap();
//! assert!(engine.quiesce_then_stop().await);
//! # }
//! ```

#[doc(inline)]
pub use tokio_nbfsm_core::*;
#[doc(inline)]
pub use tokio_nbfsm_macros::{State, state_machine};
