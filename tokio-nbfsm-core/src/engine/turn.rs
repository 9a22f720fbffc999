//! One processing turn: acceptance, evaluation, transition and chaining.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

use super::Snapshot;
use crate::context::ExecutionContext;
use crate::event::{Event, TransitionRequest};
use crate::model::Model;
use crate::state::State;

/// Whether an accepted event goes on to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Evaluate,
    /// Evaluate only if the transition count still equals the recorded one.
    IfUnchanged(u64),
    /// Another coalesced event holds the slot.
    Superseded,
}

/// Current state and context, mutated only from the worker.
pub(crate) struct Machine<S: State> {
    model: Arc<Model<S>>,
    state: S,
    context: ExecutionContext,
    snapshot: watch::Sender<Snapshot<S>>,
}

impl<S: State> Machine<S> {
    pub(crate) fn new(
        name: Arc<str>,
        model: Arc<Model<S>>,
        initial: S,
        snapshot: watch::Sender<Snapshot<S>>,
    ) -> Self {
        Self {
            model,
            state: initial,
            context: ExecutionContext::new(name),
            snapshot,
        }
    }

    pub(crate) fn transition_count(&self) -> u64 {
        self.context.transition_count()
    }

    /// Runs one turn for `event`. A panic anywhere in user code ends the turn
    /// but not the worker.
    pub(crate) fn handle(&mut self, event: &dyn Event<S>, admission: Admission) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.turn(event, admission)));
        if let Err(payload) = outcome {
            error!(
                state = self.state.name(),
                transition_count = self.context.transition_count(),
                "event processing panicked: {}",
                panic_message(&*payload)
            );
        }
    }

    fn turn(&mut self, event: &dyn Event<S>, admission: Admission) {
        if let Some(lifecycle) = event.lifecycle() {
            if !lifecycle.on_accept(&self.context) {
                trace!("event declined by on_accept");
                return;
            }
        }

        match admission {
            Admission::Evaluate => {}
            Admission::IfUnchanged(recorded) if recorded == self.context.transition_count() => {}
            Admission::IfUnchanged(recorded) => {
                trace!(
                    recorded,
                    current = self.context.transition_count(),
                    "transition committed since scheduling, subsequent event dropped"
                );
                return;
            }
            Admission::Superseded => {
                trace!("coalesced event superseded, dropped");
                return;
            }
        }

        let desired = event.desired_state(self.state, &self.context);
        let mut chained = self.step(event, desired);
        while let Some(target) = chained {
            let request = TransitionRequest::new(target);
            chained = self.step(&request, target);
        }
    }

    /// Attempts the transition from the current state to `desired` and returns
    /// the target of a chained transition requested by an exit or entry action.
    fn step(&mut self, event: &dyn Event<S>, desired: S) -> Option<S> {
        let current = self.state;
        let model = Arc::clone(&self.model);

        let Some(transition) = model.find(current, desired) else {
            trace!(
                from = current.name(),
                to = desired.name(),
                "no transition modeled, event absorbed"
            );
            return None;
        };

        let lifecycle = event.lifecycle();
        if let Some(lifecycle) = lifecycle {
            lifecycle.on_processing(current, &self.context);
        }

        let mut chained = model
            .exit_action(current)
            .and_then(|exit| exit.on_exit(current, desired, event, &self.context).into_target());

        if let Err(rollback) =
            transition
                .action()
                .on_transition(transition.name(), current, desired, event, &self.context)
        {
            warn!(
                transition = transition.name(),
                from = current.name(),
                to = desired.name(),
                %rollback,
                "transition rolled back"
            );
            if let Some(lifecycle) = lifecycle {
                lifecycle.on_failure(current, &self.context, &rollback);
            }
            return None;
        }

        self.commit(transition.name(), current, desired);

        if let Some(target) = model
            .entry_action(desired)
            .and_then(|entry| entry.on_entry(current, desired, event, &self.context).into_target())
        {
            chained = Some(target);
        }

        if let Some(lifecycle) = lifecycle {
            lifecycle.on_processed(desired, &self.context);
        }

        chained
    }

    fn commit(&mut self, transition: &str, from: S, to: S) {
        self.state = to;
        let transition_count = self.context.record_transition();
        self.snapshot.send_replace(Snapshot {
            state: to,
            transition_count,
        });
        debug!(
            transition,
            from = from.name(),
            to = to.name(),
            transition_count,
            "transition committed"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
