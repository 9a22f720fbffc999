//! The non-blocking engine: a cloneable handle feeding one serialized worker.

mod turn;
mod worker;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{Instrument, debug, info, trace};

use crate::event::Event;
use crate::model::Model;
use crate::state::State;

use self::worker::{Command, Gate, Worker};

/// Shutdown mode recorded when the engine stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// The queue drained and no turn was running when the engine stopped.
    Graceful,
    /// The engine stopped at once, abandoning queued and scheduled events.
    Immediate,
}

/// Lifecycle of an engine. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Created,
    Running,
    Stopped,
}

impl EngineStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// How competing coalesced events for one key are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coalesce {
    /// The earliest submission stays eligible; later ones are suppressed.
    First,
    /// Every submission supersedes the pending one.
    MostRecent,
}

/// State and transition count, published together on every commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot<S> {
    pub state: S,
    pub transition_count: u64,
}

#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    fn new() -> Self {
        Self(AtomicU8::new(EngineStatus::Created as u8))
    }

    pub(crate) fn get(&self) -> EngineStatus {
        EngineStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    fn begin(&self) -> bool {
        self.0
            .compare_exchange(
                EngineStatus::Created as u8,
                EngineStatus::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns `true` if this call moved the engine to `Stopped`.
    pub(crate) fn finish(&self) -> bool {
        self.0.swap(EngineStatus::Stopped as u8, Ordering::AcqRel) != EngineStatus::Stopped as u8
    }
}

struct Inner<S: State> {
    name: Arc<str>,
    status: Arc<StatusCell>,
    commands: mpsc::UnboundedSender<Command<S>>,
    snapshot: watch::Receiver<Snapshot<S>>,
    shutdown: watch::Sender<Option<ShutdownMode>>,
    idle: Mutex<Option<Worker<S>>>,
    runtime: Handle,
}

/// Handle to a running (or not yet started) state machine.
///
/// Cloning is cheap and every clone talks to the same worker. Submissions
/// return immediately from any thread; a single worker task on the given
/// runtime evaluates events one at a time and is the only place state changes.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tokio_nbfsm_core::{Engine, Model, State, Transition, TransitionRequest};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// enum Power { Off, On }
///
/// impl State for Power {
///     const ALL: &'static [Self] = &[Power::Off, Power::On];
///     fn name(&self) -> &'static str {
///         match self { Power::Off => "Off", Power::On => "On" }
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let model = Model::builder()
///     .transition(Transition::new("on", [Power::Off], Power::On))
///     .build()
///     .unwrap();
///
/// let engine = Engine::new("switch", Arc::new(model), Power::Off, tokio::runtime::Handle::current());
/// engine.start();
/// engine.process(TransitionRequest::new(Power::On));
/// engine.wait_for_state(Power::On).await.unwrap();
/// assert_eq!(engine.transition_count(), 1);
/// assert!(engine.quiesce_then_stop().await);
/// # }
/// ```
pub struct Engine<S: State> {
    inner: Arc<Inner<S>>,
}

impl<S: State> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> Engine<S> {
    /// Creates an engine in [`EngineStatus::Created`]. Nothing is processed
    /// until [`Engine::start`], but submissions are queued from now on.
    pub fn new(name: impl Into<Arc<str>>, model: Arc<Model<S>>, initial: S, runtime: Handle) -> Self {
        let name = name.into();
        let status = Arc::new(StatusCell::new());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            state: initial,
            transition_count: 0,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(None);

        let worker = Worker::new(
            Arc::clone(&name),
            model,
            initial,
            Arc::clone(&status),
            commands_rx,
            shutdown_rx,
            snapshot_tx,
        );

        Self {
            inner: Arc::new(Inner {
                name,
                status,
                commands: commands_tx,
                snapshot: snapshot_rx,
                shutdown: shutdown_tx,
                idle: Mutex::new(Some(worker)),
                runtime,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> EngineStatus {
        self.inner.status.get()
    }

    /// Current state. May lag an event that is still being processed.
    pub fn state(&self) -> S {
        self.inner.snapshot.borrow().state
    }

    /// Committed transitions so far.
    pub fn transition_count(&self) -> u64 {
        self.inner.snapshot.borrow().transition_count
    }

    /// State and count as published by the same commit.
    pub fn snapshot(&self) -> Snapshot<S> {
        *self.inner.snapshot.borrow()
    }

    /// Spawns the worker. Does nothing if the engine already started or stopped.
    pub fn start(&self) {
        if !self.inner.status.begin() {
            return;
        }
        let worker = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            info!(engine = %self.inner.name, "starting state machine");
            let span = tracing::info_span!("nbfsm", engine = %self.inner.name);
            self.inner.runtime.spawn(worker.run().instrument(span));
        }
    }

    /// Stops at once, abandoning everything not yet processed.
    ///
    /// Returns `true` if this call stopped the engine.
    pub fn stop(&self) -> bool {
        self.finish(ShutdownMode::Immediate)
    }

    /// Waits until every queued and scheduled event has been processed, then
    /// stops.
    ///
    /// Returns `true` if this call stopped the engine, `false` if it was
    /// already stopped or another caller stopped it first.
    pub async fn quiesce_then_stop(&self) -> bool {
        if self.status() == EngineStatus::Running {
            let (tx, rx) = oneshot::channel();
            if self.inner.commands.send(Command::Quiesce(tx)).is_ok() {
                // an error means the worker exited; the stop below settles who wins
                let _ = rx.await;
            }
        }
        self.finish(ShutdownMode::Graceful)
    }

    fn finish(&self, mode: ShutdownMode) -> bool {
        if !self.inner.status.finish() {
            return false;
        }
        info!(engine = %self.inner.name, ?mode, "stopping state machine");
        drop(
            self.inner
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        self.inner.shutdown.send_replace(Some(mode));
        true
    }

    /// Queues `event` behind every event already submitted.
    pub fn process(&self, event: impl Event<S>) {
        self.submit(Command::Process {
            submitted: Instant::now(),
            event: Box::new(event),
        });
    }

    /// Schedules `event` for no earlier than `delay` from now.
    pub fn process_later(&self, event: impl Event<S>, delay: Duration) {
        self.schedule(Box::new(event), delay, Gate::Always);
    }

    /// Schedules `event` to run only if no transition commits in the meantime.
    ///
    /// When the delay elapses the event is accepted as usual but is dropped
    /// without evaluation if the transition count moved since this call.
    pub fn process_subsequent(&self, event: impl Event<S>, delay: Duration) {
        let recorded = self.transition_count();
        self.schedule(Box::new(event), delay, Gate::Subsequent { recorded });
    }

    /// Schedules `event` so that only one event of its type is processed per
    /// coalescing cycle, chosen by `policy`.
    ///
    /// The key is [`Event::coalescing_key`], so a boxed event coalesces with
    /// others of its concrete type, not with every boxed event.
    pub fn process_coalesced(&self, event: impl Event<S>, delay: Duration, policy: Coalesce) {
        let key = event.coalescing_key();
        self.schedule(Box::new(event), delay, Gate::Coalesced { key, policy });
    }

    fn schedule(&self, event: Box<dyn Event<S>>, delay: Duration, gate: Gate) {
        debug!(
            engine = %self.inner.name,
            delay = %humantime::format_duration(delay),
            ?gate,
            "scheduling event"
        );
        self.submit(Command::Schedule {
            due: Instant::now() + delay,
            event,
            gate,
        });
    }

    fn submit(&self, command: Command<S>) {
        if self.status() == EngineStatus::Stopped || self.inner.commands.send(command).is_err() {
            trace!(engine = %self.inner.name, "engine stopped, event dropped");
        }
    }

    /// Resolves once the engine is in `target`.
    pub async fn wait_for_state(&self, target: S) -> Result<(), watch::error::RecvError> {
        let mut rx = self.inner.snapshot.clone();
        rx.wait_for(|snapshot| snapshot.state == target).await?;
        Ok(())
    }

    /// Resolves once at least `count` transitions have committed.
    pub async fn wait_for_transition_count(&self, count: u64) -> Result<(), watch::error::RecvError> {
        let mut rx = self.inner.snapshot.clone();
        rx.wait_for(|snapshot| snapshot.transition_count >= count).await?;
        Ok(())
    }
}

impl<S: State> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
