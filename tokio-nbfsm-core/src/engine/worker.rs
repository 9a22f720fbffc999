use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use super::turn::{Admission, Machine};
use super::{Coalesce, EngineStatus, ShutdownMode, Snapshot, StatusCell};
use crate::event::Event;
use crate::model::Model;
use crate::state::State;

/// Turns processed back to back before the worker yields to the runtime.
const TURNS_PER_YIELD: u32 = 64;

pub(crate) enum Command<S: State> {
    Process {
        submitted: Instant,
        event: Box<dyn Event<S>>,
    },
    Schedule {
        due: Instant,
        event: Box<dyn Event<S>>,
        gate: Gate,
    },
    Quiesce(oneshot::Sender<()>),
}

/// Extra condition a scheduled event must pass when it comes due.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Gate {
    Always,
    Subsequent { recorded: u64 },
    Coalesced { key: TypeId, policy: Coalesce },
}

struct Queued<S: State> {
    submitted: Instant,
    event: Box<dyn Event<S>>,
}

struct Scheduled<S: State> {
    due: Instant,
    seq: u64,
    event: Box<dyn Event<S>>,
    gate: Gate,
}

// Reversed so the max-heap yields the earliest due time, then the earliest submission.
impl<S: State> Ord for Scheduled<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<S: State> PartialOrd for Scheduled<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: State> PartialEq for Scheduled<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S: State> Eq for Scheduled<S> {}

/// The single consumer. Owns the machine and every queue feeding it.
pub(crate) struct Worker<S: State> {
    machine: Machine<S>,
    status: Arc<StatusCell>,
    commands: mpsc::UnboundedReceiver<Command<S>>,
    shutdown: watch::Receiver<Option<ShutdownMode>>,
    ready: VecDeque<Queued<S>>,
    scheduled: BinaryHeap<Scheduled<S>>,
    next_seq: u64,
    // coalescing key -> seq of the one scheduled event allowed to fire
    eligible: HashMap<TypeId, u64>,
    quiescing: Vec<oneshot::Sender<()>>,
    closed: bool,
}

impl<S: State> Worker<S> {
    pub(crate) fn new(
        name: Arc<str>,
        model: Arc<Model<S>>,
        initial: S,
        status: Arc<StatusCell>,
        commands: mpsc::UnboundedReceiver<Command<S>>,
        shutdown: watch::Receiver<Option<ShutdownMode>>,
        snapshot: watch::Sender<Snapshot<S>>,
    ) -> Self {
        Self {
            machine: Machine::new(name, model, initial, snapshot),
            status,
            commands,
            shutdown,
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            next_seq: 0,
            eligible: HashMap::new(),
            quiescing: Vec::new(),
            closed: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let sleep = tokio::time::sleep(Duration::from_secs(3153600000));
        tokio::pin!(sleep);
        let mut turns: u32 = 0;

        loop {
            if self.status.get() == EngineStatus::Stopped {
                break;
            }

            self.pull();
            if self.dispatch_next(Instant::now()) {
                turns = turns.wrapping_add(1);
                if turns % TURNS_PER_YIELD == 0 {
                    tokio::task::yield_now().await;
                }
                continue;
            }

            if self.ready.is_empty() && self.scheduled.is_empty() {
                for waiter in self.quiescing.drain(..) {
                    let _ = waiter.send(());
                }
            }
            if self.closed && self.ready.is_empty() {
                debug!(
                    abandoned = self.scheduled.len(),
                    "all handles dropped, worker exiting"
                );
                break;
            }

            let deadline = self.scheduled.peek().map(|next| next.due);
            if let Some(deadline) = deadline {
                sleep.as_mut().reset(deadline);
            }

            tokio::select! {
                Ok(()) = self.shutdown.changed() => {}
                _ = &mut sleep, if deadline.is_some() => {}
                command = self.commands.recv(), if !self.closed => match command {
                    Some(command) => self.admit(command),
                    None => self.closed = true,
                },
                else => break,
            }
        }

        self.status.finish();
        info!(
            transition_count = self.machine.transition_count(),
            "state machine worker stopped"
        );
    }

    /// Admits everything waiting in the command channel.
    ///
    /// Coalescing eligibility is settled at admission, so every submission
    /// made so far must be admitted before the next event is dispatched.
    fn pull(&mut self) {
        while !self.closed {
            match self.commands.try_recv() {
                Ok(command) => self.admit(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
    }

    fn admit(&mut self, command: Command<S>) {
        match command {
            Command::Process { submitted, event } => {
                self.ready.push_back(Queued { submitted, event });
            }
            Command::Schedule { due, event, gate } => {
                let seq = self.next_seq;
                self.next_seq += 1;
                if let Gate::Coalesced { key, policy } = gate {
                    match policy {
                        Coalesce::First => {
                            self.eligible.entry(key).or_insert(seq);
                        }
                        Coalesce::MostRecent => {
                            self.eligible.insert(key, seq);
                        }
                    }
                }
                self.scheduled.push(Scheduled {
                    due,
                    seq,
                    event,
                    gate,
                });
            }
            Command::Quiesce(waiter) => self.quiescing.push(waiter),
        }
    }

    /// Runs whichever is earlier: the oldest immediate event or the earliest
    /// due scheduled event. Immediate events win ties.
    fn dispatch_next(&mut self, now: Instant) -> bool {
        let scheduled_first = match (self.scheduled.peek(), self.ready.front()) {
            (Some(next), Some(queued)) => next.due <= now && next.due < queued.submitted,
            (Some(next), None) => next.due <= now,
            (None, _) => false,
        };

        if scheduled_first {
            if let Some(Scheduled {
                seq, event, gate, ..
            }) = self.scheduled.pop()
            {
                let admission = self.admission(gate, seq);
                self.machine.handle(&*event, admission);
                return true;
            }
        }

        match self.ready.pop_front() {
            Some(Queued { event, .. }) => {
                self.machine.handle(&*event, Admission::Evaluate);
                true
            }
            None => false,
        }
    }

    fn admission(&mut self, gate: Gate, seq: u64) -> Admission {
        match gate {
            Gate::Always => Admission::Evaluate,
            Gate::Subsequent { recorded } => Admission::IfUnchanged(recorded),
            Gate::Coalesced { key, .. } => {
                if self.eligible.get(&key) == Some(&seq) {
                    self.eligible.remove(&key);
                    Admission::Evaluate
                } else {
                    Admission::Superseded
                }
            }
        }
    }
}
