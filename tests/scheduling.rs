use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::timeout;
use tokio_nbfsm::{
    Coalesce, Engine, Event, ExecutionContext, LifecycleAware, Model, State, Transition,
    TransitionRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, State)]
enum Power {
    Off,
    On,
    Broken,
}

fn engine() -> Engine<Power> {
    let model = Model::builder()
        .transition(Transition::new("switch_on", [Power::Off], Power::On))
        .transition(Transition::new("switch_off", [Power::On], Power::Off))
        .transition(Transition::new("break", [Power::On, Power::Off], Power::Broken))
        .build()
        .unwrap();
    let engine = Engine::new("scheduled", Arc::new(model), Power::Off, Handle::current());
    engine.start();
    engine
}

/// Shared record of what the engine did with recorder events.
#[derive(Default)]
struct Recorder {
    accepted: AtomicUsize,
    evaluated: Mutex<Vec<Power>>,
}

impl Recorder {
    fn evaluated(&self) -> Vec<Power> {
        self.evaluated.lock().unwrap().clone()
    }
}

struct Goto {
    target: Power,
    recorder: Arc<Recorder>,
}

impl Goto {
    fn new(target: Power, recorder: &Arc<Recorder>) -> Self {
        Self {
            target,
            recorder: Arc::clone(recorder),
        }
    }
}

impl Event<Power> for Goto {
    fn desired_state(&self, _current: Power, _ctx: &ExecutionContext) -> Power {
        self.recorder.evaluated.lock().unwrap().push(self.target);
        self.target
    }

    fn lifecycle(&self) -> Option<&dyn LifecycleAware<Power>> {
        Some(self)
    }
}

impl LifecycleAware<Power> for Goto {
    fn on_accept(&self, _ctx: &ExecutionContext) -> bool {
        self.recorder.accepted.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Same behavior as `Goto`, but a distinct coalescing key.
struct Nudge(Goto);

impl Event<Power> for Nudge {
    fn desired_state(&self, current: Power, ctx: &ExecutionContext) -> Power {
        self.0.desired_state(current, ctx)
    }
}

#[tokio::test]
async fn test_process_later_waits_for_delay() {
    let engine = engine();
    engine.process_later(TransitionRequest::new(Power::On), Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.state(), Power::Off);

    timeout(Duration::from_secs(2), engine.wait_for_state(Power::On))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(engine.transition_count(), 1);
    assert!(engine.stop());
}

#[tokio::test]
async fn test_scheduled_events_fire_in_due_order() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    engine.process_later(Goto::new(Power::Broken, &recorder), Duration::from_millis(60));
    engine.process_later(Goto::new(Power::On, &recorder), Duration::from_millis(20));
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.evaluated(), vec![Power::On, Power::Broken]);
    assert_eq!(engine.state(), Power::Broken);
}

#[tokio::test]
async fn test_subsequent_event_dropped_after_intervening_transition() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    engine.process_subsequent(Goto::new(Power::Broken, &recorder), Duration::from_millis(30));
    engine.process(TransitionRequest::new(Power::On));
    assert!(engine.quiesce_then_stop().await);

    // accepted as usual, never evaluated
    assert_eq!(recorder.accepted.load(Ordering::SeqCst), 1);
    assert!(recorder.evaluated().is_empty());
    assert_eq!(engine.state(), Power::On);
    assert_eq!(engine.transition_count(), 1);
}

#[tokio::test]
async fn test_subsequent_event_runs_when_nothing_changed() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    engine.process_subsequent(Goto::new(Power::Broken, &recorder), Duration::from_millis(20));
    // absorbed: no transition from Off to Off, so the count does not move
    engine.process(TransitionRequest::new(Power::Off));
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.evaluated(), vec![Power::Broken]);
    assert_eq!(engine.state(), Power::Broken);
}

#[tokio::test]
async fn test_coalesced_first_keeps_earliest() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());
    let delay = Duration::from_millis(30);

    engine.process_coalesced(Goto::new(Power::On, &recorder), delay, Coalesce::First);
    engine.process_coalesced(Goto::new(Power::Broken, &recorder), delay, Coalesce::First);
    engine.process_coalesced(Goto::new(Power::Off, &recorder), delay, Coalesce::First);
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.accepted.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.evaluated(), vec![Power::On]);
    assert_eq!(engine.state(), Power::On);
}

#[tokio::test]
async fn test_coalesced_most_recent_keeps_latest() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());
    let delay = Duration::from_millis(30);

    engine.process_coalesced(Goto::new(Power::Broken, &recorder), delay, Coalesce::MostRecent);
    engine.process_coalesced(Goto::new(Power::Off, &recorder), delay, Coalesce::MostRecent);
    engine.process_coalesced(Goto::new(Power::On, &recorder), delay, Coalesce::MostRecent);
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.evaluated(), vec![Power::On]);
    assert_eq!(engine.state(), Power::On);
    assert_eq!(engine.transition_count(), 1);
}

#[tokio::test]
async fn test_coalescing_starts_over_after_firing() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());
    let delay = Duration::from_millis(10);

    engine.process_coalesced(Goto::new(Power::On, &recorder), delay, Coalesce::First);
    timeout(Duration::from_secs(2), engine.wait_for_state(Power::On))
        .await
        .unwrap()
        .unwrap();

    engine.process_coalesced(Goto::new(Power::Off, &recorder), delay, Coalesce::First);
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.evaluated(), vec![Power::On, Power::Off]);
    assert_eq!(engine.transition_count(), 2);
}

#[tokio::test]
async fn test_coalescing_is_keyed_by_event_type() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    engine.process_coalesced(Goto::new(Power::On, &recorder), Duration::from_millis(10), Coalesce::First);
    engine.process_coalesced(
        Nudge(Goto::new(Power::Broken, &recorder)),
        Duration::from_millis(40),
        Coalesce::First,
    );
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.evaluated(), vec![Power::On, Power::Broken]);
    assert_eq!(engine.state(), Power::Broken);
}

#[tokio::test]
async fn test_coalesced_first_ignores_individual_delays() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    // the first submission comes due last
    engine.process_coalesced(Goto::new(Power::On, &recorder), Duration::from_millis(80), Coalesce::First);
    engine.process_coalesced(Goto::new(Power::Broken, &recorder), Duration::from_millis(10), Coalesce::First);
    engine.process_coalesced(Goto::new(Power::Off, &recorder), Duration::from_millis(40), Coalesce::First);
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.accepted.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.evaluated(), vec![Power::On]);
    assert_eq!(engine.state(), Power::On);
}

#[tokio::test]
async fn test_coalesced_most_recent_waits_for_latest_delay() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    engine.process_coalesced(Goto::new(Power::Broken, &recorder), Duration::from_millis(10), Coalesce::MostRecent);
    engine.process_coalesced(Goto::new(Power::Off, &recorder), Duration::from_millis(20), Coalesce::MostRecent);
    engine.process_coalesced(Goto::new(Power::On, &recorder), Duration::from_millis(60), Coalesce::MostRecent);
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.accepted.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.evaluated(), vec![Power::On]);
    assert_eq!(engine.state(), Power::On);
}

#[tokio::test]
async fn test_boxed_events_coalesce_by_concrete_type() {
    let engine = engine();
    let recorder = Arc::new(Recorder::default());

    let goto: Box<dyn Event<Power>> = Box::new(Goto::new(Power::On, &recorder));
    let nudge: Box<dyn Event<Power>> = Box::new(Nudge(Goto::new(Power::Broken, &recorder)));
    engine.process_coalesced(goto, Duration::from_millis(10), Coalesce::First);
    engine.process_coalesced(nudge, Duration::from_millis(40), Coalesce::First);
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(recorder.evaluated(), vec![Power::On, Power::Broken]);
    assert_eq!(engine.state(), Power::Broken);
}

/// Records its label when evaluated and leaves the state alone.
struct Labeled {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Event<Power> for Labeled {
    fn desired_state(&self, current: Power, _ctx: &ExecutionContext) -> Power {
        self.log.lock().unwrap().push(self.label);
        current
    }
}

/// Coalesced submissions made while a slow turn runs, queued behind an
/// immediate event, must still settle eligibility before the earlier
/// coalesced event comes due.
async fn coalesce_behind_slow_turn(policy: Coalesce) -> Vec<&'static str> {
    let model = Model::builder()
        .transition(
            Transition::new("switch_on", [Power::Off], Power::On).on_transition(|_, _, _, _, _| {
                thread::sleep(Duration::from_millis(150));
                Ok(())
            }),
        )
        .transition(Transition::new("switch_off", [Power::On], Power::Off))
        .build()
        .unwrap();
    let engine = Engine::new("slow", Arc::new(model), Power::Off, Handle::current());
    engine.start();
    let log = Arc::new(Mutex::new(Vec::new()));

    let labeled = |label| Labeled {
        label,
        log: Arc::clone(&log),
    };
    engine.process_coalesced(labeled("c0"), Duration::from_millis(10), policy);
    engine.process(TransitionRequest::new(Power::On));

    // let the slow transition start, then submit while it runs
    tokio::time::sleep(Duration::from_millis(40)).await;
    engine.process(TransitionRequest::new(Power::Off));
    engine.process_coalesced(labeled("c1"), Duration::from_millis(10), policy);

    assert!(engine.quiesce_then_stop().await);
    assert_eq!(engine.state(), Power::Off);
    let evaluated = log.lock().unwrap().clone();
    evaluated
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_coalesced_first_during_busy_turn() {
    assert_eq!(coalesce_behind_slow_turn(Coalesce::First).await, vec!["c0"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_coalesced_most_recent_during_busy_turn() {
    assert_eq!(coalesce_behind_slow_turn(Coalesce::MostRecent).await, vec!["c1"]);
}
