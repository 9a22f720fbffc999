use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use tokio::runtime::Handle;
use tokio_nbfsm::{Engine, Event, ExecutionContext, Model, Rollback, State, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, State)]
enum Power {
    Off,
    On,
}

struct Toggle;

impl Event<Power> for Toggle {
    fn desired_state(&self, current: Power, _ctx: &ExecutionContext) -> Power {
        match current {
            Power::Off => Power::On,
            Power::On => Power::Off,
        }
    }
}

const PRODUCERS: usize = 8;
const TOGGLES: usize = 250;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_producers_on_many_threads_are_serialized() {
    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let action = {
        let busy = Arc::clone(&busy);
        let overlaps = Arc::clone(&overlaps);
        move |_: &str,
              _: Power,
              _: Power,
              _: &dyn Event<Power>,
              _: &ExecutionContext|
              -> Result<(), Rollback> {
            if busy.swap(true, Ordering::SeqCst) {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::yield_now();
            busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    };

    let model = Model::builder()
        .transition(Transition::new("on", [Power::Off], Power::On).on_transition(action.clone()))
        .transition(Transition::new("off", [Power::On], Power::Off).on_transition(action))
        .build()
        .unwrap();
    let engine = Engine::new("toggle", Arc::new(model), Power::Off, Handle::current());
    engine.start();

    let watcher = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut last = 0;
            let mut regressions = 0;
            while engine.transition_count() < (PRODUCERS * TOGGLES) as u64 {
                let count = engine.transition_count();
                if count < last {
                    regressions += 1;
                }
                last = count;
                tokio::task::yield_now().await;
            }
            regressions
        })
    };

    // plain OS threads, not runtime tasks
    thread::scope(|scope| {
        for _ in 0..PRODUCERS {
            let engine = engine.clone();
            scope.spawn(move || {
                for _ in 0..TOGGLES {
                    engine.process(Toggle);
                }
            });
        }
    });

    assert!(engine.quiesce_then_stop().await);
    assert_eq!(engine.transition_count(), (PRODUCERS * TOGGLES) as u64);
    // an even number of toggles lands back where it started
    assert_eq!(engine.state(), Power::Off);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(watcher.await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_pairs_state_with_count() {
    let model = Model::builder()
        .transition(Transition::new("on", [Power::Off], Power::On))
        .transition(Transition::new("off", [Power::On], Power::Off))
        .build()
        .unwrap();
    let engine = Engine::new("toggle", Arc::new(model), Power::Off, Handle::current());
    engine.start();

    for _ in 0..101 {
        engine.process(Toggle);
    }
    engine.wait_for_transition_count(101).await.unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.transition_count, 101);
    assert_eq!(snapshot.state, Power::On);
    assert!(engine.stop());
}
