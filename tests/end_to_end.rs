use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio_nbfsm::{
    Engine, EngineStatus, Event, ExecutionContext, Instruction, Model, Rollback, State, Transition,
    TransitionRequest, state_machine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, State)]
enum Power {
    Off,
    On,
    Broken,
}

const SEQUENCE: [Power; 9] = [
    Power::On,
    Power::Off,
    Power::On,
    Power::On,
    Power::Off,
    Power::Off,
    Power::Broken,
    Power::On,
    Power::Off,
];

async fn run_sequence(model: Model<Power>) -> Engine<Power> {
    let engine = Engine::new("switch", Arc::new(model), Power::Off, Handle::current());
    engine.start();
    for desired in SEQUENCE {
        engine.process(TransitionRequest::new(desired));
    }
    assert!(engine.quiesce_then_stop().await);
    engine
}

#[tokio::test]
async fn test_switch_sequence_with_builder() {
    let entered_on = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&entered_on);

    let model = Model::builder()
        .transition(Transition::new("switch_on", [Power::Off], Power::On))
        .transition(Transition::new("switch_off", [Power::On], Power::Off))
        .transition(Transition::new("break", [Power::On, Power::Off], Power::Broken))
        .on_entry(Power::On, move |_, _, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Instruction::Nothing
        })
        .build()
        .unwrap();

    let engine = run_sequence(model).await;

    assert_eq!(engine.state(), Power::Broken);
    assert_eq!(engine.transition_count(), 5);
    assert_eq!(entered_on.load(Ordering::SeqCst), 2);
    assert_eq!(engine.status(), EngineStatus::Stopped);
}

#[derive(Default)]
struct Switch {
    entered_on: AtomicUsize,
    switched_on: AtomicUsize,
}

#[state_machine(
    state = Power,
    transition(name = "switch_on", from(Off), to = On),
    transition(name = "switch_off", from(On), to = Off),
    transition(name = "break", from(On, Off), to = Broken),
)]
impl Switch {
    #[on_transition(from(Off), to = On)]
    fn switching_on(
        &self,
        _from: Power,
        _to: Power,
        _event: &dyn Event<Power>,
        _ctx: &ExecutionContext,
    ) -> Result<(), Rollback> {
        self.switched_on.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[on_entry(state = On)]
    fn lamp_on(
        &self,
        _previous: Power,
        _entered: Power,
        _event: &dyn Event<Power>,
        _ctx: &ExecutionContext,
    ) -> Instruction<Power> {
        self.entered_on.fetch_add(1, Ordering::SeqCst);
        Instruction::Nothing
    }
}

#[tokio::test]
async fn test_switch_sequence_declarative() {
    let switch = Arc::new(Switch::default());
    let model = Model::declarative(Arc::clone(&switch)).unwrap();

    let engine = run_sequence(model).await;

    assert_eq!(engine.state(), Power::Broken);
    assert_eq!(engine.transition_count(), 5);
    assert_eq!(switch.entered_on.load(Ordering::SeqCst), 2);
    assert_eq!(switch.switched_on.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_events_from_terminal_state_are_absorbed() {
    let model = Model::builder()
        .transition(Transition::new("break", [Power::Off], Power::Broken))
        .build()
        .unwrap();
    let engine = Engine::new("terminal", Arc::new(model), Power::Off, Handle::current());
    engine.start();

    engine.process(TransitionRequest::new(Power::Broken));
    engine.process(TransitionRequest::new(Power::Off));
    engine.process(TransitionRequest::new(Power::On));
    assert!(engine.quiesce_then_stop().await);

    assert_eq!(engine.state(), Power::Broken);
    assert_eq!(engine.transition_count(), 1);
}
