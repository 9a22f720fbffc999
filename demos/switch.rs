//! Example: a lamp switch that breaks when toggled too fast.
//!
//! Run with `RUST_LOG=debug cargo run --example switch` to see every turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_nbfsm::{
    Coalesce, Engine, Event, ExecutionContext, Instruction, Model, Rollback, State,
    TransitionRequest, state_machine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, State)]
pub enum Power {
    Off,
    On,
    Broken,
}

/// Toggles whatever the state is when the engine gets to it.
struct Flick;

impl Event<Power> for Flick {
    fn desired_state(&self, current: Power, _ctx: &ExecutionContext) -> Power {
        match current {
            Power::Off => Power::On,
            Power::On => Power::Off,
            Power::Broken => Power::Broken,
        }
    }
}

/// A lamp whose bulb survives a limited number of switch-ons.
pub struct Lamp {
    switch_ons: AtomicU32,
    lifetime: u32,
}

#[state_machine(
    state = Power,
    transition(name = "switch_on", from(Off), to = On),
    transition(name = "switch_off", from(On), to = Off),
    transition(name = "burn_out", from(On, Off), to = Broken),
)]
impl Lamp {
    #[on_transition(from(Off), to = On)]
    fn heat_filament(
        &self,
        _from: Power,
        _to: Power,
        _event: &dyn Event<Power>,
        ctx: &ExecutionContext,
    ) -> Result<(), Rollback> {
        if ctx.transition_count() > 100 {
            return Err(Rollback::new("filament exhausted"));
        }
        self.switch_ons.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[on_entry(state = On)]
    fn glow(
        &self,
        _previous: Power,
        _entered: Power,
        _event: &dyn Event<Power>,
        _ctx: &ExecutionContext,
    ) -> Instruction<Power> {
        if self.switch_ons.load(Ordering::SeqCst) >= self.lifetime {
            tracing::info!("bulb burned out");
            return Instruction::to(Power::Broken);
        }
        Instruction::Nothing
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let lamp = Arc::new(Lamp {
        switch_ons: AtomicU32::new(0),
        lifetime: 3,
    });
    let model = match Model::declarative(Arc::clone(&lamp)) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            eprintln!("invalid lamp model: {e}");
            return;
        }
    };

    let engine = Engine::new("lamp", model, Power::Off, Handle::current());
    engine.start();

    // a burst of flicks from a bouncing button collapses into one
    for _ in 0..10 {
        engine.process_coalesced(Flick, Duration::from_millis(20), Coalesce::MostRecent);
    }
    engine.wait_for_state(Power::On).await.ok();
    tracing::info!(state = ?engine.state(), "after debounced burst");

    // turn off again unless someone touched the switch in the meantime
    engine.process_subsequent(TransitionRequest::new(Power::Off), Duration::from_millis(50));

    for _ in 0..4 {
        engine.process(Flick);
    }

    engine.quiesce_then_stop().await;
    tracing::info!(
        state = ?engine.state(),
        transitions = engine.transition_count(),
        switch_ons = lamp.switch_ons.load(Ordering::SeqCst),
        "lamp retired"
    );
}
