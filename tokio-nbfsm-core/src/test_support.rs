use crate::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Power {
    Off,
    On,
    Broken,
}

impl State for Power {
    const ALL: &'static [Self] = &[Power::Off, Power::On, Power::Broken];

    fn name(&self) -> &'static str {
        match self {
            Power::Off => "Off",
            Power::On => "On",
            Power::Broken => "Broken",
        }
    }
}
