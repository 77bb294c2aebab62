//! Status lines and critical-condition alerts.

use crate::pet::{PetRecord, PetState};
use std::fmt;

/// The one-line status shown under the pet.
pub fn status_message(state: PetState) -> &'static str {
    match state {
        PetState::Idle => "Your pet is feeling fine.",
        PetState::Eating => "Yum! Your pet is eating.",
        PetState::Playing => "Your pet is having fun!",
        PetState::Sleeping => "Shh! Your pet is sleeping.",
        PetState::Hungry => "Your pet is hungry! Time to feed.",
        PetState::Sick => "Oh no! Your pet is sick. Give medicine.",
        PetState::Tired => "Your pet is tired. Time for a nap.",
    }
}

const HEALTH_CRITICAL_BELOW: i32 = 20;
const STARVING_ABOVE: i32 = 90;
const MISERABLE_BELOW: i32 = 10;

/// A condition worth interrupting the user for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    HealthCritical,
    VeryHungry,
    VeryUnhappy,
}

impl Alert {
    /// The most urgent alert for the pet's stats, if any.
    pub fn check(pet: &PetRecord) -> Option<Alert> {
        if pet.health() < HEALTH_CRITICAL_BELOW {
            Some(Alert::HealthCritical)
        } else if pet.hunger() > STARVING_ABOVE {
            Some(Alert::VeryHungry)
        } else if pet.happiness() < MISERABLE_BELOW {
            Some(Alert::VeryUnhappy)
        } else {
            None
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Alert::HealthCritical => "Health Critical!",
            Alert::VeryHungry => "Very Hungry!",
            Alert::VeryUnhappy => "Very Unhappy!",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Alert::HealthCritical => "Your pet needs medicine now!",
            Alert::VeryHungry => "Your pet is starving!",
            Alert::VeryUnhappy => "Your pet needs attention!",
        }
    }

    /// Sound effect that accompanies the alert.
    pub fn sound_cue(self) -> Option<&'static str> {
        match self {
            Alert::HealthCritical => Some("sick"),
            _ => None,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.title(), self.message())
    }
}
