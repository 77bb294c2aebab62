//! Event system for the Petling runner.
//!
//! The runner owns the pet and reports every change through this channel.
//! Front ends subscribe to the receiver instead of reading the record
//! directly, which keeps presentation out of the simulation.

use crate::animation::View;
use crate::pet::{Action, PetRecord, PetState};
use crate::status::{status_message, Alert};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Default channel buffer size.
const DEFAULT_CHANNEL_SIZE: usize = 256;

/// A read-only copy of the pet for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub name: String,
    pub hunger: i32,
    pub happiness: i32,
    pub health: i32,
    pub energy: i32,
    pub age: u32,
    pub state: PetState,
    /// The status line for `state`.
    pub status: &'static str,
    /// Whether actions are currently accepted.
    pub interaction_enabled: bool,
}

impl Snapshot {
    pub fn of(pet: &PetRecord, interaction_enabled: bool) -> Self {
        Self {
            name: pet.name().to_string(),
            hunger: pet.hunger(),
            happiness: pet.happiness(),
            health: pet.health(),
            energy: pet.energy(),
            age: pet.age(),
            state: pet.state(),
            status: status_message(pet.state()),
            interaction_enabled,
        }
    }
}

/// Events emitted by the runner during execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// The pet has been loaded and the runner is ticking.
    Started {
        /// The pet after catching up on time spent closed.
        snapshot: Snapshot,
    },

    /// The once-a-second update ran.
    Ticked {
        /// The pet after the update.
        snapshot: Snapshot,
    },

    /// The derived state moved.
    StateChanged { from: PetState, to: PetState },

    /// An action was accepted and applied.
    ActionApplied {
        action: Action,
        /// The pet after the action.
        snapshot: Snapshot,
    },

    /// An action arrived during cooldown and was dropped.
    ActionRejected { action: Action },

    /// Interaction was disabled by a cooldown or enabled again after it.
    InteractionChanged { enabled: bool },

    /// The picture changed: a new strip, a new frame, or a fallback image.
    Frame { view: View },

    /// A sound effect should play.
    Sound {
        cue: &'static str,
        /// Volume in `0.0..=1.0`.
        volume: f32,
    },

    /// Background music should start.
    Music {
        track: &'static str,
        /// Volume in `0.0..=1.0`.
        volume: f32,
    },

    /// A critical condition began.
    Notification { alert: Alert },

    /// The save file was written.
    Saved { path: PathBuf },

    /// Writing the save file failed. The pet keeps running.
    SaveFailed { message: String },

    /// Warning message.
    Warning { message: String },

    /// The runner has stopped.
    Stopped { reason: StopReason },
}

/// Reasons for the runner stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A shutdown command was received.
    Shutdown,
    /// Every runner handle was dropped.
    HandlesDropped,
}

/// Sender for events.
pub type EventSender = mpsc::Sender<Event>;

/// Receiver for events.
pub type EventReceiver = mpsc::Receiver<Event>;

/// Create a new event channel with the default buffer size.
///
/// Returns a sender and receiver pair for event communication.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

impl Event {
    /// Create a warning event with the given message.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    /// Create a save failure event with the given message.
    pub fn save_failed(message: impl Into<String>) -> Self {
        Self::SaveFailed {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Shutdown => write!(f, "shutdown requested"),
            StopReason::HandlesDropped => write!(f, "all handles dropped"),
        }
    }
}
