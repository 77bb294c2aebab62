//! Petling core library
//!
//! This crate provides the core functionality for the Petling desktop pet,
//! including the pet's stats and decay rules, animation selection, save
//! files, user settings, the event system, configuration, and the periodic
//! runner that ties them together.

pub mod animation;
pub mod config;
pub mod error;
pub mod event;
pub mod pet;
pub mod runner;
pub mod save;
pub mod settings;
pub mod status;

pub use animation::{AnimationTable, Animator, FsSpriteLoader, SpriteDescriptor, SpriteLoader, View};
pub use config::{Config, DataPaths};
pub use error::{Error, Result};
pub use event::{Event, EventReceiver, EventSender, Snapshot, StopReason};
pub use pet::{Action, DecayRules, PetRecord, PetState, Transition};
pub use runner::{Outcome, Runner, RunnerHandle};
pub use save::{SaveRecord, SaveWorker};
pub use settings::Settings;
pub use status::{status_message, Alert};
