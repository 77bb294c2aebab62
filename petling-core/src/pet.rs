//! The pet record and the rules that change it.
//!
//! [`PetRecord`] holds one creature's stats and its derived [`PetState`].
//! Stats move in two ways: time-based decay through [`PetRecord::update`],
//! and user actions through [`PetRecord::apply`]. Every write goes through a
//! clamping setter, so the four bounded stats never leave `0..=100`.

use crate::error::Error;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest value a bounded stat can hold.
pub const STAT_MIN: i32 = 0;

/// Highest value a bounded stat can hold.
pub const STAT_MAX: i32 = 100;

/// Name given to a pet when none is supplied.
pub const DEFAULT_PET_NAME: &str = "Tama";

const DEFAULT_HUNGER: i32 = 50;
const DEFAULT_HAPPINESS: i32 = 50;
const DEFAULT_HEALTH: i32 = 100;
const DEFAULT_ENERGY: i32 = 100;

/// Slack used when splitting accumulated decay into whole units, so that
/// sixty ticks of 1/60 land on exactly 1.
const CARRY_EPSILON: f64 = 1e-9;

/// The mood/activity label shown for the pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PetState {
    Idle,
    Eating,
    Playing,
    Sleeping,
    Hungry,
    Sick,
    Tired,
}

impl PetState {
    /// Every state, in declaration order.
    pub const ALL: [PetState; 7] = [
        PetState::Idle,
        PetState::Eating,
        PetState::Playing,
        PetState::Sleeping,
        PetState::Hungry,
        PetState::Sick,
        PetState::Tired,
    ];

    /// States forced by an action that the update rule leaves alone unless a
    /// higher-priority condition applies.
    pub fn is_activity(self) -> bool {
        matches!(self, PetState::Eating | PetState::Playing | PetState::Sleeping)
    }
}

impl fmt::Display for PetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PetState::Idle => "idle",
            PetState::Eating => "eating",
            PetState::Playing => "playing",
            PetState::Sleeping => "sleeping",
            PetState::Hungry => "hungry",
            PetState::Sick => "sick",
            PetState::Tired => "tired",
        };
        f.write_str(name)
    }
}

/// Rates and thresholds for the decay/update rule.
///
/// Passed explicitly to [`PetRecord::update`] so the rule can be exercised
/// without any process-wide state.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayRules {
    /// Hunger gained per elapsed minute.
    pub hunger_per_minute: f64,
    /// Energy lost per elapsed minute.
    pub energy_per_minute: f64,
    /// Happiness lost per elapsed minute.
    pub happiness_per_minute: f64,
    /// Health lost per elapsed minute while starving or miserable.
    pub health_per_minute: f64,
    /// Hunger above this makes the pet hungry and costs health.
    pub hungry_above: i32,
    /// Happiness below this costs health.
    pub unhappy_below: i32,
    /// Health below this makes the pet sick.
    pub sick_below: i32,
    /// Energy below this makes the pet tired.
    pub tired_below: i32,
    /// Longest gap a single update will simulate. `None` means uncapped.
    pub max_catch_up: Option<ChronoDuration>,
}

impl Default for DecayRules {
    fn default() -> Self {
        Self {
            hunger_per_minute: 2.0,
            energy_per_minute: 1.0,
            happiness_per_minute: 1.5,
            health_per_minute: 2.0,
            hungry_above: 80,
            unhappy_below: 20,
            sick_below: 30,
            tired_below: 20,
            max_catch_up: None,
        }
    }
}

impl DecayRules {
    /// Cap the gap a single update will simulate.
    pub fn max_catch_up(mut self, cap: Option<ChronoDuration>) -> Self {
        self.max_catch_up = cap;
        self
    }

    /// Clamp a raw gap to what the rule will simulate.
    fn effective_elapsed(&self, elapsed: ChronoDuration) -> ChronoDuration {
        let elapsed = elapsed.max(ChronoDuration::zero());
        match self.max_catch_up {
            Some(cap) if elapsed > cap => cap.max(ChronoDuration::zero()),
            _ => elapsed,
        }
    }
}

/// A user command that changes the pet immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Feed,
    Play,
    Sleep,
    Medicine,
}

/// The stat deltas and forced state of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEffect {
    pub hunger: i32,
    pub happiness: i32,
    pub energy: i32,
    pub health: i32,
    pub state: PetState,
}

impl Action {
    /// Every action, in menu order.
    pub const ALL: [Action; 4] = [Action::Feed, Action::Play, Action::Sleep, Action::Medicine];

    /// The lowercase command name.
    pub fn name(self) -> &'static str {
        match self {
            Action::Feed => "feed",
            Action::Play => "play",
            Action::Sleep => "sleep",
            Action::Medicine => "medicine",
        }
    }

    /// The sound effect played when this action is accepted.
    pub fn sound_cue(self) -> &'static str {
        self.name()
    }

    /// What the action does to the pet.
    pub fn effect(self) -> ActionEffect {
        match self {
            Action::Feed => ActionEffect {
                hunger: -30,
                happiness: 0,
                energy: 10,
                health: 0,
                state: PetState::Eating,
            },
            Action::Play => ActionEffect {
                hunger: 5,
                happiness: 20,
                energy: -15,
                health: 0,
                state: PetState::Playing,
            },
            Action::Sleep => ActionEffect {
                hunger: 0,
                happiness: 0,
                energy: 40,
                health: 0,
                state: PetState::Sleeping,
            },
            // Medicine leaves the pet marked sick until the next tick re-derives its state.
            Action::Medicine => ActionEffect {
                hunger: 0,
                happiness: -10,
                energy: 0,
                health: 30,
                state: PetState::Sick,
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.name() == wanted)
            .ok_or_else(|| Error::InvalidAction {
                name: s.trim().to_string(),
            })
    }
}

/// A state before and after a change to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PetState,
    pub to: PetState,
}

impl Transition {
    /// Whether the derived state moved.
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// Sub-unit decay that has not yet amounted to a whole stat point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Carry {
    hunger: f64,
    energy: f64,
    happiness: f64,
    health: f64,
    hours: f64,
}

/// Add `amount` to `carry` and take out the whole part.
fn take_whole(carry: &mut f64, amount: f64) -> i64 {
    let total = *carry + amount;
    let whole = (total + CARRY_EPSILON).floor();
    *carry = (total - whole).max(0.0);
    whole as i64
}

fn clamp_stat(value: i64) -> i32 {
    value.clamp(STAT_MIN as i64, STAT_MAX as i64) as i32
}

/// One creature's stats and derived state.
#[derive(Debug, Clone, PartialEq)]
pub struct PetRecord {
    name: String,
    hunger: i32,
    happiness: i32,
    health: i32,
    energy: i32,
    age: u32,
    state: PetState,
    last_update: DateTime<Utc>,
    carry: Carry,
}

impl Default for PetRecord {
    fn default() -> Self {
        Self::new(DEFAULT_PET_NAME, Utc::now())
    }
}

impl PetRecord {
    /// Create a pet with default stats, last updated at `now`.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            hunger: DEFAULT_HUNGER,
            happiness: DEFAULT_HAPPINESS,
            health: DEFAULT_HEALTH,
            energy: DEFAULT_ENERGY,
            age: 0,
            state: PetState::Idle,
            last_update: now,
            carry: Carry::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hunger(&self) -> i32 {
        self.hunger
    }

    pub fn happiness(&self) -> i32 {
        self.happiness
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn energy(&self) -> i32 {
        self.energy
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn state(&self) -> PetState {
        self.state
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set hunger, clamped to `0..=100`.
    pub fn set_hunger(&mut self, value: i32) {
        self.hunger = clamp_stat(value as i64);
    }

    /// Set happiness, clamped to `0..=100`.
    pub fn set_happiness(&mut self, value: i32) {
        self.happiness = clamp_stat(value as i64);
    }

    /// Set health, clamped to `0..=100`.
    pub fn set_health(&mut self, value: i32) {
        self.health = clamp_stat(value as i64);
    }

    /// Set energy, clamped to `0..=100`.
    pub fn set_energy(&mut self, value: i32) {
        self.energy = clamp_stat(value as i64);
    }

    pub fn set_age(&mut self, age: u32) {
        self.age = age;
    }

    pub fn set_state(&mut self, state: PetState) {
        self.state = state;
    }

    pub fn set_last_update(&mut self, at: DateTime<Utc>) {
        self.last_update = at;
    }

    fn shift_hunger(&mut self, delta: i64) {
        self.hunger = clamp_stat(self.hunger as i64 + delta);
    }

    fn shift_happiness(&mut self, delta: i64) {
        self.happiness = clamp_stat(self.happiness as i64 + delta);
    }

    fn shift_health(&mut self, delta: i64) {
        self.health = clamp_stat(self.health as i64 + delta);
    }

    fn shift_energy(&mut self, delta: i64) {
        self.energy = clamp_stat(self.energy as i64 + delta);
    }

    /// The state the priority rule picks for the current stats.
    ///
    /// Sick beats Tired beats Hungry. Otherwise an activity state is kept
    /// and anything else settles to Idle.
    pub fn derive_state(&self, rules: &DecayRules) -> PetState {
        if self.health < rules.sick_below {
            PetState::Sick
        } else if self.energy < rules.tired_below {
            PetState::Tired
        } else if self.hunger > rules.hungry_above {
            PetState::Hungry
        } else if self.state.is_activity() {
            self.state
        } else {
            PetState::Idle
        }
    }

    /// Apply decay for the time since the last update and re-derive the state.
    ///
    /// Works for any gap, so catching up after the process was closed is the
    /// same call as a one-second tick. A zero (or negative) gap only refreshes
    /// the timestamp.
    pub fn update(&mut self, now: DateTime<Utc>, rules: &DecayRules) -> Transition {
        let from = self.state;
        let elapsed = rules.effective_elapsed(now.signed_duration_since(self.last_update));
        self.last_update = now;

        if elapsed == ChronoDuration::zero() {
            return Transition { from, to: from };
        }

        let minutes = elapsed.num_milliseconds() as f64 / 60_000.0;
        let hours = minutes / 60.0;

        let hunger = take_whole(&mut self.carry.hunger, rules.hunger_per_minute * minutes);
        self.shift_hunger(hunger);
        let energy = take_whole(&mut self.carry.energy, rules.energy_per_minute * minutes);
        self.shift_energy(-energy);
        let happiness = take_whole(
            &mut self.carry.happiness,
            rules.happiness_per_minute * minutes,
        );
        self.shift_happiness(-happiness);

        if self.hunger > rules.hungry_above || self.happiness < rules.unhappy_below {
            let health = take_whole(&mut self.carry.health, rules.health_per_minute * minutes);
            self.shift_health(-health);
        }

        let whole_hours = take_whole(&mut self.carry.hours, hours);
        self.age = self
            .age
            .saturating_add(u32::try_from(whole_hours).unwrap_or(u32::MAX));

        self.state = self.derive_state(rules);
        Transition {
            from,
            to: self.state,
        }
    }

    /// Apply an action's stat deltas and force its state.
    pub fn apply(&mut self, action: Action) -> Transition {
        let from = self.state;
        let effect = action.effect();
        self.shift_hunger(effect.hunger as i64);
        self.shift_happiness(effect.happiness as i64);
        self.shift_energy(effect.energy as i64);
        self.shift_health(effect.health as i64);
        self.state = effect.state;
        Transition {
            from,
            to: self.state,
        }
    }
}
