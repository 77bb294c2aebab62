//! The periodic driver that keeps the pet alive.
//!
//! This module provides the `Runner`, a single task that owns the
//! [`PetRecord`] and is the only place it is mutated. It multiplexes:
//!
//! 1. the decay tick (once a second by default),
//! 2. the animation frame timer, whose cadence follows the active strip,
//! 3. the auto-save timer,
//! 4. the one-shot cooldown that re-enables interaction,
//! 5. completion of background saves,
//! 6. commands from [`RunnerHandle`]s.
//!
//! Every change is reported on the event channel.

use std::future::pending;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::animation::{Animator, FsSpriteLoader, SpriteLoader, View};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{channel, Event, EventReceiver, EventSender, Snapshot, StopReason};
use crate::pet::{Action, PetRecord};
use crate::save::{PendingSave, SaveWorker};
use crate::status::Alert;

/// Commands buffered for the runner before senders wait.
const COMMAND_QUEUE_SIZE: usize = 32;

/// Track started when the pet wakes up, if music is enabled.
const BACKGROUND_MUSIC: &str = "background_music.mp3";

enum Command {
    Act(Action),
    Save,
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Handle for sending commands to a running runner.
///
/// Handles are cheap to clone. The runner stops when the last one is dropped.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    commands: mpsc::Sender<Command>,
}

impl RunnerHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ChannelClosed { what: "runner" })
    }

    /// Ask the runner to apply an action. Dropped if interaction is disabled.
    pub async fn act(&self, action: Action) -> Result<()> {
        self.send(Command::Act(action)).await
    }

    /// Ask the runner to save now.
    pub async fn save(&self) -> Result<()> {
        self.send(Command::Save).await
    }

    /// Fetch a copy of the pet as it is now.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| Error::ChannelClosed { what: "runner" })
    }

    /// Ask the runner to save and stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

/// The outcome of a runner execution.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Why the runner stopped.
    pub reason: StopReason,
    /// Number of decay ticks run.
    pub ticks: u64,
    /// Whether the final save succeeded.
    pub saved: bool,
    /// The pet as it was saved.
    pub snapshot: Snapshot,
}

/// The periodic driver for one pet.
pub struct Runner<L = FsSpriteLoader> {
    config: Config,
    events: EventSender,
    commands: mpsc::Receiver<Command>,
    loader: L,
    worker: Option<SaveWorker>,
}

impl Runner<FsSpriteLoader> {
    /// Create a new runner that loads sprite sheets from `config.asset_dir`.
    ///
    /// Returns a tuple of (Runner, EventReceiver, RunnerHandle).
    /// - The `Runner` executes the main loop via [`Runner::run`].
    /// - The `EventReceiver` receives events from the runner.
    /// - The `RunnerHandle` sends actions and shutdown requests.
    ///
    /// # Examples
    ///
    /// ```
    /// use petling_core::{Config, Runner};
    ///
    /// let config = Config::new().pet_name("Mochi");
    /// let (runner, events, handle) = Runner::new(config);
    ///
    /// // The handle can be cloned and sent to another task
    /// let handle_clone = handle.clone();
    /// ```
    pub fn new(config: Config) -> (Self, EventReceiver, RunnerHandle) {
        let loader = FsSpriteLoader::new(config.asset_dir.clone());
        Self::with_loader(config, loader)
    }
}

impl<L: SpriteLoader> Runner<L> {
    /// Create a new runner with a custom sprite loader.
    pub fn with_loader(config: Config, loader: L) -> (Self, EventReceiver, RunnerHandle) {
        let (tx, rx) = channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);

        let runner = Self {
            config,
            events: tx,
            commands: command_rx,
            loader,
            worker: None,
        };

        (runner, rx, RunnerHandle { commands: command_tx })
    }

    /// Use an existing save worker instead of spawning one.
    ///
    /// A runner restarted after a crash should share the worker of the one
    /// it replaces, so its load cannot overlap a save still being written.
    /// The worker's path takes the place of `config.save_path`.
    pub fn save_worker(mut self, worker: SaveWorker) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Run until shutdown or until every handle is dropped.
    ///
    /// Loads the pet (hatching a new one if there is no usable save), catches
    /// up on the time since it was last saved, then drives the timers. On
    /// the way out the pet is saved once more and the outcome is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for an invalid config, or
    /// `Error::ChannelClosed` if the save worker dies during startup.
    pub async fn run(self) -> Result<Outcome> {
        let Runner {
            config,
            events,
            mut commands,
            loader,
            worker,
        } = self;
        config.validate()?;

        let (worker, worker_task) = match worker {
            Some(worker) => (worker, None),
            None => {
                let (worker, task) = SaveWorker::spawn(&config.save_path, &config.pet_name);
                (worker, Some(task))
            }
        };
        let mut pet = worker.load().await?;
        let caught_up = pet.update(Utc::now(), &config.decay);
        info!(
            name = pet.name(),
            state = %pet.state(),
            was = %caught_up.from,
            "pet is awake"
        );

        let animator = Animator::new(config.animations.clone(), loader);
        let mut session = Session::new(config, events, worker, pet, animator);
        session.emit(Event::Started {
            snapshot: session.snapshot(),
        });
        session.start_music();
        session.refresh_animation();
        session.check_alert();

        let mut tick = interval(session.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        let mut auto_save = session.config.auto_save_interval.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        let reason = loop {
            tokio::select! {
                _ = tick.tick() => session.on_tick(),
                _ = sleep_until_some(session.next_frame) => session.on_frame(),
                _ = tick_some(&mut auto_save) => session.start_save("auto-save"),
                _ = sleep_until_some(session.cooldown_until) => session.on_cooldown_over(),
                result = wait_save(&mut session.pending_save) => session.on_save_done(result),
                command = commands.recv() => match command {
                    Some(Command::Act(action)) => session.on_action(action),
                    Some(Command::Save) => session.start_save("requested"),
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(session.snapshot());
                    }
                    Some(Command::Shutdown) => break StopReason::Shutdown,
                    None => break StopReason::HandlesDropped,
                },
            }
        };

        info!(%reason, "runner stopping");
        let saved = session.final_save().await;
        let outcome = Outcome {
            reason,
            ticks: session.ticks,
            saved,
            snapshot: session.snapshot(),
        };
        session.emit(Event::Stopped { reason });

        drop(session);
        if let Some(task) = worker_task {
            if let Err(e) = task.await {
                warn!(error = %e, "save worker did not shut down cleanly");
            }
        }
        Ok(outcome)
    }
}

/// Everything the run loop mutates.
struct Session<L> {
    config: Config,
    events: EventSender,
    worker: SaveWorker,
    pet: PetRecord,
    animator: Animator<L>,
    cooldown_until: Option<Instant>,
    next_frame: Option<Instant>,
    pending_save: Option<PendingSave>,
    alert: Option<Alert>,
    ticks: u64,
}

impl<L: SpriteLoader> Session<L> {
    fn new(
        config: Config,
        events: EventSender,
        worker: SaveWorker,
        pet: PetRecord,
        animator: Animator<L>,
    ) -> Self {
        Self {
            config,
            events,
            worker,
            pet,
            animator,
            cooldown_until: None,
            next_frame: None,
            pending_save: None,
            alert: None,
            ticks: 0,
        }
    }

    /// Send an event without waiting; a full or closed channel drops it.
    fn emit(&self, event: Event) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            debug!(?event, "event channel full, dropping event");
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::of(&self.pet, self.cooldown_until.is_none())
    }

    fn refresh_animation(&mut self) {
        let state = self.pet.state();
        if !self.animator.select(state) {
            return;
        }
        let view = self.animator.view().clone();
        if !matches!(view, View::Sprite { .. }) {
            self.emit(Event::warning(format!(
                "no animation for the {} state, showing a fallback",
                state
            )));
        }
        self.emit(Event::Frame { view });
        self.schedule_frame();
    }

    fn start_music(&self) {
        if self.config.music {
            self.emit(Event::Music {
                track: BACKGROUND_MUSIC,
                volume: self.config.music_volume,
            });
        }
    }

    fn schedule_frame(&mut self) {
        self.next_frame = self
            .animator
            .frame_interval()
            .map(|period| Instant::now() + period);
    }

    fn on_tick(&mut self) {
        self.ticks += 1;
        let transition = self.pet.update(Utc::now(), &self.config.decay);
        if transition.is_change() {
            debug!(from = %transition.from, to = %transition.to, "state changed");
            self.emit(Event::StateChanged {
                from: transition.from,
                to: transition.to,
            });
            self.refresh_animation();
        }
        self.emit(Event::Ticked {
            snapshot: self.snapshot(),
        });
        self.check_alert();
    }

    fn check_alert(&mut self) {
        if !self.config.notifications {
            return;
        }
        let alert = Alert::check(&self.pet);
        if alert == self.alert {
            return;
        }
        self.alert = alert;
        if let Some(alert) = alert {
            info!(%alert, "critical condition");
            self.emit(Event::Notification { alert });
            if let Some(cue) = alert.sound_cue() {
                self.play(cue);
            }
        }
    }

    fn play(&self, cue: &'static str) {
        if self.config.sounds {
            self.emit(Event::Sound {
                cue,
                volume: self.config.sound_volume,
            });
        }
    }

    fn on_frame(&mut self) {
        if self.animator.advance() {
            self.emit(Event::Frame {
                view: self.animator.view().clone(),
            });
        }
        self.schedule_frame();
    }

    fn on_action(&mut self, action: Action) {
        if self.cooldown_until.is_some() {
            debug!(%action, "interaction disabled, dropping action");
            self.emit(Event::ActionRejected { action });
            return;
        }

        let transition = self.pet.apply(action);
        let cooldown = self.config.cooldown_for(action);
        self.cooldown_until = Some(Instant::now() + cooldown);
        info!(%action, state = %transition.to, "action applied");

        self.emit(Event::ActionApplied {
            action,
            snapshot: self.snapshot(),
        });
        if transition.is_change() {
            self.emit(Event::StateChanged {
                from: transition.from,
                to: transition.to,
            });
        }
        self.refresh_animation();
        self.play(action.sound_cue());
        self.emit(Event::InteractionChanged { enabled: false });
    }

    fn on_cooldown_over(&mut self) {
        self.cooldown_until = None;
        self.emit(Event::InteractionChanged { enabled: true });
    }

    fn start_save(&mut self, why: &str) {
        if self.pending_save.is_some() {
            debug!(why, "save already in flight, skipping");
            return;
        }
        match self.worker.start_save(self.pet.clone()) {
            Ok(pending) => {
                debug!(why, "save started");
                self.pending_save = Some(pending);
            }
            Err(e) => {
                warn!(error = %e, why, "could not start save");
                self.emit(Event::save_failed(e.to_string()));
            }
        }
    }

    fn on_save_done(&mut self, result: Result<()>) {
        self.pending_save = None;
        match result {
            Ok(()) => self.emit(Event::Saved {
                path: self.worker.path().to_path_buf(),
            }),
            Err(e) => {
                warn!(error = %e, "save failed");
                self.emit(Event::save_failed(e.to_string()));
            }
        }
    }

    /// Wait out any save in flight, then write the pet one last time.
    async fn final_save(&mut self) -> bool {
        if let Some(rx) = self.pending_save.take() {
            let result = rx
                .await
                .unwrap_or(Err(Error::ChannelClosed { what: "save worker" }));
            self.on_save_done(result);
        }

        match self.worker.save(self.pet.clone()).await {
            Ok(()) => {
                self.emit(Event::Saved {
                    path: self.worker.path().to_path_buf(),
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "final save failed");
                self.emit(Event::save_failed(e.to_string()));
                false
            }
        }
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick_some(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}

async fn wait_save(pending_save: &mut Option<PendingSave>) -> Result<()> {
    match pending_save {
        Some(rx) => rx
            .await
            .unwrap_or(Err(Error::ChannelClosed { what: "save worker" })),
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::SpriteSheet;
    use crate::event::EventReceiver;
    use crate::pet::PetState;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Serves any sheet whose name is listed.
    struct Sheets(Vec<&'static str>);

    impl SpriteLoader for Sheets {
        fn load(&mut self, path: &Path) -> Result<SpriteSheet> {
            if self.0.iter().any(|name| Path::new(name) == path) {
                Ok(SpriteSheet {
                    path: path.to_path_buf(),
                    data: Arc::from(&b"png"[..]),
                })
            } else {
                Err(Error::sprite_load(path, "not found"))
            }
        }
    }

    fn session(
        dir: &TempDir,
        config: Config,
        sheets: Vec<&'static str>,
    ) -> (Session<Sheets>, EventReceiver, PathBuf) {
        let path = dir.path().join("pet_save.json");
        let (events, rx) = channel();
        let (worker, _task) = SaveWorker::spawn(&path, "Test");
        let pet = PetRecord::new("Test", Utc::now());
        let animator = Animator::new(config.animations.clone(), Sheets(sheets));
        (Session::new(config, events, worker, pet, animator), rx, path)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_same_state_reselect_keeps_frame_timing() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx, _) =
            session(&dir, Config::default(), vec!["playing_sheet.png"]);

        session.on_action(Action::Play);
        let first_deadline = session.next_frame.expect("playing strip is scheduled");
        assert_eq!(session.animator.frame(), 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        session.on_cooldown_over();
        drain(&mut rx);

        session.on_action(Action::Play);
        assert_eq!(session.pet.state(), PetState::Playing);
        assert_eq!(session.next_frame, Some(first_deadline));
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, Event::Frame { .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::StateChanged { .. })));
    }

    #[tokio::test]
    async fn test_action_reports_state_change_and_sound() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx, _) = session(&dir, Config::default(), vec!["eating_sheet.png"]);

        session.on_action(Action::Feed);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::StateChanged {
                from: PetState::Idle,
                to: PetState::Eating
            }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Sound { cue: "feed", .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::InteractionChanged { enabled: false })));
    }

    #[tokio::test]
    async fn test_sounds_disabled_emits_no_cue() {
        let dir = TempDir::new().unwrap();
        let config = Config::new().sounds(false);
        let (mut session, mut rx, _) = session(&dir, config, vec![]);

        session.on_action(Action::Sleep);
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ActionApplied { .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::Sound { .. })));
    }

    #[tokio::test]
    async fn test_tick_reports_state_change() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx, _) = session(&dir, Config::default(), vec![]);
        session.pet.set_hunger(85);
        session.pet.set_last_update(Utc::now() - chrono::Duration::seconds(1));

        session.on_tick();
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::StateChanged {
                from: PetState::Idle,
                to: PetState::Hungry
            }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Ticked { snapshot } if snapshot.state == PetState::Hungry
        )));
        assert_eq!(session.ticks, 1);
    }

    #[tokio::test]
    async fn test_alert_fires_only_when_it_changes() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx, _) = session(&dir, Config::default(), vec![]);
        session.pet.set_health(10);

        session.check_alert();
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Notification {
                alert: Alert::HealthCritical
            }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Sound { cue: "sick", .. })));

        session.check_alert();
        assert!(drain(&mut rx).is_empty());

        session.pet.set_health(100);
        session.check_alert();
        assert!(drain(&mut rx).is_empty());

        session.pet.set_health(10);
        session.check_alert();
        assert_eq!(
            drain(&mut rx)
                .iter()
                .filter(|e| matches!(e, Event::Notification { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_notifications_disabled() {
        let dir = TempDir::new().unwrap();
        let config = Config::new().notifications(false);
        let (mut session, mut rx, _) = session(&dir, config, vec![]);
        session.pet.set_health(10);

        session.check_alert();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_save_skipped_while_one_is_in_flight() {
        let dir = TempDir::new().unwrap();
        let (mut session, _rx, path) = session(&dir, Config::default(), vec![]);

        let (in_flight, rx) = oneshot::channel();
        session.pending_save = Some(rx);
        session.start_save("test");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!path.exists());

        in_flight.send(Ok(())).unwrap();
        let result = wait_save(&mut session.pending_save).await;
        session.on_save_done(result);
        assert!(session.pending_save.is_none());

        session.start_save("test");
        let result = wait_save(&mut session.pending_save).await;
        assert!(result.is_ok());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_sheet_warns() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx, _) = session(&dir, Config::default(), vec![]);

        session.refresh_animation();
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, Event::Warning { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Frame { view: View::Blank })));
        assert!(session.next_frame.is_none());
    }

    #[tokio::test]
    async fn test_music_follows_config() {
        let dir = TempDir::new().unwrap();
        let (enabled, mut rx, _) = session(&dir, Config::default(), vec![]);
        enabled.start_music();
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            Event::Music {
                track: "background_music.mp3",
                ..
            }
        )));

        let (disabled, mut rx, _) = session(&dir, Config::new().music(false), vec![]);
        disabled.start_music();
        assert!(drain(&mut rx).is_empty());
    }
}
