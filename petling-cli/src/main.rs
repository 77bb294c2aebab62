//! Petling CLI - A desktop pet in your terminal.

use anyhow::{bail, Context, Result};
use clap::Parser;
use petling_core::{
    Action, Config, DataPaths, Event, EventReceiver, Outcome, Runner, RunnerHandle, SaveWorker,
    Settings, Snapshot, View,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Petling - Look after a small virtual pet.
///
/// The pet gets hungrier, sadder, and more tired as time passes, even while
/// Petling is closed. Type `feed`, `play`, `sleep`, or `medicine` to care for
/// it, `status` to see how it is doing, `save` to save now, and `quit` to
/// leave.
#[derive(Parser, Debug)]
#[command(name = "petling")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the save file, settings, and error log.
    ///
    /// Defaults to the per-user data directory.
    #[arg(long = "data-dir", env = "PETLING_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to the save file. Overrides the data directory.
    #[arg(short = 's', long = "save")]
    pub save: Option<PathBuf>,

    /// Path to the settings file. Overrides the data directory.
    #[arg(long = "settings")]
    pub settings: Option<PathBuf>,

    /// Directory holding the sprite sheets.
    #[arg(
        short = 'a',
        long = "assets",
        default_value = "assets/images",
        env = "PETLING_ASSETS"
    )]
    pub assets: PathBuf,

    /// Name for a newly hatched pet.
    ///
    /// Ignored when a save file already exists.
    #[arg(short = 'n', long = "name", default_value = "Tama")]
    pub name: String,

    /// Longest time away, in hours, that is simulated on start.
    ///
    /// By default the whole gap since the last save is simulated.
    #[arg(long = "max-catch-up")]
    pub max_catch_up: Option<u32>,

    /// Times the pet is restarted from its last save after a crash.
    #[arg(long = "max-restarts", default_value = "3")]
    pub max_restarts: u32,

    /// Print every animation frame.
    #[arg(short = 'f', long = "frames")]
    pub frames: bool,

    /// Enable verbose output.
    ///
    /// When enabled, every tick and debug log is printed.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Resolve where the pet's files live.
    pub fn data_paths(&self) -> Result<DataPaths> {
        let mut paths = match &self.data_dir {
            Some(dir) => DataPaths::in_dir(dir),
            None => DataPaths::user_default()?,
        };
        if let Some(ref path) = self.save {
            paths.save_file = path.clone();
        }
        if let Some(ref path) = self.settings {
            paths.settings_file = path.clone();
        }
        Ok(paths)
    }

    /// Convert CLI arguments and settings to a Config.
    pub fn to_config(&self, paths: &DataPaths, settings: &Settings) -> Config {
        let mut config = Config::new()
            .settings(settings)
            .pet_name(&self.name)
            .save_path(&paths.save_file)
            .asset_dir(&self.assets);

        if let Some(hours) = self.max_catch_up {
            config = config.max_catch_up(Some(chrono::Duration::hours(i64::from(hours))));
        }

        config
    }
}

/// A line typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Act(Action),
    Save,
    Status,
    Help,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Input> {
        let line = line.trim();
        if let Ok(action) = line.parse::<Action>() {
            return Some(Input::Act(action));
        }
        match line.to_ascii_lowercase().as_str() {
            "save" => Some(Input::Save),
            "status" | "s" => Some(Input::Status),
            "help" | "?" => Some(Input::Help),
            "quit" | "exit" | "q" => Some(Input::Quit),
            _ => None,
        }
    }
}

const HELP: &str = "commands: feed, play, sleep, medicine, status, save, quit";

fn init_logging(verbose: bool, error_log: &std::path::Path) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Some(parent) = error_log.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(error_log)
        .with_context(|| format!("failed to open error log {}", error_log.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(LevelFilter::ERROR),
        )
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!(%panic, "unexpected failure");
    }));
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "{} ({}h old) | hunger {:>3} | happiness {:>3} | health {:>3} | energy {:>3} | {}",
        snapshot.name,
        snapshot.age,
        snapshot.hunger,
        snapshot.happiness,
        snapshot.health,
        snapshot.energy,
        snapshot.status
    );
}

fn print_view(view: &View) {
    match view {
        View::Sprite {
            sheet,
            frame,
            frame_count,
        } => println!("[{} {}/{}]", sheet.display(), frame + 1, frame_count),
        View::Placeholder { image } => println!("[{}]", image.display()),
        View::Blank => println!("[ ]"),
    }
}

/// Print events until the runner stops.
async fn print_events(mut events: EventReceiver, frames: bool, verbose: bool) {
    while let Some(event) = events.recv().await {
        match event {
            Event::Started { snapshot } => {
                println!("{} is here! {}", snapshot.name, HELP);
                print_snapshot(&snapshot);
            }
            Event::Ticked { snapshot } if verbose => print_snapshot(&snapshot),
            Event::Ticked { .. } => {}
            Event::StateChanged { to, .. } => {
                println!("{}", petling_core::status_message(to));
            }
            Event::ActionApplied { snapshot, .. } => print_snapshot(&snapshot),
            Event::ActionRejected { action } => {
                println!("Your pet is busy, try {} again in a moment.", action);
            }
            Event::InteractionChanged { enabled } if verbose => {
                println!(
                    "(interaction {})",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            Event::InteractionChanged { .. } => {}
            Event::Frame { view } if frames => print_view(&view),
            Event::Frame { .. } => {}
            Event::Sound { cue, volume } if verbose => {
                println!("(sound: {} at {:.0}%)", cue, volume * 100.0);
            }
            Event::Sound { .. } => {}
            Event::Music { track, volume } if verbose => {
                println!("(music: {} at {:.0}%)", track, volume * 100.0);
            }
            Event::Music { .. } => {}
            Event::Notification { alert } => {
                println!("*** {} {} ***", alert.title(), alert.message());
            }
            Event::Saved { path } => info!(path = %path.display(), "pet saved"),
            Event::SaveFailed { message } => eprintln!("Could not save: {}", message),
            Event::Warning { message } => eprintln!("Warning: {}", message),
            Event::Stopped { reason } => info!(%reason, "runner stopped"),
        }
    }
}

/// Forward typed lines into `input` until stdin closes.
async fn read_stdin(input: mpsc::Sender<Input>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match Input::parse(&line) {
                Some(parsed) => {
                    if input.send(parsed).await.is_err() {
                        break;
                    }
                }
                None => println!("Unknown command '{}'. {}", line.trim(), HELP),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "could not read stdin");
                break;
            }
        }
    }
}

/// Handle one line of input for the running pet.
async fn dispatch(handle: &RunnerHandle, input: Input) -> petling_core::Result<()> {
    match input {
        Input::Act(action) => handle.act(action).await,
        Input::Save => handle.save().await,
        Input::Status => {
            print_snapshot(&handle.snapshot().await?);
            Ok(())
        }
        Input::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Input::Quit => handle.shutdown().await,
    }
}

/// Run one incarnation of the pet until it stops or the task fails.
async fn run_once(
    config: Config,
    worker: SaveWorker,
    input: &mut mpsc::Receiver<Input>,
    cli: &Cli,
) -> std::result::Result<petling_core::Result<Outcome>, JoinError> {
    let (runner, events, handle) = Runner::new(config);
    let printer = tokio::spawn(print_events(events, cli.frames, cli.verbose));
    let mut task = tokio::spawn(runner.save_worker(worker).run());
    let mut input_open = true;

    let finished = loop {
        tokio::select! {
            result = &mut task => break result,
            line = input.recv(), if input_open => {
                let line = line.unwrap_or_else(|| {
                    input_open = false;
                    Input::Quit
                });
                if let Err(e) = dispatch(&handle, line).await {
                    warn!(error = %e, "command not delivered");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = handle.shutdown().await {
                    warn!(error = %e, "shutdown not delivered");
                }
            }
        }
    };

    drop(handle);
    if let Err(e) = printer.await {
        warn!(error = %e, "event printer failed");
    }
    finished
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = cli.data_paths()?;
    init_logging(cli.verbose, &paths.error_log)?;

    let settings = Settings::load_or_default(&paths.settings_file);
    let config = cli.to_config(&paths, &settings);
    config.validate()?;
    info!(save = %paths.save_file.display(), "starting petling");

    let (input_tx, mut input_rx) = mpsc::channel(16);
    tokio::spawn(read_stdin(input_tx));

    // Shared by every restart so a new load never overlaps an old save
    let (worker, worker_task) = SaveWorker::spawn(&config.save_path, &config.pet_name);

    let mut restarts = 0;
    loop {
        match run_once(config.clone(), worker.clone(), &mut input_rx, &cli).await {
            Ok(result) => {
                let outcome = result.context("pet runner failed")?;
                drop(worker);
                if let Err(e) = worker_task.await {
                    warn!(error = %e, "save worker did not shut down cleanly");
                }
                if !outcome.saved {
                    eprintln!("Warning: the pet could not be saved on exit.");
                }
                println!("Goodbye from {}!", outcome.snapshot.name);
                return Ok(());
            }
            Err(e) if e.is_panic() => {
                error!(error = %e, restarts, "pet runner crashed");
                if restarts >= cli.max_restarts {
                    bail!("pet runner crashed {} times, giving up", restarts + 1);
                }
                restarts += 1;
                eprintln!(
                    "Something went wrong; details are in {}. Restarting from the last save.",
                    paths.error_log.display()
                );
            }
            Err(e) => return Err(e).context("pet runner was cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse("feed"), Some(Input::Act(Action::Feed)));
        assert_eq!(Input::parse("  Medicine "), Some(Input::Act(Action::Medicine)));
        assert_eq!(Input::parse("SAVE"), Some(Input::Save));
        assert_eq!(Input::parse("q"), Some(Input::Quit));
        assert_eq!(Input::parse("dance"), None);
    }

    #[test]
    fn test_cli_paths_from_data_dir() {
        let cli = Cli::parse_from(["petling", "--data-dir", "/tmp/pet", "--settings", "/etc/s.json"]);
        let paths = cli.data_paths().unwrap();
        assert_eq!(paths.save_file, PathBuf::from("/tmp/pet/pet_save.json"));
        assert_eq!(paths.settings_file, PathBuf::from("/etc/s.json"));
        assert_eq!(paths.error_log, PathBuf::from("/tmp/pet/error_log.txt"));
    }

    #[test]
    fn test_cli_to_config() {
        let cli = Cli::parse_from([
            "petling",
            "--data-dir",
            "/tmp/pet",
            "--name",
            "Mochi",
            "--max-catch-up",
            "12",
        ]);
        let paths = cli.data_paths().unwrap();
        let settings = Settings {
            auto_save: false,
            ..Settings::default()
        };
        let config = cli.to_config(&paths, &settings);
        assert_eq!(config.pet_name, "Mochi");
        assert_eq!(config.save_path, PathBuf::from("/tmp/pet/pet_save.json"));
        assert!(config.auto_save_interval.is_none());
        assert_eq!(config.decay.max_catch_up, Some(chrono::Duration::hours(12)));
    }
}
