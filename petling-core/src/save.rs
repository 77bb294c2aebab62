//! Save file persistence for the pet record.
//!
//! The pet is stored as a flat JSON object:
//!
//! ```json
//! {
//!   "name": "Tama",
//!   "hunger": 50,
//!   "happiness": 50,
//!   "health": 100,
//!   "energy": 100,
//!   "age": 0,
//!   "lastUpdateTime": "2024-03-01T12:00:00Z"
//! }
//! ```
//!
//! File I/O runs on a [`SaveWorker`] task that handles one request at a time,
//! so a load and a save, or two saves, never overlap.

use crate::error::{Error, Result};
use crate::pet::PetRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Requests buffered for the worker before senders wait.
const WORKER_QUEUE_SIZE: usize = 8;

/// The on-disk shape of a pet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub name: String,
    pub hunger: i32,
    pub happiness: i32,
    pub health: i32,
    pub energy: i32,
    pub age: u32,
    pub last_update_time: DateTime<Utc>,
}

impl From<&PetRecord> for SaveRecord {
    fn from(pet: &PetRecord) -> Self {
        Self {
            name: pet.name().to_string(),
            hunger: pet.hunger(),
            happiness: pet.happiness(),
            health: pet.health(),
            energy: pet.energy(),
            age: pet.age(),
            last_update_time: pet.last_update(),
        }
    }
}

impl From<SaveRecord> for PetRecord {
    fn from(record: SaveRecord) -> Self {
        let mut pet = PetRecord::new(record.name, record.last_update_time);
        pet.set_hunger(record.hunger);
        pet.set_happiness(record.happiness);
        pet.set_health(record.health);
        pet.set_energy(record.energy);
        pet.set_age(record.age);
        pet
    }
}

/// Load a pet from a save file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load(path: impl AsRef<Path>) -> Result<PetRecord> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::SaveRead {
        path: path.to_path_buf(),
        source,
    })?;

    let record: SaveRecord =
        serde_json::from_str(&content).map_err(|source| Error::SaveParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(record.into())
}

/// Load a pet, or start a fresh one named `name` if the file is missing or bad.
pub fn load_or_default(path: impl AsRef<Path>, name: &str) -> PetRecord {
    let path = path.as_ref();
    match load(path) {
        Ok(pet) => {
            info!(path = %path.display(), name = pet.name(), "loaded pet");
            pet
        }
        Err(Error::SaveRead { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no save file, hatching a new pet");
            PetRecord::new(name, Utc::now())
        }
        Err(e) => {
            warn!(error = %e, "could not load save file, hatching a new pet");
            PetRecord::new(name, Utc::now())
        }
    }
}

/// Write a pet to a save file, replacing it atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save(path: impl AsRef<Path>, pet: &PetRecord) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_vec_pretty(&SaveRecord::from(pet)).map_err(|source| {
        Error::Encode {
            path: path.to_path_buf(),
            source,
        }
    })?;

    write_atomic(path, &content).map_err(|source| Error::SaveWrite {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "saved pet");
    Ok(())
}

/// Write `data` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Reply for a save started with [`SaveWorker::start_save`].
pub type PendingSave = oneshot::Receiver<Result<()>>;

enum Request {
    Load {
        reply: oneshot::Sender<PetRecord>,
    },
    Save {
        pet: Box<PetRecord>,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the background task that owns save file I/O.
#[derive(Debug, Clone)]
pub struct SaveWorker {
    requests: mpsc::Sender<Request>,
    path: PathBuf,
}

impl SaveWorker {
    /// Spawn the worker for `path`. New pets hatched on load get `default_name`.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn spawn(
        path: impl Into<PathBuf>,
        default_name: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let path = path.into();
        let (tx, rx) = mpsc::channel(WORKER_QUEUE_SIZE);
        let task = tokio::spawn(run_worker(path.clone(), default_name.into(), rx));
        (Self { requests: tx, path }, task)
    }

    /// The save file this worker reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the pet, falling back to a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the worker has stopped.
    pub async fn load(&self) -> Result<PetRecord> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Load { reply })
            .await
            .map_err(|_| Error::ChannelClosed { what: "save worker" })?;
        rx.await
            .map_err(|_| Error::ChannelClosed { what: "save worker" })
    }

    /// Save a snapshot of the pet and wait for the write to finish.
    ///
    /// # Errors
    ///
    /// Returns the write error, or `Error::ChannelClosed` if the worker has stopped.
    pub async fn save(&self, pet: PetRecord) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Save {
                pet: Box::new(pet),
                reply,
            })
            .await
            .map_err(|_| Error::ChannelClosed { what: "save worker" })?;
        rx.await
            .map_err(|_| Error::ChannelClosed { what: "save worker" })?
    }

    /// Queue a save without waiting for it; await the returned receiver later.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the worker has stopped or its queue is full.
    pub fn start_save(&self, pet: PetRecord) -> Result<PendingSave> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .try_send(Request::Save {
                pet: Box::new(pet),
                reply,
            })
            .map_err(|_| Error::ChannelClosed { what: "save worker" })?;
        Ok(rx)
    }
}

async fn run_worker(path: PathBuf, default_name: String, mut requests: mpsc::Receiver<Request>) {
    while let Some(request) = requests.recv().await {
        match request {
            Request::Load { reply } => {
                let path = path.clone();
                let name = default_name.clone();
                let pet = tokio::task::spawn_blocking(move || load_or_default(&path, &name))
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "load task failed, hatching a new pet");
                        PetRecord::new(default_name.as_str(), Utc::now())
                    });
                let _ = reply.send(pet);
            }
            Request::Save { pet, reply } => {
                let path = path.clone();
                let result = tokio::task::spawn_blocking(move || save(&path, &pet))
                    .await
                    .unwrap_or_else(|e| Err(Error::other(format!("save task failed: {}", e))));
                if let Err(e) = &result {
                    warn!(error = %e, "save failed");
                }
                let _ = reply.send(result);
            }
        }
    }
    debug!("save worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::{Action, PetState};
    use chrono::TimeZone;

    fn sample_pet() -> PetRecord {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut pet = PetRecord::new("Mochi", at);
        pet.set_hunger(12);
        pet.set_happiness(77);
        pet.set_health(64);
        pet.set_energy(31);
        pet.set_age(9);
        pet
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        let pet = sample_pet();

        save(&path, &pet).expect("should save");
        let loaded = load(&path).expect("should load");

        assert_eq!(loaded.name(), "Mochi");
        assert_eq!(loaded.hunger(), 12);
        assert_eq!(loaded.happiness(), 77);
        assert_eq!(loaded.health(), 64);
        assert_eq!(loaded.energy(), 31);
        assert_eq!(loaded.age(), 9);
        assert_eq!(loaded.last_update(), pet.last_update());
    }

    #[test]
    fn test_save_uses_flat_camel_case_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        save(&path, &sample_pet()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let object = value.as_object().expect("flat object");
        for key in [
            "name",
            "hunger",
            "happiness",
            "health",
            "energy",
            "age",
            "lastUpdateTime",
        ] {
            assert!(object.contains_key(key), "missing {}", key);
        }
        assert_eq!(object.len(), 7);
        assert_eq!(value["lastUpdateTime"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_loaded_pet_starts_idle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        let mut pet = sample_pet();
        pet.apply(Action::Play);
        save(&path, &pet).unwrap();

        assert_eq!(load(&path).unwrap().state(), PetState::Idle);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        std::fs::write(
            &path,
            r#"{"name":"Odd","hunger":500,"happiness":-3,"health":100,"energy":40,"age":2,"lastUpdateTime":"2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();

        let pet = load(&path).unwrap();
        assert_eq!(pet.hunger(), 100);
        assert_eq!(pet.happiness(), 0);
    }

    #[test]
    fn test_missing_file_hatches_default_pet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nothing_here.json");

        assert!(matches!(load(&path), Err(Error::SaveRead { .. })));

        let pet = load_or_default(&path, "Tama");
        let fresh = PetRecord::new("Tama", pet.last_update());
        assert_eq!(pet, fresh);
    }

    #[test]
    fn test_corrupt_file_hatches_default_pet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        std::fs::write(&path, "{\"name\": \"Tama\", \"hunger\": ").unwrap();

        assert!(matches!(load(&path), Err(Error::SaveParse { .. })));

        let pet = load_or_default(&path, "Tama");
        assert_eq!(pet, PetRecord::new("Tama", pet.last_update()));
    }

    #[test]
    fn test_write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a").join("b").join("pet_save.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!dir.path().join("a").join("b").join("pet_save.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_worker_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        let (worker, task) = SaveWorker::spawn(&path, "Tama");

        worker.save(sample_pet()).await.expect("should save");
        let loaded = worker.load().await.expect("should load");
        assert_eq!(loaded.name(), "Mochi");
        assert_eq!(loaded.age(), 9);

        drop(worker);
        task.await.expect("worker should exit cleanly");
    }

    #[tokio::test]
    async fn test_worker_serializes_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pet_save.json");
        let (worker, _task) = SaveWorker::spawn(&path, "Tama");

        let mut first = sample_pet();
        first.set_hunger(1);
        let mut second = sample_pet();
        second.set_hunger(2);

        let pending_first = worker.start_save(first).unwrap();
        let pending_second = worker.start_save(second).unwrap();
        pending_first.await.unwrap().unwrap();
        pending_second.await.unwrap().unwrap();

        assert_eq!(worker.load().await.unwrap().hunger(), 2);
    }

    #[tokio::test]
    async fn test_worker_load_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (worker, _task) = SaveWorker::spawn(dir.path().join("pet_save.json"), "Pip");

        let pet = worker.load().await.unwrap();
        assert_eq!(pet.name(), "Pip");
        assert_eq!(pet.hunger(), 50);
    }
}
