use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::store::{GoalStore, StoreOptions};
use crate::types::StoreSnapshot;

/// Namespaced storage key; also the snapshot file stem.
pub const STORAGE_KEY: &str = "target-achiever-storage";
const DATA_DIR: &str = ".target-achiever";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("couldn't find home directory")]
    NoHomeDir,
}

/// Owns the goal store and its on-disk JSON snapshot.
pub struct Storage {
    storage_path: PathBuf,
    store: GoalStore,
}

impl Storage {
    pub fn new(options: StoreOptions) -> Result<Self, StorageError> {
        Ok(Self::with_path(Self::default_path()?, options))
    }

    pub fn with_path(storage_path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            storage_path: storage_path.into(),
            store: GoalStore::new(options),
        }
    }

    pub fn default_path() -> Result<PathBuf, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoHomeDir)?;
        Ok(home.join(DATA_DIR).join(format!("{STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    pub fn store(&self) -> &GoalStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GoalStore {
        &mut self.store
    }

    /// Load the snapshot if one exists, otherwise write an empty one.
    pub fn initialize(&mut self) -> Result<(), StorageError> {
        if let Some(data_dir) = self.storage_path.parent() {
            fs::create_dir_all(data_dir)?;
        }

        if self.storage_path.exists() {
            let snapshot = Self::load(&self.storage_path)?;
            tracing::info!(
                path = %self.storage_path.display(),
                targets = snapshot.targets.len(),
                users = snapshot.users.len(),
                "loaded goal store"
            );
            self.store = GoalStore::from_snapshot(snapshot, self.store.options());
        } else {
            self.save()?;
        }

        Ok(())
    }

    pub fn load(path: &Path) -> Result<StoreSnapshot, StorageError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn snapshot_for_save(&self) -> (PathBuf, StoreSnapshot) {
        (self.storage_path.clone(), self.store.snapshot().clone())
    }

    pub async fn save_snapshot_async(
        storage_path: PathBuf,
        data: StoreSnapshot,
    ) -> Result<(), StorageError> {
        tokio::task::spawn_blocking(move || write_snapshot(&storage_path, &data))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!(
                    "spawn_blocking failed: {}",
                    e
                )))
            })?
    }

    /// Persist the current store synchronously using a temporary file and an
    /// atomic rename to avoid partial writes.
    ///
    /// Callers sharing one `Storage` serialize saves by holding its lock across
    /// the save; otherwise an older snapshot may land last.
    pub fn save(&self) -> Result<(), StorageError> {
        write_snapshot(&self.storage_path, self.store.snapshot())
    }

    pub async fn save_async(&self) -> Result<(), StorageError> {
        let (path, data) = self.snapshot_for_save();
        Storage::save_snapshot_async(path, data).await
    }
}

/// Each call writes its own temp file beside the target, so concurrent
/// writers never share a half-written file; the rename is atomic.
fn write_snapshot(storage_path: &Path, data: &StoreSnapshot) -> Result<(), StorageError> {
    let dir = match storage_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let content = serde_json::to_vec_pretty(data)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&content)?;
    temp.as_file().sync_all()?;
    temp.persist(storage_path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Registration;
    use crate::types::{Action, Obstacle, Priority, Step, Target, Task};
    use chrono::NaiveDate;

    fn populated(storage: &mut Storage) {
        let store = storage.store_mut();
        let user = store
            .register_user(Registration {
                name: "Grace".into(),
                email: "grace@example.com".into(),
                password: "hopper".into(),
                profile: None,
            })
            .unwrap();
        let target = Target::new(&user.id, "Write a compiler", "A-0", "career", "software");
        let target_id = target.id.clone();
        store.add_target(target).unwrap();

        let action = Action::new("Design IR", Priority::High, Priority::Medium);
        let action_id = action.id.clone();
        store.add_action(&target_id, action).unwrap();

        let mut task = Task::new("read papers");
        task.deadline = NaiveDate::from_ymd_opt(2025, 6, 30);
        let step = Step::new("Survey").with_tasks(vec![task, Task::new("summarize")]);
        store.add_step(&target_id, &action_id, step).unwrap();
        store
            .add_obstacle(&target_id, &action_id, Obstacle::new("No funding"))
            .unwrap();
        store.toggle_favorite(&target_id);
    }

    #[test]
    fn save_then_load_reproduces_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let mut storage = Storage::with_path(&path, StoreOptions::default());
        storage.initialize().unwrap();
        assert!(path.exists());

        populated(&mut storage);
        storage.save().unwrap();

        let mut reloaded = Storage::with_path(&path, StoreOptions::default());
        reloaded.initialize().unwrap();
        assert_eq!(reloaded.store().snapshot(), storage.store().snapshot());
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut storage = Storage::with_path(&path, StoreOptions::default());
        populated(&mut storage);
        storage.save().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"currentUserId\""));
        assert!(raw.contains("\"passwordHash\""));
        assert!(raw.contains("\"targetId\""));
        assert!(!raw.contains("hopper"));
    }

    #[tokio::test]
    async fn async_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut storage = Storage::with_path(&path, StoreOptions::default());
        populated(&mut storage);
        storage.save_async().await.unwrap();

        let loaded = Storage::load(&path).unwrap();
        assert_eq!(&loaded, storage.store().snapshot());
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();
        let mut storage = Storage::with_path(&path, StoreOptions::default());
        assert!(matches!(storage.initialize(), Err(StorageError::Json(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_corrupt_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut storage = Storage::with_path(&path, StoreOptions::default());
        populated(&mut storage);

        let mut writers = tokio::task::JoinSet::new();
        for n in 0..32 {
            let mut snapshot = storage.store().snapshot().clone();
            snapshot.current_user_id = Some(format!("writer-{n}"));
            writers.spawn(Storage::save_snapshot_async(path.clone(), snapshot));
        }
        while let Some(joined) = writers.join_next().await {
            joined.unwrap().unwrap();
        }

        let loaded = Storage::load(&path).unwrap();
        assert!(loaded.current_user_id.unwrap().starts_with("writer-"));
        assert_eq!(loaded.targets, storage.store().snapshot().targets);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
