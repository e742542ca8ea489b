//! On-disk session snapshots, one JSON file per session id.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::workflow::SessionSnapshot;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode session snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Writes to a temp file first so a crash never leaves half a snapshot.
    /// Each save gets its own temp file; overlapping saves of one session
    /// each rename atomically and the last one wins.
    pub async fn save(&self, id: Uuid, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(snapshot)?;
        let path = self.path_for(id);
        let tmp = self.dir.join(format!("{id}.{}.json.tmp", Uuid::new_v4().simple()));
        let written = match fs::write(&tmp, body).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("Saved session {id} at step {}", snapshot.step);
        Ok(())
    }

    /// `Ok(None)` when there is no snapshot, or when it was corrupted; a
    /// corrupted file is removed so the session starts over.
    pub async fn load(&self, id: Uuid) -> Result<Option<SessionSnapshot>, StorageError> {
        let path = self.path_for(id);
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&body) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("Discarding corrupted session snapshot {}: {e}", path.display());
                self.remove(id).await?;
                Ok(None)
            }
        }
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
