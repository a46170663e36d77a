//! Snapshot persistence.
//!
//! The latest snapshot of each world is kept at `{directory}/{world_id}.json`.
//! Writes go through a temp file plus rename so readers never observe a torn
//! snapshot; there is no stronger crash consistency than the last completed
//! rename. The runner hands snapshots to a spawned task, so the write path
//! never touches the tick thread.

use std::path::PathBuf;

use mitos_protocol::WorldSnapshot;
use thiserror::Error;

/// An error raised while persisting a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The snapshot could not be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Writes world snapshots to a directory.
pub struct SnapshotRepository {
    directory: PathBuf,
}

impl SnapshotRepository {
    /// Creates the repository, making the directory if needed.
    pub fn new(directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Atomically replaces the stored snapshot for `world_id`.
    pub async fn save_snapshot(
        &self,
        world_id: &str,
        snapshot: &WorldSnapshot,
    ) -> Result<(), SnapshotError> {
        let data = serde_json::to_vec(snapshot)?;
        let path = self.directory.join(format!("{world_id}.json"));
        let staging = self.directory.join(format!(".{world_id}.json.tmp"));
        tokio::fs::write(&staging, data).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }
}
