//! Append-only JSON-lines store
//!
//! One record per line. Every write is synced to disk before the call
//! returns, and a failed write is truncated away again. The whole file is
//! replayed into memory on open; a torn final line left by a crash
//! mid-write is dropped. Purging compacts the file by writing a
//! replacement and renaming it into place.

use crate::error::StoreError;
use crate::record::{InsertOutcome, Record, RecordId, RecordLog, RecordQuery, Scope};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug)]
struct FileState {
    log: RecordLog,
    file: File,
}

/// File-backed durable store
///
/// The async mutex is held across the existence check and the synced
/// write, which makes `insert_if_absent` atomic for every caller sharing
/// this instance.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Open (or create) the store at `path`, replaying existing records
    ///
    /// # Errors
    /// - `StoreError::Io` if the file cannot be read or opened
    /// - `StoreError::Corrupt` if a complete line is not a valid record
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let Replay { log, repair } = replay(&path).await?;
        let mut file = open_for_append(&path).await?;
        match repair {
            Some(Repair::Truncate(len)) => {
                tracing::warn!(
                    "Dropping torn final line of {} at byte {}",
                    path.display(),
                    len
                );
                file.set_len(len).await.map_err(|e| StoreError::io(&path, e))?;
            }
            Some(Repair::Terminate) => {
                file.write_all(b"\n").await.map_err(|e| StoreError::io(&path, e))?;
                file.sync_data().await.map_err(|e| StoreError::io(&path, e))?;
            }
            None => {}
        }
        tracing::debug!(
            "Opened file store {} ({} records)",
            path.display(),
            log.all().count()
        );

        Ok(Self {
            path,
            state: Mutex::new(FileState { log, file }),
        })
    }

    /// Backing file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, file: &mut File, record: &Record) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let committed = file
            .metadata()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();

        let written = async {
            file.write_all(&line).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;
        if let Err(e) = written {
            if let Err(rollback) = file.set_len(committed).await {
                tracing::error!(
                    "Failed to truncate partial write to {}: {}",
                    self.path.display(),
                    rollback
                );
            }
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }

    async fn compact(&self, state: &mut FileState) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("compact");
        let mut contents = Vec::new();
        for record in state.log.all() {
            contents.extend(serde_json::to_vec(record)?);
            contents.push(b'\n');
        }

        let mut out = File::create(&tmp)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        out.write_all(&contents)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        out.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
        drop(out);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        state.file = open_for_append(&self.path).await?;
        Ok(())
    }
}

/// Fix-up applied to the file before appending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    /// Cut a torn final line at this byte length
    Truncate(u64),
    /// Final record is whole but lacks its newline
    Terminate,
}

#[derive(Debug)]
struct Replay {
    log: RecordLog,
    repair: Option<Repair>,
}

async fn replay(path: &Path) -> Result<Replay, StoreError> {
    let mut log = RecordLog::default();
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Replay { log, repair: None })
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut offset = 0usize;
    let mut repair = None;
    for (idx, chunk) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
        let start = offset;
        offset += chunk.len();
        let terminated = chunk.ends_with(b"\n");
        if chunk.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Record>(chunk) {
            Ok(record) => {
                log.push(record);
                if !terminated {
                    repair = Some(Repair::Terminate);
                }
            }
            Err(_) if !terminated => {
                repair = Some(Repair::Truncate(u64::try_from(start).unwrap_or(u64::MAX)));
            }
            Err(e) => {
                return Err(StoreError::Corrupt {
                    line: idx + 1,
                    message: e.to_string(),
                })
            }
        }
    }
    Ok(Replay { log, repair })
}

async fn open_for_append(path: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[async_trait::async_trait]
impl RecordStore for FileStore {
    async fn append(&self, record: Record) -> Result<RecordId, StoreError> {
        let mut state = self.state.lock().await;
        self.write_line(&mut state.file, &record).await?;
        Ok(state.log.push(record))
    }

    async fn insert_if_absent(&self, record: Record) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .log
            .live_entry(record.scope, &record.key, record.recorded_at)
        {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        self.write_line(&mut state.file, &record).await?;
        Ok(InsertOutcome::Inserted(state.log.push(record)))
    }

    async fn query(&self, scope: Scope, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        Ok(self.state.lock().await.log.query(scope, query))
    }

    async fn purge_expired(&self, scope: Scope, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let removed = state.log.purge_expired(scope, now);
        if removed > 0 {
            self.compact(&mut state).await?;
            tracing::debug!("Compacted {} after purging {} records", self.path.display(), removed);
        }
        Ok(removed)
    }
}
