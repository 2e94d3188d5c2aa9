//! Local message persistence shared by the leader and the members
//!
//! Every message lives in its own `<id>.msg` file under the data directory.
//! Writes overwrite; there are no partial-write states.

use crate::common::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

const FILE_EXTENSION: &str = "msg";

/// How message files are read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// Go through buffered readers/writers
    #[default]
    Buffered,
    /// One read or write call for the whole file
    Unbuffered,
}

impl std::fmt::Display for IoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoMode::Buffered => write!(f, "buffered"),
            IoMode::Unbuffered => write!(f, "unbuffered"),
        }
    }
}

impl std::str::FromStr for IoMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(IoMode::Buffered),
            "unbuffered" => Ok(IoMode::Unbuffered),
            other => Err(Error::InvalidConfig(format!(
                "unknown io mode: {} (expected buffered or unbuffered)",
                other
            ))),
        }
    }
}

/// Trait for message storage backends
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store `text` under `id`, replacing any previous value.
    async fn save(&self, id: i64, text: &str) -> Result<()>;

    /// `Ok(None)` is a clean miss; `Err` is an I/O failure.
    async fn load(&self, id: i64) -> Result<Option<String>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

/// On-disk store, one file per message
pub struct FileStore {
    dir: PathBuf,
    io_mode: IoMode,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>, io_mode: IoMode) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(dir = %dir.display(), %io_mode, "message store opened");
        Ok(Self { dir, io_mode })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn message_path(&self, id: i64) -> PathBuf {
        self.dir.join(format!("{}.{}", id, FILE_EXTENSION))
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn save(&self, id: i64, text: &str) -> Result<()> {
        let path = self.message_path(id);
        let res: std::io::Result<()> = match self.io_mode {
            IoMode::Buffered => async {
                let file = tokio::fs::File::create(&path).await?;
                let mut writer = BufWriter::new(file);
                writer.write_all(text.as_bytes()).await?;
                writer.flush().await
            }
            .await,
            IoMode::Unbuffered => tokio::fs::write(&path, text.as_bytes()).await,
        };
        res.map_err(|e| Error::Storage(format!("write {}: {}", path.display(), e)))?;
        tracing::debug!(id, path = %path.display(), "message saved");
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Option<String>> {
        let path = self.message_path(id);
        let res: std::io::Result<Vec<u8>> = match self.io_mode {
            IoMode::Buffered => async {
                let file = tokio::fs::File::open(&path).await?;
                let mut reader = BufReader::new(file);
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok::<_, std::io::Error>(buf)
            }
            .await,
            IoMode::Unbuffered => tokio::fs::read(&path).await,
        };

        match res {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| Error::Storage(format!("{} is not UTF-8: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("read {}: {}", path.display(), e))),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match tokio::fs::remove_file(self.message_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    async fn count(&self) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemStore {
    map: Mutex<HashMap<i64, String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemStore {
    async fn save(&self, id: i64, text: &str) -> Result<()> {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, text.to_string());
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Option<String>> {
        Ok(self
            .map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self
            .map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.map.lock().unwrap_or_else(PoisonError::into_inner).len())
    }
}
