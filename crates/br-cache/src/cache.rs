//! Disk-backed cache of decrypted chunks.
//!
//! Each cached chunk is one plain file named by its hash directly inside the
//! cache directory. Logical membership lives only in the in-memory
//! [`CostIndex`]; files without an index entry are garbage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use br_core::{ChunkHash, Error, PlaintextChunk, Result};
use bytes::Bytes;
use dashmap::DashSet;
use tokio::io::AsyncWriteExt;

use crate::index::{Admission, CostIndex};

/// Process-wide chunk cache shared by every stream.
pub struct ChunkCache {
    dir: PathBuf,
    chunk_cost: u64,
    index: Arc<CostIndex>,
    /// Hashes with a write or an eviction delete in flight.
    busy: Arc<DashSet<ChunkHash>>,
}

/// Claim on a hash in the busy set, released on drop.
struct BusySlot<'a> {
    busy: &'a DashSet<ChunkHash>,
    hash: &'a ChunkHash,
}

impl<'a> BusySlot<'a> {
    fn claim(busy: &'a DashSet<ChunkHash>, hash: &'a ChunkHash) -> Option<Self> {
        busy.insert(hash.clone()).then_some(Self { busy, hash })
    }
}

impl Drop for BusySlot<'_> {
    fn drop(&mut self) {
        self.busy.remove(self.hash);
    }
}

impl ChunkCache {
    /// Open the cache at `dir`, creating the directory if needed.
    ///
    /// Leftover chunk files from a previous run are deleted so the disk
    /// agrees with the empty index. Anything in the directory that does not
    /// look like a chunk file is a configuration error.
    pub fn open(dir: impl Into<PathBuf>, max_cost: u64, chunk_cost: u64) -> Result<Arc<Self>> {
        let dir = dir.into();
        create_dir(&dir)?;

        let mut removed = 0usize;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if entry.file_type()?.is_dir() || !ChunkHash::is_hash_shaped(&name) {
                return Err(Error::Config(format!(
                    "cache directory {} contains a foreign entry: {name}",
                    dir.display()
                )));
            }
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }

        tracing::info!(
            dir = %dir.display(),
            max_cost,
            removed,
            "Chunk cache initialized"
        );

        Ok(Arc::new(Self {
            dir,
            chunk_cost,
            index: Arc::new(CostIndex::new(max_cost)),
            busy: Arc::new(DashSet::new()),
        }))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `hash`.
    pub fn path_for(&self, hash: &ChunkHash) -> PathBuf {
        self.dir.join(hash.as_str())
    }

    /// Whether `hash` is cached. Not counted as an access.
    pub fn has(&self, hash: &ChunkHash) -> bool {
        self.index.contains(hash)
    }

    /// Read a cached chunk back from disk.
    ///
    /// An index hit whose file cannot be read (evicted concurrently, or
    /// removed behind our back) drops the stale entry and reports a miss.
    pub async fn get(&self, hash: &ChunkHash) -> Option<PlaintextChunk> {
        if !self.index.touch(hash) {
            tracing::debug!(hash = %hash.short(), "Cache miss");
            return None;
        }

        let path = self.path_for(hash);
        match tokio::fs::read(&path).await {
            Ok(data) => Some(PlaintextChunk::cached(path, Bytes::from(data))),
            Err(e) => {
                tracing::warn!(
                    hash = %hash.short(),
                    "Chunk indexed but unreadable on disk: {e}"
                );
                self.index.remove(hash);
                None
            }
        }
    }

    /// Store decrypted chunk contents.
    ///
    /// Content is immutable per hash: if the file already exists it is kept
    /// as-is and only registered. Evicted chunks have their files deleted in
    /// the background.
    pub async fn set(&self, hash: &ChunkHash, plaintext: Bytes) -> Result<PlaintextChunk> {
        let path = self.path_for(hash);

        // Held until the hash is registered so an eviction delete for the
        // same hash cannot interleave with the write.
        let Some(_slot) = BusySlot::claim(&self.busy, hash) else {
            tracing::debug!(hash = %hash.short(), "Chunk busy, skipping write");
            return Ok(PlaintextChunk::Remote(plaintext));
        };

        let chunk = match self.write_exclusive(&path, &plaintext).await? {
            true => {
                tracing::debug!(hash = %hash.short(), bytes = plaintext.len(), "Chunk written");
                PlaintextChunk::cached(path, plaintext)
            }
            false => match tokio::fs::read(&path).await {
                Ok(data) => {
                    tracing::debug!(hash = %hash.short(), "Chunk already on disk, not overwriting");
                    PlaintextChunk::cached(path, Bytes::from(data))
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(hash = %hash.short(), "Existing chunk file vanished, rewriting");
                    if !self.write_exclusive(&path, &plaintext).await? {
                        return Err(Error::Cache(format!(
                            "{} keeps reappearing while being rewritten",
                            path.display()
                        )));
                    }
                    PlaintextChunk::cached(path, plaintext)
                }
                Err(e) => return Err(e.into()),
            },
        };

        match self.index.insert(hash.clone(), self.chunk_cost) {
            Admission::Admitted { evicted } => {
                for victim in evicted {
                    self.spawn_delete(victim);
                }
            }
            Admission::Present => {}
            Admission::Rejected => {
                let _ = tokio::fs::remove_file(self.path_for(hash)).await;
                return Err(Error::Cache(format!(
                    "chunk cost {} exceeds cache budget {}",
                    self.chunk_cost,
                    self.index.max_cost()
                )));
            }
        }

        Ok(chunk)
    }

    /// Drop `hash` from the cache and delete its file.
    pub async fn remove(&self, hash: &ChunkHash) {
        self.index.remove(hash);
        match tokio::fs::remove_file(self.path_for(hash)).await {
            Ok(()) => tracing::debug!(hash = %hash.short(), "Chunk removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(hash = %hash.short(), "Failed to remove chunk file: {e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Cost currently charged against the budget.
    pub fn total_cost(&self) -> u64 {
        self.index.total_cost()
    }

    /// Create-exclusive write. Returns `Ok(false)` if the file already exists.
    async fn write_exclusive(&self, path: &Path, data: &[u8]) -> Result<bool> {
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(Error::Cache(format!("failed to create {}: {e}", path.display())))
            }
        };

        let result = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            drop(file);
            let _ = tokio::fs::remove_file(path).await;
            return Err(Error::Cache(format!("failed to write {}: {e}", path.display())));
        }
        Ok(true)
    }

    /// Delete an evicted chunk's file, unless the hash was registered again
    /// or is being rewritten by then.
    fn spawn_delete(&self, hash: ChunkHash) {
        let path = self.path_for(&hash);
        let index = Arc::clone(&self.index);
        let busy = Arc::clone(&self.busy);
        tokio::spawn(async move {
            let Some(_slot) = BusySlot::claim(&busy, &hash) else {
                tracing::debug!(hash = %hash.short(), "Evicted chunk is being rewritten, keeping file");
                return;
            };
            if index.contains(&hash) {
                tracing::debug!(hash = %hash.short(), "Evicted chunk was cached again, keeping file");
                return;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(hash = %hash.short(), "Chunk evicted"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(hash = %hash.short(), "Failed to delete evicted chunk: {e}"),
            }
        });
    }
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}
