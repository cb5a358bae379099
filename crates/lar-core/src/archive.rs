//! A single packed script archive
//!
//! The central directory is indexed when the archive is opened, but entry
//! data is only decompressed the first time a logical path is read. Read
//! bytes live in a per-archive cache for the archive's whole lifetime, so the
//! container is touched at most once per entry.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{LarError, Result};

/// Largest uncompressed entry an archive may declare
///
/// The declared size comes from the container itself and is never used to
/// size an allocation beyond this bound.
pub const MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

/// Seekable byte source an archive can be read from
trait Container: Read + Seek + Send {}

impl<T: Read + Seek + Send> Container for T {}

/// Normalize a container entry name into a logical path
///
/// Backslashes become `/` and leading separators are stripped, so
/// `\lib\util.lua` and `lib/util.lua` name the same module.
pub fn normalize_logical_path(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
}

struct ArchiveState {
    /// `None` once the archive has been closed
    container: Option<ZipArchive<Box<dyn Container>>>,
    cache: FxHashMap<String, Arc<[u8]>>,
    container_reads: usize,
}

/// Immutable, lazily materialized view over one packed container
pub struct Archive {
    name: String,
    /// Logical path -> index of the entry in the container
    entries: FxHashMap<String, usize>,
    state: Mutex<ArchiveState>,
}

impl Archive {
    /// Open an archive file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LarError::ContainerNotFound {
                path: path.to_path_buf(),
            },
            _ => LarError::io(path, e),
        })?;
        Self::from_container(path.display().to_string(), Box::new(file))
    }

    /// Open an archive held in memory under a caller-chosen name
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        Self::from_container(name.into(), Box::new(Cursor::new(data)))
    }

    fn from_container(name: String, reader: Box<dyn Container>) -> Result<Self> {
        let mut container = ZipArchive::new(reader).map_err(|e| corrupt(&name, e))?;

        let mut entries = FxHashMap::default();
        for index in 0..container.len() {
            let entry = container
                .by_index_raw(index)
                .map_err(|e| corrupt(&name, e))?;
            if entry.is_dir() {
                continue;
            }
            entries.insert(normalize_logical_path(entry.name()), index);
        }

        info!("Opened archive {} with {} entries", name, entries.len());

        Ok(Self {
            name,
            entries,
            state: Mutex::new(ArchiveState {
                container: Some(container),
                cache: FxHashMap::default(),
                container_reads: 0,
            }),
        })
    }

    /// Identity the archive was opened under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, logical_path: &str) -> bool {
        self.entries.contains_key(logical_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical paths of every script entry, sorted
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Read the bytes stored under `logical_path`
    ///
    /// The first successful read decompresses the entry and caches it; every
    /// later read is served from the cache, even after [`Archive::close`].
    pub fn read(&self, logical_path: &str) -> Result<Arc<[u8]>> {
        let index = *self
            .entries
            .get(logical_path)
            .ok_or_else(|| LarError::EntryNotFound {
                archive: self.name.clone(),
                path: logical_path.to_string(),
            })?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(bytes) = state.cache.get(logical_path) {
            return Ok(bytes.clone());
        }

        let container = state
            .container
            .as_mut()
            .ok_or_else(|| LarError::ArchiveClosed {
                archive: self.name.clone(),
                path: logical_path.to_string(),
            })?;

        let data = {
            let entry = container
                .by_index(index)
                .map_err(|e| corrupt(&self.name, e))?;
            let declared = entry.size();
            if declared > MAX_ENTRY_SIZE {
                return Err(corrupt(
                    &self.name,
                    format!("entry {} declares {} bytes", logical_path, declared),
                ));
            }
            let mut data = Vec::with_capacity(declared as usize);
            entry
                .take(MAX_ENTRY_SIZE + 1)
                .read_to_end(&mut data)
                .map_err(|e| corrupt(&self.name, e))?;
            if data.len() as u64 > MAX_ENTRY_SIZE {
                return Err(corrupt(
                    &self.name,
                    format!("entry {} exceeds {} bytes", logical_path, MAX_ENTRY_SIZE),
                ));
            }
            data
        };
        state.container_reads += 1;

        debug!(
            "Read {} ({} bytes) from archive {}",
            logical_path,
            data.len(),
            self.name
        );

        let bytes: Arc<[u8]> = data.into();
        state.cache.insert(logical_path.to_string(), bytes.clone());
        Ok(bytes)
    }

    /// Release the underlying container; cached entries stay readable
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.container.take().is_some() {
            info!("Closed archive {}", self.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().container.is_none()
    }

    /// How many times entry data has been pulled from the container
    pub fn container_reads(&self) -> usize {
        self.state.lock().container_reads
    }

    /// Number of entries currently held in the byte cache
    pub fn cached_len(&self) -> usize {
        self.state.lock().cache.len()
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn corrupt(archive: &str, err: impl fmt::Display) -> LarError {
    LarError::ContainerCorrupt {
        archive: archive.to_string(),
        reason: err.to_string(),
    }
}
