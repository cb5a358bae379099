use std::path::PathBuf;
use thiserror::Error;

/// Opaque error reported by the scripting engine
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum LarError {
    #[error("Archive file not found: {path}")]
    ContainerNotFound { path: PathBuf },

    #[error("Corrupted archive {archive}: {reason}")]
    ContainerCorrupt { archive: String, reason: String },

    #[error("Archive already loaded: {archive}")]
    DuplicateLoad { archive: String },

    #[error("Entry {path} not found in archive {archive}")]
    EntryNotFound { archive: String, path: String },

    #[error("Module not found in any archive or search path: {path}")]
    ModuleNotFound { path: String },

    #[error("Cannot create archive {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive {archive} is closed, {path} was never read")]
    ArchiveClosed { archive: String, path: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(EngineError),
}

impl LarError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LarError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "not in this layer" misses that resolution skips over
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            LarError::EntryNotFound { .. } | LarError::ModuleNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LarError>;
