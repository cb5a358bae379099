//! Layered module resolution over loaded archives and search paths
//!
//! Archives are consulted in load order and the first one holding a logical
//! path wins. Search-path directories are only consulted after every archive
//! has missed, again in registration order.
//!
//! Loads and runs contend on the same layer lock: loading takes it
//! exclusively, while running a script holds a shared guard for the whole
//! execution, and the loader bridge re-enters that shared guard whenever the
//! script requires a module. A load can therefore never reorder the layers
//! under an in-flight resolution.

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::archive::Archive;
use crate::config::LarConfig;
use crate::engine::{LuaEngine, ScriptEngine};
use crate::error::{LarError, Result};
use crate::loader::ModuleLoader;

/// Chunk name used for source handed to [`ArchiveSet::run_source`]
const SOURCE_CHUNK_NAME: &str = "=(lar)";

/// Where a resolved module came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Identity of the archive that held the module
    Archive(String),
    /// File found under a search path
    SearchPath(PathBuf),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Archive(name) => write!(f, "archive {}", name),
            Origin::SearchPath(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Result of resolving a single logical path
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub path: String,
    pub source: Arc<[u8]>,
    pub origin: Origin,
}

impl ResolvedModule {
    pub fn source_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.source)
    }
}

#[derive(Debug, Default)]
struct LayerState {
    archives: IndexMap<String, Archive>,
    search_paths: Vec<PathBuf>,
}

impl LayerState {
    fn resolve(&self, logical_path: &str) -> Result<ResolvedModule> {
        for (name, archive) in &self.archives {
            if !archive.contains(logical_path) {
                continue;
            }
            let source = archive.read(logical_path)?;
            debug!("Resolved {} from archive {}", logical_path, name);
            return Ok(ResolvedModule {
                path: logical_path.to_string(),
                source,
                origin: Origin::Archive(name.clone()),
            });
        }

        if !stays_inside(logical_path) {
            debug!("Refusing {} outside the search paths", logical_path);
            return Err(LarError::ModuleNotFound {
                path: logical_path.to_string(),
            });
        }

        for dir in &self.search_paths {
            let candidate = dir.join(logical_path);
            if !candidate.is_file() {
                continue;
            }
            let data = std::fs::read(&candidate).map_err(|e| LarError::io(&candidate, e))?;
            debug!("Resolved {} from {}", logical_path, candidate.display());
            return Ok(ResolvedModule {
                path: logical_path.to_string(),
                source: data.into(),
                origin: Origin::SearchPath(candidate),
            });
        }

        Err(LarError::ModuleNotFound {
            path: logical_path.to_string(),
        })
    }
}

/// Whether joining `logical_path` onto a directory stays below it
fn stays_inside(logical_path: &str) -> bool {
    Path::new(logical_path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Archive layers shared between the archive set and the loader bridge
#[derive(Debug, Default)]
pub(crate) struct Layers {
    state: RwLock<LayerState>,
}

impl Layers {
    pub(crate) fn resolve(&self, logical_path: &str) -> Result<ResolvedModule> {
        self.state.read_recursive().resolve(logical_path)
    }
}

/// Ordered set of loaded archives and search paths bound to one engine
pub struct ArchiveSet<E: ScriptEngine = LuaEngine> {
    layers: Arc<Layers>,
    engine: Mutex<E>,
    config: LarConfig,
}

impl ArchiveSet<LuaEngine> {
    /// Archive set over a fresh Lua state with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(LarConfig::default())
    }

    pub fn with_config(config: LarConfig) -> Result<Self> {
        Self::with_engine(LuaEngine::new(), config)
    }
}

impl<E: ScriptEngine> ArchiveSet<E> {
    /// Bind an archive set to `engine`, installing the loader bridge once
    pub fn with_engine(mut engine: E, config: LarConfig) -> Result<Self> {
        config.validate()?;

        let layers = Arc::new(Layers::default());
        let loader = ModuleLoader::new(layers.clone(), config.script_extension.clone());
        engine
            .install_loader(loader, config.sandbox)
            .map_err(LarError::Engine)?;

        Ok(Self {
            layers,
            engine: Mutex::new(engine),
            config,
        })
    }

    pub fn config(&self) -> &LarConfig {
        &self.config
    }

    /// Load an archive file; it resolves after every archive loaded before it
    pub fn load_archive(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let identity = canonical.display().to_string();

        let mut state = self.layers.state.write();
        if state.archives.contains_key(&identity) {
            return Err(LarError::DuplicateLoad { archive: identity });
        }

        let archive = Archive::open(&canonical)?;
        info!("Loaded archive {} ({} scripts)", identity, archive.len());
        state.archives.insert(identity, archive);
        Ok(())
    }

    /// Load an in-memory archive under `name`
    pub fn load_archive_from_memory(&self, name: impl Into<String>, data: Vec<u8>) -> Result<()> {
        let name = name.into();

        let mut state = self.layers.state.write();
        if state.archives.contains_key(&name) {
            return Err(LarError::DuplicateLoad { archive: name });
        }

        let archive = Archive::from_bytes(name.clone(), data)?;
        info!("Loaded archive {} ({} scripts)", name, archive.len());
        state.archives.insert(name, archive);
        Ok(())
    }

    /// Load several archive files in order, stopping at the first failure
    pub fn load_archives<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.load_archive(path)?;
        }
        Ok(())
    }

    /// Register a fallback directory
    ///
    /// Paths that do not exist or are not directories are ignored without
    /// error. Accepted directories are also appended to the engine's own
    /// search path.
    pub fn add_search_path(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();

        let mut state = self.layers.state.write();
        if !dir.is_dir() {
            debug!("Ignoring search path {}: not a directory", dir.display());
            return Ok(());
        }

        let normalized = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if state.search_paths.contains(&normalized) {
            return Ok(());
        }

        let pattern = format!(
            "{}/?{}",
            normalized.display(),
            self.config.script_suffix()
        );
        self.engine
            .lock()
            .append_search_path(&pattern)
            .map_err(LarError::Engine)?;

        info!("Added search path {}", normalized.display());
        state.search_paths.push(normalized);
        Ok(())
    }

    pub fn add_search_paths<I, P>(&self, dirs: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for dir in dirs {
            self.add_search_path(dir)?;
        }
        Ok(())
    }

    /// Resolve a logical path across archives, then search paths
    pub fn resolve(&self, logical_path: &str) -> Result<ResolvedModule> {
        self.layers.resolve(logical_path)
    }

    /// Hand source text to the engine; engine errors come back untouched
    pub fn run_source(&self, code: &str) -> Result<()> {
        let _layers = self.layers.state.read_recursive();
        self.exec(SOURCE_CHUNK_NAME, code.as_bytes())
    }

    /// Resolve `logical_path` and run it
    pub fn run_file(&self, logical_path: &str) -> Result<()> {
        let layers = self.layers.state.read_recursive();
        let module = layers.resolve(logical_path)?;
        self.exec(&format!("@{}", module.path), &module.source)
    }

    /// Run a script straight from disk, bypassing archives and search paths
    pub fn run_disk_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = std::fs::read(path).map_err(|e| LarError::io(path, e))?;

        let _layers = self.layers.state.read_recursive();
        self.exec(&format!("@{}", path.display()), &source)
    }

    fn exec(&self, chunk_name: &str, source: &[u8]) -> Result<()> {
        self.engine
            .lock()
            .exec(chunk_name, source)
            .map_err(LarError::Engine)
    }

    /// Identities of loaded archives in resolution order
    pub fn archive_names(&self) -> Vec<String> {
        self.layers.state.read().archives.keys().cloned().collect()
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.layers.state.read().search_paths.clone()
    }

    /// Lock the engine, e.g. to read globals a script left behind
    ///
    /// Do not call `run_*` from the same thread while the guard is alive.
    pub fn engine(&self) -> MutexGuard<'_, E> {
        self.engine.lock()
    }

    /// A loader bridge over this set's layers
    pub fn loader(&self) -> ModuleLoader {
        ModuleLoader::new(self.layers.clone(), self.config.script_extension.clone())
    }
}
