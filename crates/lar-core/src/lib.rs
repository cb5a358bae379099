//! Lua script archives and archive-backed module resolution
//!
//! Scripts are packed into `.lar` files (ZIP containers) by [`Packer`]. At
//! runtime an [`ArchiveSet`] layers any number of archives and fallback
//! directories, and answers the engine's `require` calls through the loader
//! bridge.

pub mod archive;
pub mod archive_set;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod packer;

pub use archive::Archive;
pub use archive_set::{ArchiveSet, Origin, ResolvedModule};
pub use config::{CliOverrides, LarConfig};
pub use engine::{LuaEngine, ScriptEngine};
pub use error::{EngineError, LarError, Result};
pub use loader::{module_path, ModuleLoader};
pub use packer::{PackReport, Packer};
