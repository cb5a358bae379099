//! The loader bridge between `require` and the archive set

use std::sync::Arc;
use tracing::{debug, warn};

use crate::archive_set::{Layers, ResolvedModule};

/// Translate a dotted module name into a logical path
///
/// `net.http` with extension `lua` becomes `net/http.lua`.
pub fn module_path(name: &str, extension: &str) -> String {
    format!("{}.{}", name.replace('.', "/"), extension)
}

/// Handle the engine's searcher calls back into
///
/// Holds the archive layers through an `Arc` so the engine callback never
/// needs a global to find its resolver.
#[derive(Clone)]
pub struct ModuleLoader {
    layers: Arc<Layers>,
    extension: String,
}

impl ModuleLoader {
    pub(crate) fn new(layers: Arc<Layers>, extension: impl Into<String>) -> Self {
        Self {
            layers,
            extension: extension.into(),
        }
    }

    pub fn module_path(&self, name: &str) -> String {
        module_path(name, &self.extension)
    }

    /// Resolve a dotted module name
    ///
    /// Every failure collapses to `None` so the engine moves on to its
    /// remaining searchers.
    pub fn load(&self, name: &str) -> Option<ResolvedModule> {
        let path = self.module_path(name);
        match self.layers.resolve(&path) {
            Ok(module) => {
                debug!("require '{}' resolved to {} ({})", name, path, module.origin);
                Some(module)
            }
            Err(e) if e.is_miss() => {
                debug!("require '{}': {} not found", name, path);
                None
            }
            Err(e) => {
                warn!("require '{}': {}", name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_path_translation() {
        assert_eq!(module_path("util", "lua"), "util.lua");
        assert_eq!(module_path("net.http.client", "lua"), "net/http/client.lua");
        assert_eq!(module_path("game", "luau"), "game.luau");
    }

    #[test]
    fn test_load_miss_is_none() {
        let loader = ModuleLoader::new(Arc::new(Layers::default()), "lua");
        assert!(loader.load("missing").is_none());
    }
}
