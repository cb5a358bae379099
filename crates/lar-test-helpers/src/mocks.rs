//! Mock implementations for testing

use lar_core::archive_set::ResolvedModule;
use lar_core::{EngineError, ModuleLoader, ScriptEngine};

/// A script engine that records what it is asked to do instead of running it
#[derive(Default)]
pub struct RecordingEngine {
    loader: Option<ModuleLoader>,
    pub sandboxed: bool,
    pub search_patterns: Vec<String>,
    pub executed: Vec<(String, Vec<u8>)>,
    /// When set, every `exec` fails with this message
    pub fail_with: Option<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn loader_installed(&self) -> bool {
        self.loader.is_some()
    }

    /// Ask the installed loader for a module, as a `require` would
    pub fn require(&self, name: &str) -> Option<ResolvedModule> {
        self.loader.as_ref().and_then(|loader| loader.load(name))
    }

    pub fn executed_chunks(&self) -> Vec<&str> {
        self.executed.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl ScriptEngine for RecordingEngine {
    fn install_loader(&mut self, loader: ModuleLoader, sandbox: bool) -> Result<(), EngineError> {
        self.loader = Some(loader);
        self.sandboxed = sandbox;
        Ok(())
    }

    fn append_search_path(&mut self, pattern: &str) -> Result<(), EngineError> {
        self.search_patterns.push(pattern.to_string());
        Ok(())
    }

    fn exec(&mut self, chunk_name: &str, source: &[u8]) -> Result<(), EngineError> {
        if let Some(ref message) = self.fail_with {
            return Err(message.clone().into());
        }
        self.executed.push((chunk_name.to_string(), source.to_vec()));
        Ok(())
    }
}
