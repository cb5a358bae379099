//! Scripting engine seam
//!
//! [`ScriptEngine`] is everything the archive set needs from an interpreter:
//! somewhere to install the archive searcher, a `package.path`-style list to
//! extend, and a way to run source text. [`LuaEngine`] is the production
//! implementation on top of `mlua`.

use mlua::{Lua, Table, Value};
use tracing::debug;

use crate::error::EngineError;
use crate::loader::ModuleLoader;

/// Number of searchers kept when native loading is stripped: preload and
/// the `package.path` source searcher
const SOURCE_SEARCHERS: usize = 2;

pub trait ScriptEngine: Send {
    /// Insert the archive searcher into the engine's module search chain
    ///
    /// With `sandbox` set, searchers that load native libraries are removed
    /// first so only source modules can ever be required.
    fn install_loader(&mut self, loader: ModuleLoader, sandbox: bool) -> Result<(), EngineError>;

    /// Append a search pattern such as `/srv/scripts/?.lua` to the engine's
    /// own path-based lookup
    fn append_search_path(&mut self, pattern: &str) -> Result<(), EngineError>;

    /// Compile and run `source` synchronously
    fn exec(&mut self, chunk_name: &str, source: &[u8]) -> Result<(), EngineError>;
}

/// Lua 5.4 engine
pub struct LuaEngine {
    lua: Lua,
}

impl LuaEngine {
    /// Fresh Lua state with the safe standard libraries
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }

    /// Wrap a state the host has already configured
    pub fn with_lua(lua: Lua) -> Self {
        Self { lua }
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Current value of `package.path`
    pub fn package_path(&self) -> Result<String, EngineError> {
        let package: Table = self.lua.globals().get("package")?;
        Ok(package.get("path")?)
    }
}

impl Default for LuaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for LuaEngine {
    fn install_loader(&mut self, loader: ModuleLoader, sandbox: bool) -> Result<(), EngineError> {
        let package: Table = self.lua.globals().get("package")?;
        let searchers: Table = package.get("searchers")?;

        if sandbox {
            while searchers.raw_len() > SOURCE_SEARCHERS {
                searchers.raw_remove(searchers.raw_len())?;
            }
            debug!("Removed native library searchers");
        }

        let searcher = self.lua.create_function(move |lua, name: String| {
            let Some(module) = loader.load(&name) else {
                let message = format!("no module '{}' in loaded archives", name);
                return Ok((Value::String(lua.create_string(message)?), Value::Nil));
            };

            let chunk = lua
                .load(&*module.source)
                .set_name(format!("@{}", module.path))
                .into_function()
                .map_err(|e| {
                    mlua::Error::RuntimeError(format!(
                        "error loading module '{}' from {}:\n\t{}",
                        name, module.origin, e
                    ))
                })?;
            Ok((
                Value::Function(chunk),
                Value::String(lua.create_string(&module.path)?),
            ))
        })?;

        // Right after preload, so archives shadow files on package.path
        searchers.raw_insert(2, searcher)?;
        Ok(())
    }

    fn append_search_path(&mut self, pattern: &str) -> Result<(), EngineError> {
        let package: Table = self.lua.globals().get("package")?;
        let current: String = package.get("path")?;

        let mut patterns: Vec<&str> = Vec::new();
        for p in current.split(';').chain(std::iter::once(pattern)) {
            if !p.is_empty() && !patterns.contains(&p) {
                patterns.push(p);
            }
        }

        package.set("path", patterns.join(";"))?;
        Ok(())
    }

    fn exec(&mut self, chunk_name: &str, source: &[u8]) -> Result<(), EngineError> {
        self.lua.load(source).set_name(chunk_name).exec()?;
        Ok(())
    }
}
