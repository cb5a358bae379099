use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LarError, Result};

/// Default extension of script source files
pub const SCRIPT_EXTENSION: &str = "lua";

/// Default extension of packed archives
pub const ARCHIVE_EXTENSION: &str = "lar";

/// Configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "lar.yaml";

/// Runtime configuration for loading archives and running an entry module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LarConfig {
    /// Extension (without the dot) of script files packed and resolved
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// Archives to load, in priority order
    #[serde(default)]
    pub archives: Vec<PathBuf>,

    /// Fallback directories consulted after every archive misses
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Logical path of the entry script
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Strip the engine's native library searchers (default: true)
    #[serde(default = "default_true")]
    pub sandbox: bool,
}

fn default_script_extension() -> String {
    SCRIPT_EXTENSION.to_string()
}

fn default_entry() -> String {
    format!("main.{}", SCRIPT_EXTENSION)
}

fn default_true() -> bool {
    true
}

impl Default for LarConfig {
    fn default() -> Self {
        Self {
            script_extension: default_script_extension(),
            archives: Vec::new(),
            search_paths: Vec::new(),
            entry: default_entry(),
            sandbox: true,
        }
    }
}

/// Values given on the command line; `Some`/non-empty fields win over the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub script_extension: Option<String>,
    pub archives: Vec<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub entry: Option<String>,
    pub sandbox: Option<bool>,
}

impl LarConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LarError::io(path, e))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: LarConfig =
            serde_yaml::from_str(content).map_err(|e| LarError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Merge CLI overrides into this configuration
    ///
    /// Archives and search paths given on the command line replace the
    /// configured lists rather than extending them.
    pub fn merge(&mut self, overrides: &CliOverrides) {
        if let Some(ref ext) = overrides.script_extension {
            self.script_extension = ext.clone();
        }
        if !overrides.archives.is_empty() {
            self.archives = overrides.archives.clone();
        }
        if !overrides.search_paths.is_empty() {
            self.search_paths = overrides.search_paths.clone();
        }
        if let Some(ref entry) = overrides.entry {
            self.entry = entry.clone();
        }
        if let Some(sandbox) = overrides.sandbox {
            self.sandbox = sandbox;
        }
    }

    /// Reject extensions that could never match a file name suffix
    pub fn validate(&self) -> Result<()> {
        let ext = &self.script_extension;
        if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(LarError::Config(format!(
                "script extension must be a bare name like \"lua\", got {:?}",
                ext
            )));
        }
        if self.entry.is_empty() {
            return Err(LarError::Config("entry must not be empty".to_string()));
        }
        Ok(())
    }

    /// File name suffix recognized as a script, e.g. `.lua`
    pub fn script_suffix(&self) -> String {
        format!(".{}", self.script_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LarConfig::default();
        assert_eq!(config.script_extension, "lua");
        assert_eq!(config.entry, "main.lua");
        assert!(config.sandbox);
        assert!(config.archives.is_empty());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
archives:
  - game.lar
  - patch.lar
searchPaths:
  - scripts
sandbox: false
"#;
        let config = LarConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.archives,
            vec![PathBuf::from("game.lar"), PathBuf::from("patch.lar")]
        );
        assert_eq!(config.search_paths, vec![PathBuf::from("scripts")]);
        assert_eq!(config.entry, "main.lua");
        assert!(!config.sandbox);
    }

    #[test]
    fn test_merge_overrides() {
        let mut config = LarConfig {
            archives: vec![PathBuf::from("from_file.lar")],
            search_paths: vec![PathBuf::from("scripts")],
            ..LarConfig::default()
        };
        let overrides = CliOverrides {
            archives: vec![PathBuf::from("cli.lar")],
            entry: Some("boot.lua".to_string()),
            ..CliOverrides::default()
        };

        config.merge(&overrides);

        assert_eq!(config.archives, vec![PathBuf::from("cli.lar")]);
        assert_eq!(config.search_paths, vec![PathBuf::from("scripts")]);
        assert_eq!(config.entry, "boot.lua");
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let err = LarConfig::from_yaml("scriptExtension: .lua").unwrap_err();
        assert!(matches!(err, LarError::Config(_)));
    }
}
