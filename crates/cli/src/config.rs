//! Configuration file handling
//!
//! `axewatch.toml` holds the engine settings plus console preferences.
//! Lookup order: `--config`, `./axewatch.toml`, then the user config dir.

use crate::theme::Appearance;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use watcher::EngineConfig;

/// File name looked up in the working directory
pub const LOCAL_FILE: &str = "axewatch.toml";

/// Everything `axewatch.toml` can hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxewatchConfig {
    pub engine: EngineConfig,
    pub console: ConsoleConfig,
}

/// Console output preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Color theme selection
    pub appearance: Appearance,
    /// Emit ANSI colors
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            appearance: Appearance::Auto,
            color: true,
        }
    }
}

impl AxewatchConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("Invalid [engine] settings")?;
        Ok(())
    }
}

/// Resolve which config file to use
///
/// Returns `None` only when no explicit path was given, nothing exists in
/// the working directory and the platform has no config directory.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("axewatch").join("config.toml"))
}

/// Load and validate a config file; a missing file yields the defaults
pub fn load(path: &Path) -> Result<AxewatchConfig> {
    if !path.exists() {
        return Ok(AxewatchConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AxewatchConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Validate and write a config file, creating parent directories
pub fn save(path: &Path, config: &AxewatchConfig) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Commented example configuration
pub fn example_config() -> &'static str {
    r##"# Axewatch configuration

[engine]
# Per-component debounce window for scan triggers (0-60000 ms)
debounce_ms = 1000

# Longest wait for idle time before a scan runs anyway (1-600000 ms).
# Defaults to debounce_ms.
# idle_timeout_ms = 1000

# Pin every scan to a fixed context instead of the common ancestor
# [engine.context]
# selector = "#root"

# Forwarded to the audit engine before the first audit
# [engine.audit]
# rules = [{ id = "color-contrast", enabled = false }]

[console]
# auto | light | dark
appearance = "auto"
color = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_example_parses() {
        let config: AxewatchConfig = toml::from_str(example_config()).unwrap();
        config.validate().unwrap();
        assert_eq!(config, AxewatchConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.engine.debounce_ms, 1000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(LOCAL_FILE);

        let mut config = AxewatchConfig::default();
        config.engine.debounce_ms = 250;
        config.console.appearance = Appearance::Dark;
        save(&path, &config).unwrap();

        assert_eq!(load(&path).unwrap(), config);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOCAL_FILE);
        std::fs::write(&path, "[engine]\ndebounce_ms = 999999\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("debounce_ms out of range"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/tmp/custom.toml");
        assert_eq!(config_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
