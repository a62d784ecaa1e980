//! Configuration management.
//!
//! An optional `ww.toml` (current directory, then `~/.config/ww/ww.toml`)
//! supplies dashboard defaults. Command-line flags always win; a missing file
//! is not an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level structure corresponding to `ww.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Dashboard defaults.
    pub dash: Option<DashConfig>,
}

/// Defaults for the `dash` subcommand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashConfig {
    /// Project roots used to label services by path prefix.
    pub roots: Option<Vec<PathBuf>>,
    /// Column set: "minimal" or "full".
    pub columns: Option<String>,
    /// Terminal backend: "auto", "native", or "tmux".
    pub terminal_backend: Option<String>,
    /// Status refresh interval in milliseconds.
    pub refresh_ms: Option<u64>,
    /// History lines requested when following a unit's logs.
    pub last: Option<u32>,
}

/// Loads and parses a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Loads the first config file found in the lookup order, or the default.
pub fn load_default() -> Config {
    for path in candidate_paths() {
        if path.is_file() {
            match load_config(&path) {
                Ok(config) => return config,
                Err(err) => {
                    tracing::warn!("ignoring {}: {err:#}", path.display());
                    return Config::default();
                }
            }
        }
    }
    Config::default()
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("ww.toml")];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(
            PathBuf::from(home)
                .join(".config")
                .join("ww")
                .join("ww.toml"),
        );
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dash_section() {
        let raw = r#"
[dash]
roots = ["/home/me/code", "/srv"]
columns = "full"
terminal_backend = "tmux"
refresh_ms = 1500
last = 300
"#;
        let config: Config = toml::from_str(raw).unwrap();
        let dash = config.dash.unwrap();
        assert_eq!(dash.roots.as_ref().unwrap().len(), 2);
        assert_eq!(dash.columns.as_deref(), Some("full"));
        assert_eq!(dash.terminal_backend.as_deref(), Some("tmux"));
        assert_eq!(dash.refresh_ms, Some(1500));
        assert_eq!(dash.last, Some(300));
    }

    #[test]
    fn empty_file_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.dash.is_none());
    }
}
