//! Configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/fileput/fileput.toml`
//! - Windows: `%APPDATA%/fileput/fileput.toml`
//!
//! Command-line flags override every value loaded here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub put: PutDefaults,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Defaults for `fileput put`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutDefaults {
    /// Chunk size in kilobytes.
    #[serde(default = "default_write_size_kb")]
    pub write_size_kb: u64,

    /// Remote permissions as an octal string. `"0"` keeps the local mode.
    #[serde(default = "default_permissions")]
    pub permissions: String,

    #[serde(default = "default_hash_method")]
    pub hash_method: String,

    /// Seconds before every session is cancelled (0 = no limit).
    #[serde(default)]
    pub timeout_secs: u64,
}

/// Settings for `fileput serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Fixed token. A fresh one is generated per run when absent.
    #[serde(default)]
    pub token: Option<String>,
}

/// One upload target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name; the address is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    pub token: String,
}

fn default_write_size_kb() -> u64 {
    fileput_protocol::constants::DEFAULT_WRITE_SIZE_KB
}

fn default_permissions() -> String {
    "0777".into()
}

fn default_hash_method() -> String {
    "MD5".into()
}

fn default_listen() -> String {
    "0.0.0.0:7400".into()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PutDefaults {
    fn default() -> Self {
        Self {
            write_size_kb: default_write_size_kb(),
            permissions: default_permissions(),
            hash_method: default_hash_method(),
            timeout_secs: 0,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            root: default_root(),
            token: None,
        }
    }
}

impl TargetConfig {
    pub fn id(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform path.
    ///
    /// An explicit path must exist. A missing platform file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("fileput").join("fileput.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("fileput")
            .join("fileput.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.put.write_size_kb, 64);
        assert_eq!(config.put.permissions, "0777");
        assert_eq!(config.put.hash_method, "MD5");
        assert_eq!(config.server.listen, "0.0.0.0:7400");
        assert!(config.targets.is_empty());
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
            [put]
            hash_method = "sha256"

            [[targets]]
            address = "10.0.0.1:7400"
            token = "00112233445566778899aabbccddeeff"

            [[targets]]
            name = "core-2"
            address = "10.0.0.2:7400"
            token = "ffeeddccbbaa99887766554433221100"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.put.hash_method, "sha256");
        assert_eq!(config.put.write_size_kb, 64);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].id(), "10.0.0.1:7400");
        assert_eq!(config.targets[1].id(), "core-2");
    }

    #[test]
    fn load_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fileput.toml");
        std::fs::write(&path, "[server]\nlisten = \"127.0.0.1:9000\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.root, PathBuf::from("."));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&tmp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn config_path_not_empty() {
        assert!(config_path().to_string_lossy().contains("fileput"));
    }
}
