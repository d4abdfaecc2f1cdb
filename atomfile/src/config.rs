//! Configuration for atomic writes.
//!
//! Scratch directory resolution order:
//! 1. `scratch_dir` set on the config (explicitly or from config.toml)
//! 2. AMP_SCRATCH_DIR environment variable
//! 3. Default: the platform temp directory
//!
//! config.toml lives in AMP_CONFIG_DIR if set (and non-empty), else the
//! platform config directory for `amp`, else `$HOME/.config/amp`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable overriding the scratch directory.
pub const SCRATCH_DIR_ENV: &str = "AMP_SCRATCH_DIR";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "AMP_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Atomic write configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory where temp files are staged before install.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Flush temp file contents to disk before install.
    #[serde(default = "default_fsync")]
    pub fsync: bool,

    /// Permission bits applied to every written file (masked).
    #[serde(default)]
    pub default_mode: Option<u32>,
}

fn default_fsync() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            fsync: default_fsync(),
            default_mode: None,
        }
    }
}

impl Config {
    /// Create a config staging temp files in `dir`.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Load config.toml from the resolved config directory, or defaults.
    pub fn load() -> Result<Self> {
        let dir = resolve_config_dir()?;
        Self::load_from(&dir)
    }

    /// Load config.toml from `dir`, or defaults if it does not exist.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to `dir`/config.toml, atomically.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        let options = crate::WriteOptions::new().scratch_dir(dir);
        crate::write_bytes_with(&dir.join(CONFIG_FILE_NAME), contents.as_bytes(), &options)
    }

    /// Directory temp files are staged in.
    pub fn resolved_scratch_dir(&self) -> PathBuf {
        pick_scratch_dir(self.scratch_dir.as_deref(), std::env::var_os(SCRATCH_DIR_ENV))
    }
}

fn pick_scratch_dir(explicit: Option<&Path>, env: Option<OsString>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    match env {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}

/// Resolve the directory holding config.toml.
fn resolve_config_dir() -> Result<PathBuf> {
    pick_config_dir(
        std::env::var_os(CONFIG_DIR_ENV),
        ProjectDirs::from("", "", "amp").map(|dirs| dirs.config_dir().to_path_buf()),
        std::env::var_os("HOME"),
    )
}

fn pick_config_dir(
    env: Option<OsString>,
    platform: Option<PathBuf>,
    home: Option<OsString>,
) -> Result<PathBuf> {
    // 1. Environment variable
    if let Some(dir) = env.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    // 2. Platform config directory
    if let Some(dir) = platform {
        return Ok(dir);
    }

    // 3. Fallback to ~/.config/amp
    let home = home.ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    Ok(PathBuf::from(home).join(".config/amp"))
}
