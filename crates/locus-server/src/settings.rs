//! Server configuration with layered sources.
//!
//! Settings are loaded in priority order:
//! 1. **Compiled defaults** — [`ServerSettings::default()`]
//! 2. **JSON file** — optional, passed on the command line
//! 3. **Environment variables** — `LOCUS_*` overrides (highest priority)
//!
//! All field names are camelCase in JSON; missing fields get their default
//! value during deserialization.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file was not valid JSON for [`ServerSettings`].
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for the Locus server.
///
/// # JSON Format
///
/// ```json
/// {
///   "host": "0.0.0.0",
///   "port": 3000,
///   "assetsDir": "assets",
///   "wsSendBuffer": 64
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Interface to bind.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Directory holding the map page and client assets.
    pub assets_dir: PathBuf,
    /// Per-session outbound frame buffer; frames beyond this are dropped.
    pub ws_send_buffer: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            assets_dir: "assets".into(),
            ws_send_buffer: 64,
        }
    }
}

impl ServerSettings {
    /// Load defaults, then the optional file layer, then env overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(std::env::vars());
        Ok(settings)
    }

    /// Parse a settings file; missing fields fall back to defaults.
    fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `LOCUS_*` overrides from an environment snapshot.
    ///
    /// Unparseable values are warned about and skipped rather than
    /// rejected, so a bad override degrades to the lower layer.
    fn apply_overrides(&mut self, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            match key.as_str() {
                "LOCUS_HOST" if !value.is_empty() => self.host = value,
                "LOCUS_PORT" => match value.parse() {
                    Ok(port) => self.port = port,
                    Err(_) => warn!(value = %value, "ignoring unparseable LOCUS_PORT"),
                },
                "LOCUS_ASSETS_DIR" if !value.is_empty() => self.assets_dir = value.into(),
                _ => {}
            }
        }
    }

    /// The `host:port` string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
