use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EcfsError, EcfsResult};

/// Paddings a policy's padding selector can express.
pub const VALID_PADDINGS: [u8; 4] = [4, 8, 16, 32];

/// Top-level configuration (loaded from ecfs.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EcfsConfig {
    pub logging: LoggingConfig,
    pub names: NamesConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    /// Maximum on-disk entry name length of the host filesystem (default: 255)
    pub max_namelen: usize,
    /// Accept presented no-key names when the directory key is absent
    pub allow_keyless_lookup: bool,
}

/// Defaults for newly built encryption policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// File contents mode (default: aes-256-xts)
    pub contents_mode: String,
    /// Filenames mode (default: aes-256-cts)
    pub filenames_mode: String,
    /// Filename padding in bytes: 4, 8, 16 or 32 (default: 32)
    pub padding: u8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            max_namelen: 255,
            allow_keyless_lookup: true,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            contents_mode: "aes-256-xts".into(),
            filenames_mode: "aes-256-cts".into(),
            padding: 32,
        }
    }
}

impl EcfsConfig {
    /// Load and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> EcfsResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: EcfsConfig = toml::from_str(&content)
            .map_err(|e| EcfsError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EcfsResult<()> {
        // The shortest valid ciphertext name is one 16-byte block.
        if !(16..=255).contains(&self.names.max_namelen) {
            return Err(EcfsError::Config(format!(
                "names.max_namelen must be within 16..=255, got {}",
                self.names.max_namelen
            )));
        }
        if !VALID_PADDINGS.contains(&self.policy.padding) {
            return Err(EcfsError::Config(format!(
                "policy.padding must be one of {:?}, got {}",
                VALID_PADDINGS, self.policy.padding
            )));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(EcfsError::Config(format!(
                "logging.format must be \"text\" or \"json\", got {other:?}"
            ))),
        }
    }
}
