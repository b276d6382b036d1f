use std::path::{Path, PathBuf};

use dynform_client::ClientConfig;
use dynform_spec::{EvidenceConfig, EvidenceError, FieldTypeResolver, LexicalEvidence};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "dynform.toml";
pub const BASE_URL_ENV: &str = "DYNFORM_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid evidence lists: {0}")]
    Evidence(#[from] EvidenceError),
}

/// Client settings plus optional resolver evidence overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub client: ClientConfig,
    pub evidence: EvidenceConfig,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`, or `dynform.toml` in the working directory when it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };
        let Some(path) = candidate else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&raw, &path)
    }

    /// Applies `DYNFORM_BASE_URL`, then an explicit override, in increasing precedence.
    pub fn apply_overrides(&mut self, env_base_url: Option<String>, flag: Option<String>) {
        if let Some(url) = env_base_url.filter(|url| !url.trim().is_empty()) {
            self.client.base_url = url;
        }
        if let Some(url) = flag {
            self.client.base_url = url;
        }
    }

    pub fn resolver(&self) -> Result<FieldTypeResolver, ConfigError> {
        Ok(FieldTypeResolver::new(LexicalEvidence::from_config(
            &self.evidence,
        )?))
    }
}
