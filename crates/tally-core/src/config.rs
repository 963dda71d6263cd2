//! Repository configuration (`tally.yaml`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File name of the repository configuration.
pub const CONFIG_FILE: &str = "tally.yaml";

/// Error raised by configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A filesystem operation failed.
    #[error("{action} {path}: {source}")]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The YAML did not parse or serialize.
    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level repository configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Business identity.
    pub business: BusinessConfig,
    /// Fiscal year boundaries.
    pub fiscal: FiscalConfig,
    /// Bank feeds mapped to chart accounts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bank_accounts: Vec<BankAccountConfig>,
    /// Agent auto-confirmation thresholds.
    pub thresholds: ThresholdsConfig,
    /// Versioned-store integration.
    pub git: GitConfig,
}

/// Business identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Legal or trading name.
    pub name: String,
    /// Entity type, e.g. `llc_single_member`.
    pub entity_type: String,
}

/// Fiscal year boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalConfig {
    /// First day of the fiscal year, `MM-DD`.
    pub year_start: String,
}

/// One bank feed mapped to a chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccountConfig {
    /// Display name of the feed.
    pub name: String,
    /// Feed kind, e.g. `checking`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Last four digits of the account number.
    pub last_four: String,
    /// Chart account the feed posts against.
    pub account_id: i64,
}

/// Agent auto-confirmation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Confidence at or above which an agent may auto-confirm.
    pub auto_confirm: f64,
    /// Confidence below which an entry is flagged for review.
    pub review_flag: f64,
}

/// Versioned-store integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Whether agents commit after each logical step.
    pub auto_commit: bool,
    /// Author name for agent commits.
    pub author_name: String,
    /// Author email for agent commits.
    pub author_email: String,
}

impl Config {
    /// Read a config file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            action: "reading config",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Write the config to disk as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_yaml::to_string(self)?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            action: "writing config",
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults for a freshly initialized repository.
    #[must_use]
    pub fn default_for(business_name: &str, entity_type: &str) -> Self {
        Self {
            business: BusinessConfig {
                name: business_name.to_string(),
                entity_type: entity_type.to_string(),
            },
            fiscal: FiscalConfig {
                year_start: "01-01".to_string(),
            },
            bank_accounts: Vec::new(),
            thresholds: ThresholdsConfig {
                auto_confirm: 0.95,
                review_flag: 0.70,
            },
            git: GitConfig {
                auto_commit: true,
                author_name: "Tally Agent".to_string(),
                author_email: "agent@tally.dev".to_string(),
            },
        }
    }

    /// Look up a dotted key, returning scalar values only. Unknown keys
    /// yield `None`.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match key {
            "business.name" => Some(Value::from(self.business.name.as_str())),
            "business.entity_type" => Some(Value::from(self.business.entity_type.as_str())),
            "fiscal.year_start" => Some(Value::from(self.fiscal.year_start.as_str())),
            "thresholds.auto_confirm" => Some(Value::from(self.thresholds.auto_confirm)),
            "thresholds.review_flag" => Some(Value::from(self.thresholds.review_flag)),
            "git.auto_commit" => Some(Value::from(self.git.auto_commit)),
            "git.author_name" => Some(Value::from(self.git.author_name.as_str())),
            "git.author_email" => Some(Value::from(self.git.author_email.as_str())),
            _ => None,
        }
    }
}
