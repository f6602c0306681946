//! Global workmate configuration.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOOKAHEAD_DAYS, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_RESULTS,
    DEFAULT_REQUEST_TIMEOUT_SECS, GOOGLE_API_BASE, GOOGLE_TOKEN_URI,
};
use crate::error::{WorkmateError, WorkmateResult};
use crate::pipeline::QaThresholds;

static DEFAULT_DATA_DIR: &str = "~/.local/share/workmate";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub lookback_days: i64,
    pub lookahead_days: i64,
    /// Page size for listing remote events; listings are never cut at it
    pub max_results: usize,
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            max_results: DEFAULT_MAX_RESULTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// OAuth client used to rotate Google access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleAppConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

fn default_api_base() -> String {
    GOOGLE_API_BASE.to_string()
}

/// Global configuration at ~/.config/workmate/config.toml, overridable
/// through `WORKMATE__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkmateConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub qa: QaThresholds,

    #[serde(default)]
    pub google: Option<GoogleAppConfig>,
}

impl Default for WorkmateConfig {
    fn default() -> Self {
        WorkmateConfig {
            data_dir: default_data_dir(),
            sync: SyncSettings::default(),
            qa: QaThresholds::default(),
            google: None,
        }
    }
}

impl WorkmateConfig {
    pub fn config_path() -> WorkmateResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WorkmateError::Config("Could not determine config directory".into()))?
            .join("workmate");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, creating a commented template on
    /// first run.
    pub fn load() -> WorkmateResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> WorkmateResult<Self> {
        let config: WorkmateConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("WORKMATE").separator("__"))
            .build()
            .map_err(|e| WorkmateError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| WorkmateError::Config(e.to_string()))?;

        config.qa.validate()?;
        Ok(config)
    }

    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();
        PathBuf::from(full_path_str)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_path().join("workmate.json")
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> WorkmateResult<()> {
        let contents = format!(
            "\
# workmate configuration

# Where tasks, events and integrations are stored:
# data_dir = \"{DEFAULT_DATA_DIR}\"

# [sync]
# lookback_days = {DEFAULT_LOOKBACK_DAYS}
# lookahead_days = {DEFAULT_LOOKAHEAD_DAYS}
# max_results = {DEFAULT_MAX_RESULTS}

# [qa]
# low = 0.40
# medium = 0.65
# high = 0.85

# [google]
# client_id = \"...apps.googleusercontent.com\"
# client_secret = \"...\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WorkmateError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| WorkmateError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
