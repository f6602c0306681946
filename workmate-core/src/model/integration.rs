//! Configured connections to external calendars.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{WorkmateError, WorkmateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationType {
    Caldav,
    GoogleCalendar,
    Outlook,
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrationType::Caldav => "caldav",
            IntegrationType::GoogleCalendar => "google_calendar",
            IntegrationType::Outlook => "outlook",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncDirection {
    LocalToRemote,
    RemoteToLocal,
    #[default]
    Bidirectional,
}

impl SyncDirection {
    pub fn pushes(self) -> bool {
        matches!(self, SyncDirection::LocalToRemote | SyncDirection::Bidirectional)
    }

    pub fn pulls(self) -> bool {
        matches!(self, SyncDirection::RemoteToLocal | SyncDirection::Bidirectional)
    }
}

/// Provider-specific settings (server URL, calendar id, timezone).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig(pub Map<String, Value>);

impl IntegrationConfig {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn require_str(&self, key: &str) -> WorkmateResult<&str> {
        self.get_str(key)
            .ok_or_else(|| WorkmateError::Config(format!("Integration config is missing '{key}'")))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }
}

/// Opaque provider secrets. `Debug` never prints values.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials(pub Map<String, Value>);

impl Credentials {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn require_str(&self, key: &str) -> WorkmateResult<&str> {
        self.get_str(key).ok_or_else(|| {
            WorkmateError::Authentication(format!("Credentials are missing '{key}'"))
        })
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&String> = self.0.keys().collect();
        f.debug_struct("Credentials")
            .field("keys", &keys)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub integration_type: IntegrationType,
    pub enabled: bool,
    #[serde(default)]
    pub config: IntegrationConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub sync_direction: SyncDirection,
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u32,
    /// End of the last pass that finished without errors
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Set when the provider rejected the credentials beyond refresh
    #[serde(default)]
    pub needs_reauth: bool,
    pub created_at: DateTime<Utc>,
}

fn default_sync_interval() -> u32 {
    15
}

impl Integration {
    pub fn new(user_id: Uuid, name: &str, integration_type: IntegrationType) -> Self {
        Integration {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            integration_type,
            enabled: true,
            config: IntegrationConfig::default(),
            credentials: Credentials::default(),
            sync_direction: SyncDirection::default(),
            auto_sync: false,
            sync_interval_minutes: default_sync_interval(),
            last_synced_at: None,
            needs_reauth: false,
            created_at: Utc::now(),
        }
    }

    /// Remote calendar this integration points at.
    pub fn calendar_id(&self) -> &str {
        self.config.get_str("calendar_id").unwrap_or("primary")
    }

    /// Copy safe to hand out to callers: credentials removed.
    pub fn redacted(&self) -> Integration {
        Integration {
            credentials: Credentials::default(),
            ..self.clone()
        }
    }

    /// Whether the scheduled trigger should start a pass at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled || !self.auto_sync || self.needs_reauth {
            return false;
        }
        match self.last_synced_at {
            Some(last) => {
                now - last >= chrono::Duration::minutes(self.sync_interval_minutes.into())
            }
            None => true,
        }
    }
}
