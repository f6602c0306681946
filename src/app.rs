use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::debug;
use uuid::Uuid;
use workmate_core::WorkmateConfig;
use workmate_core::calendar::CalendarService;
use workmate_core::mapper::TaskEventMapper;
use workmate_core::reminder::ReminderScheduler;
use workmate_core::remote::ProviderRegistry;
use workmate_core::store::{MemoryStore, snapshot};
use workmate_core::sync::CalendarSyncEngine;

/// Loaded configuration plus the store snapshot the command works on.
pub struct App {
    pub config: WorkmateConfig,
    pub store: Arc<MemoryStore>,
    registry: Arc<ProviderRegistry>,
    snapshot_path: PathBuf,
}

impl App {
    pub fn load() -> Result<Self> {
        let config = WorkmateConfig::load()?;
        let snapshot_path = config.snapshot_path();
        let store = Arc::new(snapshot::load(&snapshot_path)?);

        let timeout = config.sync.request_timeout_secs;
        let registry = ProviderRegistry::new();
        let registry = workmate_provider_google::register(registry, config.google.clone(), timeout);
        let registry = workmate_provider_caldav::register(registry, timeout);

        debug!(snapshot = %snapshot_path.display(), "Loaded workmate data");

        Ok(App {
            config,
            store,
            registry: Arc::new(registry),
            snapshot_path,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn engine(&self) -> CalendarSyncEngine {
        CalendarSyncEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.registry.clone(),
            self.config.sync.clone(),
        )
    }

    pub fn calendar(&self) -> CalendarService {
        CalendarService::new(self.store.clone(), self.store.clone(), self.registry.clone())
    }

    pub fn mapper(&self) -> TaskEventMapper {
        TaskEventMapper::new(self.store.clone(), self.store.clone(), self.store.clone())
    }

    pub fn reminders(&self) -> ReminderScheduler {
        ReminderScheduler::new(self.store.clone())
    }

    pub async fn save(&self) -> Result<()> {
        snapshot::save(&self.store, &self.snapshot_path).await?;
        Ok(())
    }

    async fn known_users(&self) -> BTreeSet<Uuid> {
        let data = self.store.data().await;
        data.tasks
            .values()
            .map(|t| t.user_id)
            .chain(data.integrations.values().map(|i| i.user_id))
            .chain(data.events.values().map(|e| e.user_id))
            .chain(data.documents.values().map(|d| d.user_id))
            .collect()
    }

    /// The user to act as: `--user` if given, otherwise the only user in
    /// the data.
    pub async fn user(&self, explicit: Option<Uuid>) -> Result<Uuid> {
        if let Some(user) = explicit {
            return Ok(user);
        }

        let users = self.known_users().await;
        let mut iter = users.iter();
        match (iter.next(), iter.next()) {
            (Some(user), None) => Ok(*user),
            (None, _) => bail!("No data yet. Add an integration or a task first"),
            (Some(_), Some(_)) => bail!(
                "The data holds {} users. Pick one with --user <uuid>",
                users.len()
            ),
        }
    }

    /// Like [`App::user`], but starts a fresh user on empty data.
    pub async fn user_or_new(&self, explicit: Option<Uuid>) -> Result<Uuid> {
        match self.user(explicit).await {
            Ok(user) => Ok(user),
            Err(_) if self.known_users().await.is_empty() => Ok(Uuid::new_v4()),
            Err(e) => Err(e),
        }
    }
}
