//! Adapter selection by integration type.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{Integration, IntegrationType};
use crate::remote::RemoteCalendarAdapter;

/// Builds an adapter for one integration.
pub trait AdapterFactory: Send + Sync {
    fn adapter_for(&self, integration: &Integration)
    -> WorkmateResult<Box<dyn RemoteCalendarAdapter>>;
}

type Constructor =
    Arc<dyn Fn(&Integration) -> WorkmateResult<Box<dyn RemoteCalendarAdapter>> + Send + Sync>;

/// Maps each [`IntegrationType`] to the constructor of its provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<IntegrationType, Constructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, kind: IntegrationType, constructor: F) -> Self
    where
        F: Fn(&Integration) -> WorkmateResult<Box<dyn RemoteCalendarAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.providers.insert(kind, Arc::new(constructor));
        self
    }

    pub fn supports(&self, kind: IntegrationType) -> bool {
        self.providers.contains_key(&kind)
    }
}

impl AdapterFactory for ProviderRegistry {
    fn adapter_for(
        &self,
        integration: &Integration,
    ) -> WorkmateResult<Box<dyn RemoteCalendarAdapter>> {
        let constructor = self
            .providers
            .get(&integration.integration_type)
            .ok_or_else(|| {
                WorkmateError::UnsupportedProvider(integration.integration_type.to_string())
            })?;
        constructor(integration)
    }
}
