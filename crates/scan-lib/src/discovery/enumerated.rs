//! Enumerated discovery, one round-trip per subscription
//!
//! Strictly slower than the bulk index but has no extra dependency,
//! which makes it the universal fallback.

use super::{map_raw, DiscoveryProvider, RawResource, ScanScope};
use crate::error::DiscoveryError;
use crate::models::{DiscoveryBackend, ResourceDescriptor, ResourceKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Seam to the per-subscription listing backend
#[async_trait]
pub trait ScopeLister: Send + Sync {
    /// List resources in one subscription, filtered to `kinds`
    /// (empty means all)
    async fn list(
        &self,
        subscription_id: &str,
        kinds: &[ResourceKind],
    ) -> Result<Vec<RawResource>, DiscoveryError>;
}

/// Discovery provider that walks subscriptions sequentially
pub struct EnumeratedDiscovery {
    client: Arc<dyn ScopeLister>,
}

impl EnumeratedDiscovery {
    pub fn new(client: Arc<dyn ScopeLister>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiscoveryProvider for EnumeratedDiscovery {
    async fn discover(&self, scope: &ScanScope) -> Result<Vec<ResourceDescriptor>, DiscoveryError> {
        let mut resources = Vec::new();

        for subscription in &scope.subscriptions {
            let records = self.client.list(subscription, &scope.kinds).await?;
            debug!(
                subscription_id = %subscription,
                count = records.len(),
                "Enumerated one subscription"
            );
            resources.extend(
                records
                    .into_iter()
                    .map(map_raw)
                    .filter(|r| scope.matches(r.kind)),
            );
        }

        Ok(resources)
    }

    fn backend(&self) -> DiscoveryBackend {
        DiscoveryBackend::Enumerated
    }
}
