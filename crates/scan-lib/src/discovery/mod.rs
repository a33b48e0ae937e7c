//! Resource discovery backends and selection policy
//!
//! Two mechanisms enumerate the fleet: a bulk graph-style index that
//! answers for many subscriptions in one round-trip, and a slower
//! enumerated walk issuing one call per subscription. The selector
//! probes bulk availability once per process and falls back to the
//! enumerated backend transparently when bulk is unavailable.

mod bulk;
mod enumerated;

pub use bulk::{BulkDiscovery, GraphQuery, BULK_PAGE_SIZE};
pub use enumerated::{EnumeratedDiscovery, ScopeLister};

use crate::error::{DiscoveryError, ScanError};
use crate::models::{BackendPreference, DiscoveryBackend, ResourceDescriptor, ResourceKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub use async_trait::async_trait;

/// What to discover: which subscriptions, filtered to which kinds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanScope {
    pub subscriptions: Vec<String>,
    /// Empty means all kinds
    pub kinds: Vec<ResourceKind>,
}

impl ScanScope {
    pub fn matches(&self, kind: ResourceKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

/// A record as the discovery backend reports it, before mapping into
/// our descriptor model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResource {
    pub id: String,
    pub name: String,
    /// Provider-specific kind label
    pub kind: String,
    pub location: String,
    pub subscription_id: String,
    pub resource_group: String,
}

/// Map a raw backend record into a descriptor
pub fn map_raw(raw: RawResource) -> ResourceDescriptor {
    ResourceDescriptor {
        kind: ResourceKind::from_label(&raw.kind),
        id: raw.id,
        name: raw.name,
        location: raw.location,
        subscription_id: raw.subscription_id,
        resource_group: raw.resource_group,
    }
}

/// Trait for discovery backend implementations
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Enumerate all resources matching the scope, in backend order
    async fn discover(&self, scope: &ScanScope) -> Result<Vec<ResourceDescriptor>, DiscoveryError>;

    /// Cheap capability check. Backends with external dependencies
    /// report whether those are present; the default is always-on.
    async fn probe(&self) -> bool {
        true
    }

    fn backend(&self) -> DiscoveryBackend;
}

/// Chooses between bulk and enumerated discovery per the caller's
/// preference, caching the bulk availability probe for the lifetime
/// of the selector
pub struct BackendSelector {
    bulk: Arc<dyn DiscoveryProvider>,
    enumerated: Arc<dyn DiscoveryProvider>,
    preference: BackendPreference,
    bulk_available: OnceCell<bool>,
}

impl BackendSelector {
    pub fn new(
        bulk: Arc<dyn DiscoveryProvider>,
        enumerated: Arc<dyn DiscoveryProvider>,
        preference: BackendPreference,
    ) -> Self {
        Self {
            bulk,
            enumerated,
            preference,
            bulk_available: OnceCell::new(),
        }
    }

    /// Run discovery, applying the fallback policy.
    ///
    /// Returns the resource set and which backend actually produced it.
    /// `Unavailable` from bulk triggers one transparent retry with the
    /// enumerated backend; `Failed` from either backend is fatal.
    pub async fn discover(
        &self,
        scope: &ScanScope,
    ) -> Result<(Vec<ResourceDescriptor>, DiscoveryBackend), ScanError> {
        match self.preference {
            BackendPreference::BulkOnly => {
                let resources = self.bulk.discover(scope).await?;
                Ok((resources, DiscoveryBackend::Bulk))
            }
            BackendPreference::EnumeratedOnly => {
                let resources = self.enumerated.discover(scope).await?;
                Ok((resources, DiscoveryBackend::Enumerated))
            }
            BackendPreference::Auto => self.discover_auto(scope).await,
        }
    }

    async fn discover_auto(
        &self,
        scope: &ScanScope,
    ) -> Result<(Vec<ResourceDescriptor>, DiscoveryBackend), ScanError> {
        let available = *self
            .bulk_available
            .get_or_init(|| async {
                let up = self.bulk.probe().await;
                debug!(available = up, "Probed bulk discovery backend");
                up
            })
            .await;

        if available {
            match self.bulk.discover(scope).await {
                Ok(resources) => return Ok((resources, DiscoveryBackend::Bulk)),
                Err(DiscoveryError::Unavailable(reason)) => {
                    warn!(reason = %reason, "Bulk discovery unavailable, falling back to enumerated");
                }
                Err(fatal) => return Err(fatal.into()),
            }
        } else {
            info!("Bulk discovery backend not available, using enumerated");
        }

        let resources = self.enumerated.discover(scope).await?;
        Ok((resources, DiscoveryBackend::Enumerated))
    }
}
