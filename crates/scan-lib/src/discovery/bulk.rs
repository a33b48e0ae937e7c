//! Bulk discovery against a graph-style resource index
//!
//! One query covers all subscriptions in the scope but answers are
//! capped at a fixed page size, so discovery pages through the index
//! until a short page arrives.

use super::{map_raw, DiscoveryProvider, RawResource, ScanScope};
use crate::error::DiscoveryError;
use crate::models::{DiscoveryBackend, ResourceDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Maximum records a single graph query returns
pub const BULK_PAGE_SIZE: usize = 1000;

/// Seam to the graph index. Implementations own the provider-specific
/// query text; this module only drives pagination.
#[async_trait]
pub trait GraphQuery: Send + Sync {
    /// Fetch one page of records, skipping `skip` and returning at
    /// most `top`
    async fn query(
        &self,
        scope: &ScanScope,
        skip: usize,
        top: usize,
    ) -> Result<Vec<RawResource>, DiscoveryError>;

    /// Whether the graph index is reachable at all
    async fn available(&self) -> bool;
}

/// Discovery provider backed by the bulk graph index
pub struct BulkDiscovery {
    client: Arc<dyn GraphQuery>,
    page_size: usize,
}

impl BulkDiscovery {
    pub fn new(client: Arc<dyn GraphQuery>) -> Self {
        Self {
            client,
            page_size: BULK_PAGE_SIZE,
        }
    }

    #[cfg(test)]
    fn with_page_size(client: Arc<dyn GraphQuery>, page_size: usize) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl DiscoveryProvider for BulkDiscovery {
    async fn discover(&self, scope: &ScanScope) -> Result<Vec<ResourceDescriptor>, DiscoveryError> {
        let mut resources = Vec::new();
        let mut skip = 0;

        loop {
            let page = self.client.query(scope, skip, self.page_size).await?;
            let page_len = page.len();
            skip += page_len;

            resources.extend(
                page.into_iter()
                    .map(map_raw)
                    .filter(|r| scope.matches(r.kind)),
            );

            if page_len < self.page_size {
                break;
            }
        }

        debug!(count = resources.len(), pages = skip.div_ceil(self.page_size.max(1)), "Bulk discovery complete");
        Ok(resources)
    }

    async fn probe(&self) -> bool {
        self.client.available().await
    }

    fn backend(&self) -> DiscoveryBackend {
        DiscoveryBackend::Bulk
    }
}
