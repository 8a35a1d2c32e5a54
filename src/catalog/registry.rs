//! Shared catalog handle with atomic snapshot swaps.
//!
//! Readers take an `Arc<Catalog>` and keep it for the whole validation or
//! compilation, so they see either the old or the new catalog, never a mix.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::{Catalog, PieceDescriptor};
use crate::error::EngineError;

/// Where live catalog data comes from (normally the engine's piece listing).
#[async_trait]
pub trait PieceSource: Send + Sync {
    async fn fetch_pieces(&self) -> Result<Vec<PieceDescriptor>, EngineError>;
}

#[derive(Debug)]
pub struct CatalogRegistry {
    current: RwLock<Arc<Catalog>>,
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        CatalogRegistry::new(Catalog::fallback())
    }
}

impl CatalogRegistry {
    pub fn new(initial: Catalog) -> Self {
        CatalogRegistry {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    pub fn install(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        *self.current.write() = Arc::clone(&catalog);
        catalog
    }

    /// Re-sync from `source`. Any failure, or an empty listing, installs the
    /// built-in fallback instead of leaving the registry empty.
    pub async fn refresh(&self, source: &dyn PieceSource) -> Arc<Catalog> {
        let catalog = match source.fetch_pieces().await {
            Ok(pieces) if !pieces.is_empty() => {
                let catalog = Catalog::live(pieces);
                info!(pieces = catalog.snapshot().len(), "catalog synced");
                catalog
            }
            Ok(_) => {
                warn!("engine returned no pieces, using fallback catalog");
                Catalog::fallback()
            }
            Err(err) => {
                warn!(error = %err, "catalog sync failed, using fallback catalog");
                Catalog::fallback()
            }
        };
        self.install(catalog)
    }

    /// Refresh now and then every `interval` until the returned task is aborted.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn_periodic_refresh(
        self: &Arc<Self>,
        source: Arc<dyn PieceSource>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.refresh(source.as_ref()).await;
            }
        })
    }
}
