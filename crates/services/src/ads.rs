use std::sync::Arc;

use domains::{AdsConfig, AdsConfigUpdate, ContentStore, Result};

/// Reads and merges the singleton ad configuration.
#[derive(Clone)]
pub struct AdsConfigService {
    store: Arc<dyn ContentStore>,
}

impl AdsConfigService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// The stored document, or the built-in defaults when none was saved.
    pub async fn current(&self) -> Result<AdsConfig> {
        Ok(self.store.load_ads_config().await?.unwrap_or_default())
    }

    pub async fn update(&self, update: AdsConfigUpdate) -> Result<AdsConfig> {
        let mut config = self.current().await?;
        config.merge(update);
        self.store.save_ads_config(config.clone()).await?;
        tracing::info!(enabled = config.enabled, "ads config updated");
        Ok(config)
    }
}
