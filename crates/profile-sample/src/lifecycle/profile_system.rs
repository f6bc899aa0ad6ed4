use crate::clients::ProfileClient;
use async_resource::cache::PrefetchCache;
use async_resource::{ConfigError, FetchConfig, HttpFetcher, ResourceFetcher};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Runtime for the profile demo: one prefetch cache in front of the user API.
///
/// ```ignore
/// let system = ProfileSystem::new(FetchConfig::from_env()?)?;
/// let page = system.profile_client.profile_page("u1");
/// page.fetch().await;
/// drop(page);
/// system.shutdown().await?;
/// ```
pub struct ProfileSystem {
    pub profile_client: ProfileClient,
    config: FetchConfig,
    handle: JoinHandle<()>,
}

impl ProfileSystem {
    /// Starts the cache over an [`HttpFetcher`] for `config.base_url`.
    pub fn new(config: FetchConfig) -> Result<Self, ConfigError> {
        let upstream = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, upstream))
    }

    /// Starts the cache over any upstream fetcher.
    pub fn with_fetcher(config: FetchConfig, upstream: Arc<dyn ResourceFetcher>) -> Self {
        let (cache, cache_client) = PrefetchCache::new(&config);
        let handle = tokio::spawn(cache.run(upstream));
        info!(base_url = %config.base_url, "Profile system started");

        Self {
            profile_client: ProfileClient::new(cache_client),
            config,
            handle,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Drops the client and waits for the cache task to finish.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");
        drop(self.profile_client);

        if let Err(e) = self.handle.await {
            error!("Cache task failed: {:?}", e);
            return Err(format!("Cache task failed: {:?}", e));
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
