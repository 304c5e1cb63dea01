use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::AppConfig,
    pins::bootstrap::{BootstrapError, ensure_storage_ready},
    platform::{PlatformClient, ScopedClient, Session, SessionRefresher},
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    cookie_name: Arc<str>,
    platform: PlatformClient,
    refresher: Arc<dyn SessionRefresher>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let platform =
            PlatformClient::new(&config).context("failed to initialize platform client")?;
        let cookie_name = Arc::from(config.session_cookie_name());

        Ok(Self {
            config: Arc::new(config),
            cookie_name,
            refresher: Arc::new(platform.clone()),
            platform,
        })
    }

    #[cfg(test)]
    pub fn with_refresher(mut self, refresher: Arc<dyn SessionRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn platform(&self) -> &PlatformClient {
        &self.platform
    }

    pub fn refresher(&self) -> &dyn SessionRefresher {
        self.refresher.as_ref()
    }

    /// Platform client acting as the session's user, or anonymously.
    pub fn client_for(&self, session: Option<&Session>) -> ScopedClient {
        self.platform
            .scoped(session.map(|session| session.access_token.as_str()))
    }

    /// Make sure the image bucket and table are usable with `client`'s rights.
    pub async fn ensure_storage(&self, client: &ScopedClient) -> Result<(), BootstrapError> {
        ensure_storage_ready(
            client,
            client,
            self.bucket(),
            self.config.publicity_rpc.as_deref(),
        )
        .await
    }
}
