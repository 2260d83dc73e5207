//! Process-wide wiring of the data layer
//!
//! Builds the HTTP clients from [`SdkConfig`] and owns one instance of each
//! store, with an explicit start and shutdown.

use crate::config::SdkConfig;
use crate::error::Result;
use crate::literature::LiteratureSearchCache;
use crate::remote::{LiteratureApi, Navigator, Notifier, RemoteResourceClient, WorkspaceSource};
use crate::session::SessionStore;
use crate::workspace::ProjectDocumentAggregator;
use folio_client::{ApiClient, AuthClient};
use std::sync::Arc;
use tracing::info;

/// The three stores of the data layer, sharing one configuration
pub struct FolioContext {
    config: SdkConfig,
    session: Arc<SessionStore>,
    workspace: ProjectDocumentAggregator,
    literature: LiteratureSearchCache,
}

impl FolioContext {
    /// Connect over HTTP and start bootstrapping the session
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(
        config: SdkConfig,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;

        let auth = Arc::new(AuthClient::new(config.client.clone())?);
        let api = Arc::new(ApiClient::new(config.client.clone())?);

        info!(
            base_url = %config.client.base_url,
            auth_url = %config.client.auth_url,
            "Folio data layer connecting"
        );

        Ok(Self::with_collaborators(config, auth, api.clone(), api, navigator, notifier))
    }

    /// Wire the stores over arbitrary collaborators and start bootstrapping
    pub fn with_collaborators(
        config: SdkConfig,
        remote: Arc<dyn RemoteResourceClient>,
        workspace_source: Arc<dyn WorkspaceSource>,
        literature_api: Arc<dyn LiteratureApi>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = SessionStore::start(remote, navigator, &config);
        let workspace = ProjectDocumentAggregator::new(workspace_source, notifier);
        let literature = LiteratureSearchCache::new(literature_api, &config);

        Self {
            config,
            session,
            workspace,
            literature,
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn workspace(&self) -> &ProjectDocumentAggregator {
        &self.workspace
    }

    pub fn literature(&self) -> &LiteratureSearchCache {
        &self.literature
    }

    /// Drop all local state and release materialized content
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
        self.workspace.projects_cache().clear().await;
        self.workspace.documents_cache().clear().await;
        self.literature.clear().await;
        info!("Folio data layer shut down");
    }
}
