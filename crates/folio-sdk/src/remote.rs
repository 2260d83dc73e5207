//! Collaborator contracts consumed by the data layer
//!
//! The SDK never talks HTTP directly; it goes through these traits. The
//! `folio-client` types implement them for production, tests supply mocks.

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use bytes::Bytes;
use folio_client::{
    ApiClient, AuthClient, Credentials, Document, LitSearchRequest, LiteratureReference,
    LiteratureResponse, OAuthProvider, OAuthResult, Profile, Project, Session, SignInResult,
    SignOutResult,
};
use tracing::warn;

/// Identity provider plus the profile table
#[async_trait]
pub trait RemoteResourceClient: Send + Sync {
    /// Session persisted by the provider, if any
    async fn get_current_session(&self) -> Result<Option<Session>>;

    /// Password sign-in; failures are reported in the result, not as `Err`
    async fn sign_in(&self, credentials: &Credentials) -> SignInResult;

    async fn sign_out(&self) -> SignOutResult;

    /// Start an OAuth redirect flow returning to `redirect_to`
    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_to: &str) -> OAuthResult;

    async fn fetch_profile(&self, session_id: &str) -> Result<Profile>;
}

/// Source of the two workspace collections
#[async_trait]
pub trait WorkspaceSource: Send + Sync {
    async fn fetch_projects(&self) -> Result<Vec<Project>>;
    async fn fetch_documents(&self) -> Result<Vec<Document>>;
}

/// Literature endpoints and the content relay
#[async_trait]
pub trait LiteratureApi: Send + Sync {
    async fn search(&self, request: &LitSearchRequest) -> Result<LiteratureResponse>;
    async fn paper_details(&self, doi: Option<&str>) -> Result<LiteratureReference>;
    async fn fetch_relay(&self, target_url: &str) -> Result<Bytes>;
}

/// Router collaborator
pub trait Navigator: Send + Sync {
    /// Leave the current view for the landing page
    fn navigate_home(&self);
}

/// User-facing notification collaborator (toasts)
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Navigator for hosts without routing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate_home(&self) {}
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        warn!(message = message, "User-facing error");
    }
}

// =============================================================================
// HTTP implementations
// =============================================================================

#[async_trait]
impl RemoteResourceClient for AuthClient {
    async fn get_current_session(&self) -> Result<Option<Session>> {
        Ok(self.current_session().await)
    }

    async fn sign_in(&self, credentials: &Credentials) -> SignInResult {
        match self.sign_in_with_password(credentials).await {
            Ok(session) => SignInResult::success(session),
            Err(e) => SignInResult::failure(e.to_string()),
        }
    }

    async fn sign_out(&self) -> SignOutResult {
        SignOutResult {
            error: AuthClient::sign_out(self).await.err().map(|e| e.to_string()),
        }
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_to: &str) -> OAuthResult {
        OAuthResult {
            provider: Some(provider),
            url: Some(self.authorize_url(provider, redirect_to)),
            error: None,
        }
    }

    async fn fetch_profile(&self, session_id: &str) -> Result<Profile> {
        AuthClient::fetch_profile(self, session_id)
            .await
            .map_err(SdkError::from)
    }
}

#[async_trait]
impl WorkspaceSource for ApiClient {
    async fn fetch_projects(&self) -> Result<Vec<Project>> {
        Ok(self.list_projects().await?)
    }

    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        Ok(self.list_documents().await?)
    }
}

#[async_trait]
impl LiteratureApi for ApiClient {
    async fn search(&self, request: &LitSearchRequest) -> Result<LiteratureResponse> {
        Ok(self.search_literature(request).await?)
    }

    async fn paper_details(&self, doi: Option<&str>) -> Result<LiteratureReference> {
        Ok(ApiClient::paper_details(self, doi).await?)
    }

    async fn fetch_relay(&self, target_url: &str) -> Result<Bytes> {
        Ok(self.fetch_via_relay(target_url).await?)
    }
}
