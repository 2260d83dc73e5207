//! HTTP client for the auth service and the profile table
//!
//! Speaks the GoTrue-style token API (`/token?grant_type=password`,
//! `/logout`, `/authorize`) and the PostgREST row API for `profile`.

use crate::api::{build_http_client, handle_response};
use crate::error::{ClientError, Result};
use crate::types::*;
use reqwest::{header, Client};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Auth client holding the current session in memory
pub struct AuthClient {
    config: ClientConfig,
    client: Client,
    session: RwLock<Option<Session>>,
}

impl AuthClient {
    /// Create a new auth client with no session
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = build_http_client(&config, header::HeaderMap::new())?;
        Ok(Self {
            config,
            client,
            session: RwLock::new(None),
        })
    }

    /// Create an auth client that resumes a previously stored session
    pub fn with_session(config: ClientConfig, session: Session) -> Result<Self> {
        let client = build_http_client(&config, header::HeaderMap::new())?;
        Ok(Self {
            config,
            client,
            session: RwLock::new(Some(session)),
        })
    }

    /// Current session, if any
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Exchange email/password for a session
    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        let url = format!("{}/token?grant_type=password", self.config.auth_url);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(credentials)
            .send()
            .await?;

        let token: TokenResponse = handle_response(response).await?;
        let session = token.into_session()?;
        info!(user_id = %session.id, "Signed in with password");

        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Revoke the current session
    ///
    /// The local session is dropped even when the server call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let session = self.session.write().await.take();
        let Some(token) = session.and_then(|s| s.access_token) else {
            debug!("Sign-out without an access token, nothing to revoke");
            return Ok(());
        };

        let url = format!("{}/logout", self.config.auth_url);
        let response = self.client.post(&url).bearer_auth(&token).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status, "Sign-out rejected by auth service");
            return Err(ClientError::Server {
                status,
                message: body,
            });
        }

        Ok(())
    }

    /// URL that starts the provider's OAuth flow and returns to `redirect_to`
    pub fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        format!(
            "{}/authorize?provider={}&redirect_to={}",
            self.config.auth_url,
            provider.as_str(),
            urlencoding::encode(redirect_to)
        )
    }

    /// Fetch the profile row for a user id
    ///
    /// Requires a session with an access token; the row is protected by
    /// row-level security.
    pub async fn fetch_profile(&self, user_id: &str) -> Result<Profile> {
        let url = format!(
            "{}/profile?id=eq.{}&select=*",
            self.config.rest_url,
            urlencoding::encode(user_id)
        );

        let token = self
            .current_session()
            .await
            .and_then(|s| s.access_token)
            .ok_or(ClientError::Unauthenticated)?;

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.pgrst.object+json")
            .bearer_auth(token)
            .send()
            .await?;
        handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client = AuthClient::new(ClientConfig {
            auth_url: "https://auth.example.com/auth/v1".into(),
            ..Default::default()
        })
        .unwrap();

        let url = client.authorize_url(OAuthProvider::Google, "https://app.example.com/api/auth/callback");
        assert_eq!(
            url,
            "https://auth.example.com/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fapp.example.com%2Fapi%2Fauth%2Fcallback"
        );
    }

    #[tokio::test]
    async fn test_with_session_restores_session() {
        let session = Session::new("u1", "ada@example.com");
        let client = AuthClient::with_session(ClientConfig::default(), session.clone()).unwrap();
        assert_eq!(client.current_session().await, Some(session));
    }

    #[tokio::test]
    async fn test_sign_out_without_token_is_local() {
        let client =
            AuthClient::with_session(ClientConfig::default(), Session::new("u1", "a@b.c")).unwrap();
        client.sign_out().await.unwrap();
        assert!(client.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_profile_requires_access_token() {
        let client =
            AuthClient::with_session(ClientConfig::default(), Session::new("u1", "a@b.c")).unwrap();
        let result = client.fetch_profile("u1").await;
        assert!(matches!(result, Err(ClientError::Unauthenticated)));
    }
}
