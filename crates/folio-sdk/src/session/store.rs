//! Session store
//!
//! Owns the one live session and the profile cache keyed by its id.
//!
//! ```text
//!   start ──► Bootstrapping ──(session found)──► Authenticated(id)
//!                  │                                  ▲      │
//!                  │ none / error          login ok   │      │ logout
//!                  ▼                                  │      ▼
//!             Unauthenticated ────────────────────────┘   SigningOut
//!                  ▲                                         │
//!                  └───────── clear session + evict ─────────┘
//! ```
//!
//! Clearing the session evicts its profile under the same lock, so no read
//! can observe a session-less profile or a profile from a previous login.

use super::user::{ProfilePatch, UserView};
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::query::{QueryCache, QueryCacheConfig, QueryKey};
use crate::remote::{Navigator, RemoteResourceClient};
use folio_client::{Credentials, OAuthProvider, OAuthResult, Profile, Session, SignInResult, SignOutResult};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

/// Discriminator of the profile key family
pub const PROFILE_QUERY: &str = "profile";

/// Cache key of one user's profile
pub fn profile_key(session_id: &str) -> QueryKey {
    QueryKey::new(PROFILE_QUERY).with(session_id)
}

/// Authentication state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Bootstrapping,
    Authenticated(String),
    SigningOut,
}

impl AuthState {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

struct SessionInner {
    state: AuthState,
    session: Option<Session>,
}

/// Session and profile state for one process
pub struct SessionStore {
    remote: Arc<dyn RemoteResourceClient>,
    navigator: Arc<dyn Navigator>,
    profiles: QueryCache<Profile>,
    redirect_target: String,
    inner: RwLock<SessionInner>,
    state_tx: watch::Sender<AuthState>,
}

impl SessionStore {
    /// Create a store in `Bootstrapping`; call [`bootstrap`](Self::bootstrap)
    /// to resolve it
    pub fn new(
        remote: Arc<dyn RemoteResourceClient>,
        navigator: Arc<dyn Navigator>,
        config: &SdkConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Bootstrapping);

        Self {
            remote,
            navigator,
            profiles: QueryCache::new(
                QueryCacheConfig::named(PROFILE_QUERY).with_stale_time(config.profile_stale_time),
            ),
            redirect_target: config.oauth_redirect_target(),
            inner: RwLock::new(SessionInner {
                state: AuthState::Bootstrapping,
                session: None,
            }),
            state_tx,
        }
    }

    /// Create a store and bootstrap it in the background
    pub fn start(
        remote: Arc<dyn RemoteResourceClient>,
        navigator: Arc<dyn Navigator>,
        config: &SdkConfig,
    ) -> Arc<Self> {
        let store = Arc::new(Self::new(remote, navigator, config));
        let bootstrapping = Arc::clone(&store);
        tokio::spawn(async move {
            bootstrapping.bootstrap().await;
        });
        store
    }

    /// Ask the provider for a persisted session and leave `Bootstrapping`
    ///
    /// A retrieval failure is logged and treated as no session. If a login
    /// already moved the store out of `Bootstrapping`, the result is ignored.
    pub async fn bootstrap(&self) -> AuthState {
        let result = self.remote.get_current_session().await;

        let mut inner = self.inner.write().await;
        if inner.state != AuthState::Bootstrapping {
            debug!(state = ?inner.state, "Bootstrap superseded, ignoring result");
            return inner.state.clone();
        }

        match result {
            Ok(Some(session)) => {
                info!(user_id = %session.id, "Session restored");
                self.authenticate(&mut inner, session);
            }
            Ok(None) => {
                debug!("No persisted session");
                self.transition(&mut inner, AuthState::Unauthenticated);
            }
            Err(e) => {
                error!(error = %e, "Failed to retrieve session");
                self.transition(&mut inner, AuthState::Unauthenticated);
            }
        }

        inner.state.clone()
    }

    /// Sign in with email and password
    ///
    /// The provider's result is returned unchanged for the caller to inspect.
    pub async fn login(&self, credentials: &Credentials) -> SignInResult {
        let result = self.remote.sign_in(credentials).await;

        match (&result.session, &result.error) {
            (Some(session), _) => {
                info!(user_id = %session.id, "Signed in");
                let mut inner = self.inner.write().await;
                self.authenticate(&mut inner, session.clone());
            }
            (None, Some(e)) => warn!(error = %e, "Sign-in failed"),
            (None, None) => warn!("Sign-in returned neither session nor error"),
        }

        result
    }

    /// Start the Google OAuth redirect
    ///
    /// Local state is untouched; the redirect round-trip re-enters bootstrap.
    pub async fn login_with_google(&self) -> OAuthResult {
        let result = self
            .remote
            .sign_in_with_oauth(OAuthProvider::Google, &self.redirect_target)
            .await;
        if let Some(e) = &result.error {
            warn!(error = %e, "OAuth sign-in failed");
        }
        result
    }

    /// Sign out, then clear the session, evict its profile and go home
    ///
    /// Local state is cleared even when the provider reports an error. A
    /// login that completes while signing out wins: its session is kept,
    /// only the signed-out session's profile is evicted, and no navigation
    /// happens.
    pub async fn logout(&self) -> SignOutResult {
        let signing_out = {
            let mut inner = self.inner.write().await;
            self.transition(&mut inner, AuthState::SigningOut);
            inner.session.as_ref().map(|s| s.id.clone())
        };

        let result = self.remote.sign_out().await;
        if let Some(e) = &result.error {
            error!(error = %e, "Sign-out failed, clearing local session anyway");
        }

        let cleared = {
            let mut inner = self.inner.write().await;
            if inner.state == AuthState::SigningOut {
                self.clear_session(&mut inner).await;
                true
            } else {
                if let Some(id) = &signing_out {
                    self.profiles.evict(&profile_key(id)).await;
                }
                info!(state = ?inner.state, "Signed in again during sign-out, keeping the new session");
                false
            }
        };

        if cleared {
            info!("Signed out");
            self.navigator.navigate_home();
        }
        result
    }

    /// Drop local session state without contacting the provider or
    /// navigating
    pub async fn shutdown(&self) {
        {
            let mut inner = self.inner.write().await;
            self.clear_session(&mut inner).await;
        }
        self.profiles.clear().await;
        debug!("Session store shut down");
    }

    /// Current auth state
    pub async fn state(&self) -> AuthState {
        self.inner.read().await.state.clone()
    }

    /// Watch auth state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Current session, only while authenticated
    pub async fn session(&self) -> Option<Session> {
        let inner = self.inner.read().await;
        match inner.state {
            AuthState::Authenticated(_) => inner.session.clone(),
            _ => None,
        }
    }

    /// Merged user view, fetching the profile if needed
    ///
    /// `None` means "not ready": no session, or the profile has not resolved.
    pub async fn user(&self) -> Option<UserView> {
        let session = self.session().await?;
        let key = profile_key(&session.id);
        let remote = Arc::clone(&self.remote);
        let id = session.id.clone();

        let state = self
            .profiles
            .get(&key, move || async move { remote.fetch_profile(&id).await }, true)
            .await;

        if let Some(e) = &state.error {
            warn!(user_id = %session.id, error = %e, "Profile fetch failed");
        }

        self.merge_if_current(&session, state.data?).await
    }

    /// Merged user view from the cache only
    pub async fn current_user(&self) -> Option<UserView> {
        let session = self.session().await?;
        let profile = self.profiles.peek(&profile_key(&session.id)).await.data?;
        self.merge_if_current(&session, profile).await
    }

    /// True while the profile of the current session is being fetched
    pub async fn user_is_loading(&self) -> bool {
        match self.session().await {
            Some(session) => self.profiles.peek(&profile_key(&session.id)).await.is_loading(),
            None => false,
        }
    }

    /// Optimistically patch the cached profile; no network call
    ///
    /// If the first profile fetch is still pending, waits for it and patches
    /// the fetched profile. Fails with `NotFound` when no profile has been
    /// loaded for the session.
    pub async fn set_user(&self, patch: ProfilePatch) -> Result<()> {
        let session = self
            .session()
            .await
            .ok_or_else(|| SdkError::Auth("set_user called without a session".into()))?;
        let key = profile_key(&session.id);

        let pending = self.profiles.peek(&key).await;
        if pending.data.is_none() && pending.is_loading() {
            debug!(user_id = %session.id, "Waiting for profile before patching");
            self.user().await;
        }

        let patched = self
            .profiles
            .update_existing(&key, |profile| patch.apply_to(profile))
            .await;
        if !patched {
            return Err(SdkError::NotFound(format!("no profile loaded for {}", session.id)));
        }

        debug!(user_id = %session.id, "Profile patched locally");
        Ok(())
    }

    /// Profile cache, for hosts that need direct access
    pub fn profiles(&self) -> &QueryCache<Profile> {
        &self.profiles
    }

    // === Private Implementation ===

    fn authenticate(&self, inner: &mut SessionInner, session: Session) {
        let id = session.id.clone();
        inner.session = Some(session);
        self.transition(inner, AuthState::Authenticated(id));
    }

    fn transition(&self, inner: &mut SessionInner, state: AuthState) {
        debug!(from = ?inner.state, to = ?state, "Auth state transition");
        inner.state = state.clone();
        self.state_tx.send_replace(state);
    }

    /// Clear session and evict its profile as one step; the caller holds
    /// the session lock.
    async fn clear_session(&self, inner: &mut SessionInner) {
        if let Some(session) = inner.session.take() {
            self.profiles.evict(&profile_key(&session.id)).await;
        }
        self.transition(inner, AuthState::Unauthenticated);
    }

    /// Guard against a profile that resolved after the session changed
    async fn merge_if_current(&self, session: &Session, profile: Profile) -> Option<UserView> {
        let inner = self.inner.read().await;
        if inner.state.session_id() != Some(session.id.as_str()) {
            debug!(user_id = %session.id, "Discarding profile for a session that is no longer current");
            return None;
        }
        Some(UserView::merge(session, profile))
    }
}
