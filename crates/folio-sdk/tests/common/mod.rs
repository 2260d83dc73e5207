//! Shared test doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use folio_client::{
    Credentials, Document, LitSearchRequest, LiteratureReference, LiteratureResponse,
    OAuthProvider, OAuthResult, Profile, Project, Session, SignInResult, SignOutResult,
};
use folio_sdk::{
    LiteratureApi, Navigator, Notifier, RemoteResourceClient, Result, SdkConfig, SdkError,
    WorkspaceSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn test_config() -> SdkConfig {
    SdkConfig {
        app_origin: "https://folio.test".to_string(),
        ..SdkConfig::default()
    }
}

// =============================================================================
// Remote resource client
// =============================================================================

#[derive(Default)]
pub struct MockRemote {
    pub session: Mutex<Option<Session>>,
    pub session_error: Mutex<Option<SdkError>>,
    pub profile: Mutex<Profile>,
    pub sign_in_error: Mutex<Option<String>>,
    pub sign_out_error: Mutex<Option<String>>,
    pub session_delay: Mutex<Option<Duration>>,
    pub sign_out_delay: Mutex<Option<Duration>>,
    pub profile_fetches: AtomicUsize,
    pub sign_outs: AtomicUsize,
    pub oauth_redirects: Mutex<Vec<(OAuthProvider, String)>>,
}

impl MockRemote {
    pub fn with_session(session: Session) -> Self {
        let remote = Self::default();
        *remote.session.lock().unwrap() = Some(session);
        remote
    }

    pub fn set_profile(&self, profile: Profile) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteResourceClient for MockRemote {
    async fn get_current_session(&self) -> Result<Option<Session>> {
        let delay = *self.session_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.session_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> SignInResult {
        if let Some(e) = self.sign_in_error.lock().unwrap().clone() {
            return SignInResult::failure(e);
        }
        let session = Session::new("signed-in", credentials.email.clone());
        *self.session.lock().unwrap() = Some(session.clone());
        SignInResult::success(session)
    }

    async fn sign_out(&self) -> SignOutResult {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        let delay = *self.sign_out_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        *self.session.lock().unwrap() = None;
        SignOutResult {
            error: self.sign_out_error.lock().unwrap().clone(),
        }
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_to: &str) -> OAuthResult {
        self.oauth_redirects
            .lock()
            .unwrap()
            .push((provider, redirect_to.to_string()));
        OAuthResult {
            provider: Some(provider),
            url: Some(format!("https://auth.test/authorize?provider={}", provider)),
            error: None,
        }
    }

    async fn fetch_profile(&self, _session_id: &str) -> Result<Profile> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(self.profile.lock().unwrap().clone())
    }
}

// =============================================================================
// Workspace source
// =============================================================================

#[derive(Default)]
pub struct MockWorkspace {
    pub projects: Mutex<Vec<Project>>,
    pub documents: Mutex<Vec<Document>>,
    pub projects_error: Mutex<Option<SdkError>>,
    pub documents_error: Mutex<Option<SdkError>>,
    pub project_fetches: AtomicUsize,
    pub document_fetches: AtomicUsize,
}

impl MockWorkspace {
    pub fn new(projects: Vec<Project>, documents: Vec<Document>) -> Self {
        Self {
            projects: Mutex::new(projects),
            documents: Mutex::new(documents),
            ..Default::default()
        }
    }
}

#[async_trait]
impl WorkspaceSource for MockWorkspace {
    async fn fetch_projects(&self) -> Result<Vec<Project>> {
        self.project_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(e) = self.projects_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        self.document_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(e) = self.documents_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.documents.lock().unwrap().clone())
    }
}

// =============================================================================
// Literature API
// =============================================================================

#[derive(Default)]
pub struct MockLiterature {
    pub searches: Mutex<Vec<LitSearchRequest>>,
    pub detail_requests: Mutex<Vec<Option<String>>>,
    pub relay_requests: Mutex<Vec<String>>,
    pub pdf_bytes: Mutex<Vec<u8>>,
}

impl MockLiterature {
    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }
}

#[async_trait]
impl LiteratureApi for MockLiterature {
    async fn search(&self, request: &LitSearchRequest) -> Result<LiteratureResponse> {
        self.searches.lock().unwrap().push(request.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(LiteratureResponse {
            literature: vec![LiteratureReference::new("p1", request.search_query.clone())],
        })
    }

    async fn paper_details(&self, doi: Option<&str>) -> Result<LiteratureReference> {
        self.detail_requests
            .lock()
            .unwrap()
            .push(doi.map(str::to_string));
        Ok(LiteratureReference::new("p1", "Details"))
    }

    async fn fetch_relay(&self, target_url: &str) -> Result<Bytes> {
        self.relay_requests.lock().unwrap().push(target_url.to_string());
        Ok(Bytes::from(self.pdf_bytes.lock().unwrap().clone()))
    }
}

// =============================================================================
// Navigator and notifier
// =============================================================================

#[derive(Default)]
pub struct RecordingNavigator {
    pub home_visits: AtomicUsize,
}

impl RecordingNavigator {
    pub fn visits(&self) -> usize {
        self.home_visits.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_home(&self) {
        self.home_visits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
