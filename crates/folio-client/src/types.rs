//! Types for the Folio client API

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the web application API (`/api/...` routes)
    pub base_url: String,
    /// Base URL of the auth service (e.g. `https://xyz.supabase.co/auth/v1`)
    pub auth_url: String,
    /// Base URL of the REST row API (e.g. `https://xyz.supabase.co/rest/v1`)
    pub rest_url: String,
    /// CORS relay prefix; the target URL is appended verbatim
    pub relay_url: String,
    /// Public API key sent as `apikey` to the auth and REST services
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            auth_url: "http://localhost:54321/auth/v1".to_string(),
            rest_url: "http://localhost:54321/rest/v1".to_string(),
            relay_url: "https://isaac-cors-anywhere.fly.dev/".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FOLIO_BASE_URL") {
            config.base_url = val;
        }
        if let Ok(val) = std::env::var("FOLIO_AUTH_URL") {
            config.auth_url = val;
        }
        if let Ok(val) = std::env::var("FOLIO_REST_URL") {
            config.rest_url = val;
        }
        if let Ok(val) = std::env::var("FOLIO_RELAY_URL") {
            config.relay_url = val;
        }
        if let Ok(val) = std::env::var("FOLIO_API_KEY") {
            config.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("FOLIO_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.timeout_secs = secs;
            }
        }

        config
    }
}

// ==================== Auth ====================

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User id (primary key of the profile row)
    pub id: String,
    /// Email the user signed in with
    pub email: String,
    /// Bearer token for authenticated calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            access_token: None,
            refresh_token: None,
        }
    }
}

/// Email/password credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Raw sign-in outcome, handed back to the caller as-is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInResult {
    pub session: Option<Session>,
    pub error: Option<String>,
}

impl SignInResult {
    pub fn success(session: Session) -> Self {
        Self {
            session: Some(session),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            session: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.session.is_some()
    }
}

/// Raw sign-out outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOutResult {
    pub error: Option<String>,
}

/// OAuth identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth redirect outcome: the provider URL the user agent should visit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthResult {
    pub provider: Option<OAuthProvider>,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Token grant response from the auth service
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// User object embedded in auth responses
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenResponse {
    /// Session for a password grant; the user's email is required
    pub fn into_session(self) -> Result<Session> {
        let email = self
            .user
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| ClientError::InvalidResponse(format!("token for user {} has no email", self.user.id)))?;

        Ok(Session {
            id: self.user.id,
            email,
            access_token: Some(self.access_token),
            refresh_token: self.refresh_token,
        })
    }
}

// ==================== Profile ====================

/// Free-form instructions the user attaches to generations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomInstructions {
    pub instructions: String,
    #[serde(rename = "responseInstructions")]
    pub response_instructions: String,
}

/// Extended user record stored in the `profile` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: Option<String>,
    pub is_subscribed: bool,
    pub stripe_customer: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub has_seen_tour: bool,
    pub has_seen_latest_update: bool,
    pub has_seen_community_banner: bool,
    /// Billing interval of the plan ("month", "year")
    pub interval: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Free generations used today
    pub daily_free_token: i64,
    pub custom_instructions: Option<CustomInstructions>,
    pub editor_language: Option<String>,
}

// ==================== Workspace ====================

/// A project as returned by `/api/projects`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    /// Remaining columns (title, timestamps, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Project {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            metadata: Map::new(),
        }
    }
}

/// A text document as returned by `/api/documents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(rename = "projectId")]
    pub project_id: i64,
    /// Remaining columns (title, content, ...)
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, project_id: i64) -> Self {
        Self {
            id: id.into(),
            project_id,
            content: Map::new(),
        }
    }
}

// ==================== Literature ====================

/// Bibliographic record in the shape the search backend returns
///
/// Only the identity fields are typed; everything else is carried through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureReference {
    #[serde(rename = "paperId", default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LiteratureReference {
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            paper_id: Some(paper_id.into()),
            title: Some(title.into()),
            fields: Map::new(),
        }
    }

    /// DOI from `externalIds.DOI`, or a top-level `doi` field
    pub fn doi(&self) -> Option<&str> {
        self.fields
            .get("externalIds")
            .and_then(|ids| ids.get("DOI"))
            .or_else(|| self.fields.get("doi"))
            .and_then(Value::as_str)
    }
}

/// Body of `POST /api/litsearch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LitSearchRequest {
    pub search_query: String,
    pub year_range: String,
}

impl LitSearchRequest {
    /// Build a request; spaces in the keyword are sent as `+`
    pub fn new(keyword: &str, start_year: i32, end_year: i32) -> Self {
        Self {
            search_query: keyword.replace(' ', "+"),
            year_range: format!("{}-{}", start_year, end_year),
        }
    }
}

/// Response from `POST /api/litsearch`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiteratureResponse {
    #[serde(default)]
    pub literature: Vec<LiteratureReference>,
}

/// Body of `POST /api/paper-details`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDetailsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// Response from `POST /api/paper-details`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDetailsResponse {
    #[serde(rename = "paperDetails")]
    pub paper_details: LiteratureReference,
}
