//! Folio SDK - reactive client data layer
//!
//! Keeps the authenticated session, derived workspace views and remote
//! literature results consistent and cached without redundant requests.
//!
//! # Architecture
//!
//! ```text
//!   RemoteResourceClient ─┐
//!   WorkspaceSource ──────┼──► QueryCache (keyed, coalescing, versioned)
//!   LiteratureApi ────────┘        │
//!                                  ├── SessionStore              (profile by session id)
//!                                  ├── ProjectDocumentAggregator (projects ⋈ documents)
//!                                  └── LiteratureSearchCache     (search, detail, content)
//! ```
//!
//! Every store reads through a [`QueryCache`]: concurrent reads of one key
//! share a single fetch, disabled reads never fetch, and invalidated keys
//! re-fetch on the next read.
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_sdk::{FolioContext, SdkConfig, NoopNavigator, TracingNotifier, LiteratureQuery};
//! use std::sync::Arc;
//!
//! let context = FolioContext::connect(
//!     SdkConfig::load()?,
//!     Arc::new(NoopNavigator),
//!     Arc::new(TracingNotifier),
//! )?;
//!
//! if let Some(user) = context.session().user().await {
//!     println!("signed in as {}", user.username);
//! }
//!
//! let results = context
//!     .literature()
//!     .search(Some(&LiteratureQuery::new("synthetic biology")))
//!     .await;
//! ```

// Keyed async cache
pub mod query;

// Session and profile
pub mod session;

// Projects joined with documents
pub mod workspace;

// Literature search, details, relayed content
pub mod literature;

// Collaborator traits
pub mod remote;

// Store wiring
pub mod context;

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::SdkConfig;
pub use context::FolioContext;
pub use error::{Result, SdkError};
pub use literature::{ContentHandle, LiteratureQuery, LiteratureSearchCache};
pub use query::{KeyPart, QueryCache, QueryCacheConfig, QueryKey, QueryState, QueryStatus};
pub use remote::{
    LiteratureApi, Navigator, NoopNavigator, Notifier, RemoteResourceClient, TracingNotifier,
    WorkspaceSource,
};
pub use session::{AuthState, ProfilePatch, SessionStore, UserView};
pub use workspace::{join_projects, ProjectDocumentAggregator, ProjectWithDocuments, WorkspaceView};

// Re-export from the transport crate
pub use folio_client::{
    Credentials, Document, LiteratureReference, OAuthProvider, OAuthResult, Profile, Project,
    Session, SignInResult, SignOutResult,
};
