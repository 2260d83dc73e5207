//! Rust client for the Folio backend
//!
//! Two clients share one [`ClientConfig`]:
//!
//! - [`AuthClient`]: password sign-in, sign-out, OAuth authorize URLs and the
//!   profile row lookup. Holds the current session in memory.
//! - [`ApiClient`]: project/document listings, literature search, paper
//!   details and binary fetches through the CORS relay.
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_client::{ApiClient, ClientConfig, LitSearchRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig {
//!     base_url: "http://localhost:3000".into(),
//!     ..Default::default()
//! })?;
//!
//! let request = LitSearchRequest::new("synthetic biology", 1900, 2024);
//! let response = client.search_literature(&request).await?;
//! println!("{} references", response.literature.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod error;
pub mod types;

// Re-export main types
pub use api::ApiClient;
pub use auth::AuthClient;
pub use error::{ClientError, Result};
pub use types::*;
