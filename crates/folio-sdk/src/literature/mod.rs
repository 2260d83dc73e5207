//! Literature search, paper details and relayed content
//!
//! Three key families over the query cache:
//! - `literature`: keyword + year range search
//! - `literature-detail`: one paper by DOI
//! - `literature-pdf`: binary content fetched through the relay and
//!   materialized as a [`ContentHandle`]

mod cache;
mod content;
mod query;

pub use cache::{LiteratureSearchCache, DETAIL_QUERY, PDF_QUERY, SEARCH_QUERY};
pub use content::ContentHandle;
pub use query::{current_year, LiteratureQuery};
