//! Literature cache
//!
//! Specializes [`QueryCache`] for the three literature key families. Keys
//! are derived from parameters after defaults are filled, so a search with
//! no years and one with the default years share an entry.

use super::content::ContentHandle;
use super::query::{current_year, LiteratureQuery};
use crate::config::SdkConfig;
use crate::error::SdkError;
use crate::query::{QueryCache, QueryCacheConfig, QueryKey, QueryState};
use crate::remote::LiteratureApi;
use folio_client::{LitSearchRequest, LiteratureReference};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub const SEARCH_QUERY: &str = "literature";
pub const DETAIL_QUERY: &str = "literature-detail";
pub const PDF_QUERY: &str = "literature-pdf";

/// Search results, paper details and relayed content
pub struct LiteratureSearchCache {
    api: Arc<dyn LiteratureApi>,
    searches: QueryCache<Arc<Vec<LiteratureReference>>>,
    details: QueryCache<LiteratureReference>,
    pdfs: QueryCache<Arc<ContentHandle>>,
    earliest_year: i32,
    new_search_sentinel: String,
    content_dir: Option<PathBuf>,
}

impl LiteratureSearchCache {
    pub fn new(api: Arc<dyn LiteratureApi>, config: &SdkConfig) -> Self {
        Self {
            api,
            searches: QueryCache::new(
                QueryCacheConfig::named(SEARCH_QUERY).with_stale_time(config.literature_stale_time),
            ),
            details: QueryCache::new(QueryCacheConfig::named(DETAIL_QUERY)),
            pdfs: QueryCache::new(QueryCacheConfig::named(PDF_QUERY)),
            earliest_year: config.earliest_literature_year,
            new_search_sentinel: config.new_search_sentinel.clone(),
            content_dir: config.content_dir.clone(),
        }
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Cache key of a search, with default years filled
    pub fn search_key(&self, query: &LiteratureQuery) -> QueryKey {
        let (start, end) = query.resolve_years(self.earliest_year, current_year());
        QueryKey::new(SEARCH_QUERY)
            .with(query.keyword.as_str())
            .with(start)
            .with(end)
    }

    /// Request body a search would send
    pub fn search_request(&self, query: &LiteratureQuery) -> LitSearchRequest {
        let (start, end) = query.resolve_years(self.earliest_year, current_year());
        LitSearchRequest::new(&query.keyword, start, end)
    }

    /// A search runs only with a query whose keyword is not the empty-tab
    /// sentinel
    pub fn is_search_enabled(&self, query: Option<&LiteratureQuery>) -> bool {
        query.is_some_and(|q| q.keyword != self.new_search_sentinel)
    }

    pub async fn search(&self, query: Option<&LiteratureQuery>) -> QueryState<Arc<Vec<LiteratureReference>>> {
        let Some(query) = query else {
            return QueryState::idle();
        };

        let enabled = self.is_search_enabled(Some(query));
        let key = self.search_key(query);
        let request = self.search_request(query);
        let api = Arc::clone(&self.api);

        self.searches
            .get(
                &key,
                move || async move {
                    let response = api.search(&request).await?;
                    debug!(results = response.literature.len(), "Literature search resolved");
                    Ok::<_, SdkError>(Arc::new(response.literature))
                },
                enabled,
            )
            .await
    }

    /// Mark every cached search stale
    pub async fn invalidate_searches(&self) -> usize {
        self.searches.invalidate(&QueryKey::new(SEARCH_QUERY)).await
    }

    // ========================================================================
    // Detail
    // ========================================================================

    pub fn detail_key(id: Option<&str>) -> QueryKey {
        QueryKey::new(DETAIL_QUERY).with(id)
    }

    /// Full details of one paper by DOI; disabled without an id
    pub async fn detail(&self, id: Option<&str>) -> QueryState<LiteratureReference> {
        let id = id.filter(|id| !id.is_empty());
        let key = Self::detail_key(id);
        let doi = id.map(str::to_string);
        let api = Arc::clone(&self.api);

        self.details
            .get(
                &key,
                move || async move { api.paper_details(doi.as_deref()).await },
                id.is_some(),
            )
            .await
    }

    // ========================================================================
    // Content
    // ========================================================================

    pub fn pdf_key(target_url: Option<&str>) -> QueryKey {
        QueryKey::new(PDF_QUERY).with(target_url)
    }

    /// Fetch `target_url` through the relay and materialize it locally;
    /// disabled without a URL
    pub async fn pdf(&self, target_url: Option<&str>) -> QueryState<Arc<ContentHandle>> {
        let target_url = target_url.filter(|url| !url.is_empty());
        let key = Self::pdf_key(target_url);
        let target = target_url.map(str::to_string).unwrap_or_default();
        let api = Arc::clone(&self.api);
        let dir = self.content_dir.clone();

        self.pdfs
            .get(
                &key,
                move || async move {
                    let bytes = api.fetch_relay(&target).await?;
                    let handle = tokio::task::spawn_blocking(move || {
                        ContentHandle::materialize(&target, &bytes, dir.as_deref())
                    })
                    .await
                    .map_err(|e| SdkError::Io(format!("materialization task failed: {}", e)))??;
                    Ok::<_, SdkError>(Arc::new(handle))
                },
                target_url.is_some(),
            )
            .await
    }

    /// Evict one URL's content, releasing its handle
    pub async fn release_pdf(&self, target_url: &str) -> bool {
        self.pdfs.evict(&Self::pdf_key(Some(target_url))).await > 0
    }

    /// Evict all materialized content
    pub async fn invalidate_pdfs(&self) -> usize {
        self.pdfs.evict(&QueryKey::new(PDF_QUERY)).await
    }

    pub fn searches_cache(&self) -> &QueryCache<Arc<Vec<LiteratureReference>>> {
        &self.searches
    }

    pub fn details_cache(&self) -> &QueryCache<LiteratureReference> {
        &self.details
    }

    pub fn pdfs_cache(&self) -> &QueryCache<Arc<ContentHandle>> {
        &self.pdfs
    }

    /// Drop every cached entry and release all content handles
    pub async fn clear(&self) {
        self.searches.clear().await;
        self.details.clear().await;
        self.pdfs.clear().await;
    }
}
