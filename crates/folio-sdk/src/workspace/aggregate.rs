//! Projects joined with their documents
//!
//! The join itself is a pure function ([`join_projects`]). The aggregator
//! feeds it from two independently cached collections and keeps the last
//! joined result, recomputing only when either input value changes.

use crate::error::SdkError;
use crate::query::{QueryCache, QueryCacheConfig, QueryKey, QueryState};
use crate::remote::{Notifier, WorkspaceSource};
use folio_client::{Document, Project};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub const PROJECTS_QUERY: &str = "projects";
pub const DOCUMENTS_QUERY: &str = "documents";

const DOCUMENTS_ERROR: &str = "Error fetching project documents";
const PROJECTS_ERROR: &str = "Error loading projects";

/// A project with the documents that belong to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectWithDocuments {
    #[serde(flatten)]
    pub project: Project,
    pub documents: Vec<Document>,
}

impl ProjectWithDocuments {
    pub fn id(&self) -> i64 {
        self.project.id
    }
}

/// Attach to each project, in order, the documents whose `project_id`
/// matches it. Document order is preserved.
pub fn join_projects(projects: &[Project], documents: &[Document]) -> Vec<ProjectWithDocuments> {
    projects
        .iter()
        .map(|project| ProjectWithDocuments {
            project: project.clone(),
            documents: documents
                .iter()
                .filter(|d| d.project_id == project.id)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Snapshot handed to consumers
#[derive(Debug, Clone, Default)]
pub struct WorkspaceView {
    /// Raw project list, if resolved
    pub projects: Option<Arc<Vec<Project>>>,
    /// Last successfully joined aggregate
    pub project_documents: Arc<Vec<ProjectWithDocuments>>,
    /// Element whose id equals the current project id; absent on no match
    pub current_project_documents: Option<ProjectWithDocuments>,
    /// Either collection is loading
    pub is_loading: bool,
    /// Most recent fetch error, if either collection failed
    pub error: Option<SdkError>,
}

/// Inputs the current aggregate was computed from
#[derive(Default)]
struct Derived {
    projects: Option<Arc<Vec<Project>>>,
    documents: Option<Arc<Vec<Document>>>,
    items: Arc<Vec<ProjectWithDocuments>>,
}

impl Derived {
    fn is_computed_from(&self, projects: &Arc<Vec<Project>>, documents: &Arc<Vec<Document>>) -> bool {
        matches!(
            (&self.projects, &self.documents),
            (Some(p), Some(d)) if Arc::ptr_eq(p, projects) && Arc::ptr_eq(d, documents)
        )
    }
}

/// Derived per-project view over the projects and documents caches
pub struct ProjectDocumentAggregator {
    source: Arc<dyn WorkspaceSource>,
    notifier: Arc<dyn Notifier>,
    projects: QueryCache<Arc<Vec<Project>>>,
    documents: QueryCache<Arc<Vec<Document>>>,
    derived: RwLock<Derived>,
}

impl ProjectDocumentAggregator {
    pub fn new(source: Arc<dyn WorkspaceSource>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            source,
            notifier,
            projects: QueryCache::new(QueryCacheConfig::named(PROJECTS_QUERY)),
            documents: QueryCache::new(QueryCacheConfig::named(DOCUMENTS_QUERY)),
            derived: RwLock::new(Derived::default()),
        }
    }

    /// Fetch both collections as needed and return the view for
    /// `current_project_id`
    ///
    /// Fetch failures are reported through the notifier; the previous
    /// aggregate is kept.
    pub async fn refresh(&self, current_project_id: Option<i64>) -> WorkspaceView {
        let projects_key = QueryKey::new(PROJECTS_QUERY);
        let documents_key = QueryKey::new(DOCUMENTS_QUERY);
        let projects_source = Arc::clone(&self.source);
        let documents_source = Arc::clone(&self.source);

        let (projects, documents) = tokio::join!(
            self.projects.get(
                &projects_key,
                move || async move { projects_source.fetch_projects().await.map(Arc::new) },
                true,
            ),
            self.documents.get(
                &documents_key,
                move || async move { documents_source.fetch_documents().await.map(Arc::new) },
                true,
            ),
        );

        if documents.is_error() {
            self.notifier.notify_error(DOCUMENTS_ERROR);
        }
        if projects.is_error() {
            self.notifier.notify_error(PROJECTS_ERROR);
        }

        self.reconcile(projects, documents, current_project_id).await
    }

    /// View from cached state only; never fetches or notifies
    pub async fn view(&self, current_project_id: Option<i64>) -> WorkspaceView {
        let projects = self.projects.peek(&QueryKey::new(PROJECTS_QUERY)).await;
        let documents = self.documents.peek(&QueryKey::new(DOCUMENTS_QUERY)).await;
        self.reconcile(projects, documents, current_project_id).await
    }

    /// Force the next refresh to re-fetch projects
    pub async fn invalidate_projects(&self) {
        self.projects.invalidate(&QueryKey::new(PROJECTS_QUERY)).await;
    }

    /// Force the next refresh to re-fetch documents
    pub async fn invalidate_documents(&self) {
        self.documents.invalidate(&QueryKey::new(DOCUMENTS_QUERY)).await;
    }

    pub fn projects_cache(&self) -> &QueryCache<Arc<Vec<Project>>> {
        &self.projects
    }

    pub fn documents_cache(&self) -> &QueryCache<Arc<Vec<Document>>> {
        &self.documents
    }

    async fn reconcile(
        &self,
        projects: QueryState<Arc<Vec<Project>>>,
        documents: QueryState<Arc<Vec<Document>>>,
        current_project_id: Option<i64>,
    ) -> WorkspaceView {
        let is_loading = projects.is_loading() || documents.is_loading();
        let failed = projects.is_error() || documents.is_error();
        let error = documents.error.clone().or_else(|| projects.error.clone());

        let items = match (&projects.data, &documents.data) {
            (Some(p), Some(d)) if !failed => self.recompute(p, d).await,
            _ => Arc::clone(&self.derived.read().await.items),
        };

        let current_project_documents = current_project_id
            .and_then(|id| items.iter().find(|item| item.id() == id).cloned());

        WorkspaceView {
            projects: projects.data,
            project_documents: items,
            current_project_documents,
            is_loading,
            error,
        }
    }

    async fn recompute(
        &self,
        projects: &Arc<Vec<Project>>,
        documents: &Arc<Vec<Document>>,
    ) -> Arc<Vec<ProjectWithDocuments>> {
        let mut derived = self.derived.write().await;
        if !derived.is_computed_from(projects, documents) {
            derived.items = Arc::new(join_projects(projects, documents));
            derived.projects = Some(Arc::clone(projects));
            derived.documents = Some(Arc::clone(documents));
            debug!(
                projects = projects.len(),
                documents = documents.len(),
                "Recomputed project documents"
            );
        }
        Arc::clone(&derived.items)
    }
}
