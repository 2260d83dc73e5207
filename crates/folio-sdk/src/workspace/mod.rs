//! Workspace views derived from the projects and documents collections

mod aggregate;

pub use aggregate::{
    join_projects, ProjectDocumentAggregator, ProjectWithDocuments, WorkspaceView,
    DOCUMENTS_QUERY, PROJECTS_QUERY,
};
