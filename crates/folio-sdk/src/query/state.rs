//! Observable state of one cache entry

use crate::error::SdkError;

/// Lifecycle status of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched, or disabled before any fetch
    Idle,
    /// A fetch is in flight
    Loading,
    /// Last fetch (or direct write) succeeded
    Success,
    /// Last fetch failed; `data` may still hold an earlier value
    Error,
}

/// Snapshot returned by cache reads
#[derive(Debug, Clone)]
pub struct QueryState<V> {
    pub data: Option<V>,
    pub status: QueryStatus,
    pub error: Option<SdkError>,
    /// Value is present but will be re-fetched on the next enabled read
    pub is_stale: bool,
}

impl<V> QueryState<V> {
    pub fn idle() -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            is_stale: false,
        }
    }

    pub fn success(data: V) -> Self {
        Self {
            data: Some(data),
            status: QueryStatus::Success,
            error: None,
            is_stale: false,
        }
    }

    pub fn failed(data: Option<V>, error: SdkError) -> Self {
        Self {
            data,
            status: QueryStatus::Error,
            error: Some(error),
            is_stale: true,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Transform the held value, keeping status and error
    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> QueryState<U> {
        QueryState {
            data: self.data.map(f),
            status: self.status,
            error: self.error,
            is_stale: self.is_stale,
        }
    }
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self::idle()
    }
}
