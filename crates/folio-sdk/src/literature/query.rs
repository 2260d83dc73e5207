//! Search parameters

use chrono::Datelike;

/// Parameters of one literature search
///
/// `open_new_tab` is presentation state and takes no part in cache identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiteratureQuery {
    pub keyword: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub open_new_tab: bool,
}

impl LiteratureQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn with_years(mut self, start_year: Option<i32>, end_year: Option<i32>) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }

    pub fn in_new_tab(mut self) -> Self {
        self.open_new_tab = true;
        self
    }

    /// Year range with defaults filled in
    pub fn resolve_years(&self, earliest_year: i32, current_year: i32) -> (i32, i32) {
        (
            self.start_year.unwrap_or(earliest_year),
            self.end_year.unwrap_or(current_year),
        )
    }
}

/// Current calendar year in local time
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_years_defaults() {
        let query = LiteratureQuery::new("crispr");
        assert_eq!(query.resolve_years(1900, 2024), (1900, 2024));

        let query = query.with_years(Some(2010), None);
        assert_eq!(query.resolve_years(1900, 2024), (2010, 2024));
    }
}
