//! Query parameters for Hetzner list endpoints.

use std::fmt::Display;

/// Largest page size accepted by list endpoints.
pub const MAX_PER_PAGE: u32 = 50;

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Filters and paging shared by every list endpoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListParams {
    /// Exact resource name.
    pub name: Option<String>,
    /// Label selector expression.
    pub label_selector: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Entries per page.
    pub per_page: Option<u32>,
}

impl ListParams {
    /// Parameters for the first page with the given page size.
    #[must_use]
    pub fn first_page(per_page: u32) -> Self {
        Self {
            page: Some(1),
            per_page: Some(per_page.clamp(1, MAX_PER_PAGE)),
            ..Self::default()
        }
    }

    /// Convert to URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_deref());
        params.push_opt("label_selector", self.label_selector.as_deref());
        params.push_opt("page", self.page);
        params.push_opt("per_page", self.per_page);
        params.into_pairs()
    }
}
