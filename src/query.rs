//! Immutable query descriptors for paginated requests.
//!
//! A [`Query`] captures everything one request needs: the optional
//! single-item identifier, filters, field/include selections, sort key, and
//! the three pagination fields. Descriptors are never mutated in place;
//! deriving a per-page copy with [`Query::with_page`] produces a new value
//! that keeps every other field identical, which is how one logical query
//! becomes N per-page descriptors.

use std::collections::BTreeMap;

/// Immutable request specification for one page of a paginated query.
///
/// # Example
///
/// ```
/// use pagefetch::Query;
///
/// let query = Query::new()
///     .filter("country_code", "UK")
///     .fields(["name", "rank"])
///     .sort("-rank")
///     .per_page(100);
///
/// let params = query.to_params("brands");
/// assert!(params.contains(&("filter[country_code]".to_string(), "UK".to_string())));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    item_id: Option<u64>,
    filters: BTreeMap<String, String>,
    fields: Vec<String>,
    include: Vec<String>,
    sort: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
    max_pages: Option<u32>,
}

impl Query {
    /// Creates an empty query that retrieves everything with server defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets a single item by identifier.
    ///
    /// Pagination fields are meaningless for an identifier-targeted query and
    /// are ignored by the orchestrator.
    #[must_use]
    pub fn item_id(mut self, id: u64) -> Self {
        self.item_id = Some(id);
        self
    }

    /// Adds one filter key/value pair.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Restricts the response to specific fields.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Requests additional related resources in the response.
    #[must_use]
    pub fn include<I, S>(mut self, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    /// Sorts the response by a field; prefix with `-` for descending order.
    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Requests a specific page. Pages are one-based; zero is clamped to 1.
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page.max(1));
        self
    }

    /// Sets the number of items per page. Zero is clamped to 1.
    #[must_use]
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page.max(1));
        self
    }

    /// Caps the number of pages a multi-page run will retrieve. Zero is
    /// clamped to 1.
    #[must_use]
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages.max(1));
        self
    }

    /// The single-item identifier, if this query targets one item.
    #[must_use]
    pub fn item_id_value(&self) -> Option<u64> {
        self.item_id
    }

    /// The requested starting page, if set.
    #[must_use]
    pub fn page_value(&self) -> Option<u32> {
        self.page
    }

    /// The requested page size, if set.
    #[must_use]
    pub fn per_page_value(&self) -> Option<u32> {
        self.per_page
    }

    /// The requested page cap, if set.
    #[must_use]
    pub fn max_pages_value(&self) -> Option<u32> {
        self.max_pages
    }

    /// Renders the query as wire key/value pairs for `endpoint`.
    ///
    /// Filters serialize as `filter[key]=value`, field selections as
    /// `fields[endpoint]=a,b` (endpoint dashes become underscores), include
    /// lists as a comma-joined `include`. The item identifier travels in the
    /// URL path rather than the parameters, and `max_pages` is client-side
    /// only; neither serializes.
    #[must_use]
    pub fn to_params(&self, endpoint: &str) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            params.push(("per_page".to_string(), per_page.to_string()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.clone()));
        }
        if !self.include.is_empty() {
            params.push(("include".to_string(), self.include.join(",")));
        }
        for (key, value) in &self.filters {
            params.push((format!("filter[{key}]"), value.clone()));
        }
        if !self.fields.is_empty() {
            let resource = endpoint.replace('-', "_");
            params.push((format!("fields[{resource}]"), self.fields.join(",")));
        }

        params
    }

    /// Derives a copy with the given pagination fields overridden.
    ///
    /// Fields passed as `None` keep the original value; everything outside
    /// pagination is carried over unchanged.
    #[must_use]
    pub fn with_page(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
        max_pages: Option<u32>,
    ) -> Self {
        Self {
            page: page.or(self.page),
            per_page: per_page.or(self.per_page),
            max_pages: max_pages.or(self.max_pages),
            ..self.clone()
        }
    }

    /// Yields one derived descriptor per page, starting at the query's own
    /// page (or 1), for `n_pages` pages.
    pub fn paginated(
        &self,
        n_pages: u32,
        per_page: Option<u32>,
    ) -> impl Iterator<Item = Query> + '_ {
        let start_page = self.page.unwrap_or(1);
        (start_page..start_page + n_pages).map(move |p| self.with_page(Some(p), per_page, None))
    }

    /// Whether this query would request exactly one page.
    ///
    /// True when `max_pages` is 1, or when an explicit page is requested with
    /// neither a page-size nor a page-cap override.
    #[must_use]
    pub fn is_single_page(&self) -> bool {
        self.max_pages == Some(1)
            || (self.page.is_some() && self.per_page.is_none() && self.max_pages.is_none())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Param Rendering Tests ====================

    #[test]
    fn test_to_params_renders_filters_and_fields() {
        let query = Query::new()
            .filter("country_code", "UK")
            .filter("year_number", "2023")
            .fields(["name", "rank"])
            .include(["company", "sector"])
            .sort("-rank")
            .page(2)
            .per_page(50);

        let params = query.to_params("brandscape-data");
        assert!(params.contains(&("filter[country_code]".into(), "UK".into())));
        assert!(params.contains(&("filter[year_number]".into(), "2023".into())));
        assert!(params.contains(&("fields[brandscape_data]".into(), "name,rank".into())));
        assert!(params.contains(&("include".into(), "company,sector".into())));
        assert!(params.contains(&("sort".into(), "-rank".into())));
        assert!(params.contains(&("page".into(), "2".into())));
        assert!(params.contains(&("per_page".into(), "50".into())));
    }

    #[test]
    fn test_to_params_excludes_item_id_and_max_pages() {
        let query = Query::new().item_id(42).max_pages(5);
        let params = query.to_params("brands");
        assert!(params.is_empty(), "got unexpected params: {params:?}");
    }

    #[test]
    fn test_empty_query_renders_no_params() {
        assert!(Query::new().to_params("brands").is_empty());
    }

    #[test]
    fn test_zero_pagination_values_clamp_to_one() {
        let query = Query::new().page(0).per_page(0).max_pages(0);
        assert_eq!(query.page_value(), Some(1));
        assert_eq!(query.per_page_value(), Some(1));
        assert_eq!(query.max_pages_value(), Some(1));
        assert!(query
            .to_params("brands")
            .contains(&("per_page".into(), "1".into())));
    }

    // ==================== Page Derivation Tests ====================

    #[test]
    fn test_with_page_overrides_only_pagination() {
        let base = Query::new().filter("name", "Swatch").per_page(25);
        let derived = base.with_page(Some(3), Some(100), None);

        assert_eq!(derived.page_value(), Some(3));
        assert_eq!(derived.per_page_value(), Some(100));
        // Non-pagination fields are identical; the original is untouched.
        assert_eq!(derived.to_params("brands").len(), 3);
        assert_eq!(base.page_value(), None);
        assert_eq!(base.per_page_value(), Some(25));
    }

    #[test]
    fn test_with_page_none_keeps_existing_values() {
        let base = Query::new().page(4).per_page(25).max_pages(6);
        let derived = base.with_page(None, Some(100), None);

        assert_eq!(derived.page_value(), Some(4));
        assert_eq!(derived.per_page_value(), Some(100));
        assert_eq!(derived.max_pages_value(), Some(6));
    }

    #[test]
    fn test_paginated_yields_consecutive_pages() {
        let base = Query::new().filter("name", "Swatch");
        let pages: Vec<Option<u32>> = base
            .paginated(3, Some(100))
            .map(|q| q.page_value())
            .collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_paginated_starts_at_query_page() {
        let base = Query::new().page(5);
        let pages: Vec<Option<u32>> = base.paginated(3, None).map(|q| q.page_value()).collect();
        assert_eq!(pages, vec![Some(5), Some(6), Some(7)]);
    }

    #[test]
    fn test_paginated_keeps_filters() {
        let base = Query::new().filter("country_code", "UK");
        for derived in base.paginated(4, Some(100)) {
            let params = derived.to_params("brands");
            assert!(params.contains(&("filter[country_code]".into(), "UK".into())));
        }
    }

    // ==================== Single-Page Detection Tests ====================

    #[test]
    fn test_single_page_when_max_pages_is_one() {
        assert!(Query::new().max_pages(1).is_single_page());
        assert!(Query::new().per_page(500).max_pages(1).is_single_page());
    }

    #[test]
    fn test_single_page_when_explicit_page_without_overrides() {
        assert!(Query::new().page(2).is_single_page());
    }

    #[test]
    fn test_multi_page_cases() {
        assert!(!Query::new().is_single_page());
        assert!(!Query::new().page(2).per_page(100).is_single_page());
        assert!(!Query::new().page(2).max_pages(5).is_single_page());
        assert!(!Query::new().per_page(100).is_single_page());
    }
}
