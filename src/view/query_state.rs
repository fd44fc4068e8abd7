use std::fmt;
use std::time::Instant;

use tracing::debug;

use crate::debouncer::Debouncer;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Page sizes offered by the page-size selector
pub const PAGE_SIZE_CHOICES: [u32; 5] = [25, 50, 100, 250, 500];

/// Identifier of an uploaded database on the server (its stored file name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseId(pub String);

impl DatabaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DatabaseId {
    fn from(value: &str) -> Self {
        DatabaseId(value.to_string())
    }
}

impl From<String> for DatabaseId {
    fn from(value: String) -> Self {
        DatabaseId(value)
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_param(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Columns a free-text search is restricted to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    All,
    Columns(Vec<String>),
}

impl SearchScope {
    /// Build a scope from a column selection. An empty selection, or one that
    /// contains the `all` sentinel, means every column.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if column == "all" {
                return SearchScope::All;
            }
            if !column.is_empty() && !selected.contains(&column) {
                selected.push(column);
            }
        }

        if selected.is_empty() {
            SearchScope::All
        } else {
            SearchScope::Columns(selected)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SearchScope::All)
    }

    pub fn columns(&self) -> &[String] {
        match self {
            SearchScope::All => &[],
            SearchScope::Columns(columns) => columns,
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns().iter().any(|c| c == column)
    }

    /// Add or remove a single column, collapsing back to `All` when empty
    pub fn toggled(&self, column: &str) -> Self {
        let mut columns = self.columns().to_vec();
        if let Some(pos) = columns.iter().position(|c| c == column) {
            columns.remove(pos);
        } else {
            columns.push(column.to_string());
        }
        SearchScope::from_columns(columns)
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchScope::All => f.write_str("All Columns"),
            SearchScope::Columns(columns) => f.write_str(&columns.join(", ")),
        }
    }
}

/// Everything that determines which slice of which table is on screen.
///
/// Transitions are pure: each `with_*` method returns the next state and
/// leaves `self` untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub database: Option<DatabaseId>,
    pub table: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub sort_column: Option<String>,
    pub sort_order: SortOrder,
    pub search_term: String,
    pub search_scope: SearchScope,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::with_page_size_default(DEFAULT_PAGE_SIZE)
    }
}

impl ViewState {
    pub fn with_page_size_default(page_size: u32) -> Self {
        Self {
            database: None,
            table: None,
            page: 1,
            page_size: page_size.max(1),
            sort_column: None,
            sort_order: SortOrder::Asc,
            search_term: String::new(),
            search_scope: SearchScope::All,
        }
    }

    /// Switch database; any table selection belongs to the old database
    pub fn with_database(&self, database: Option<DatabaseId>) -> Self {
        Self {
            database,
            ..self.cleared()
        }
    }

    /// Select a table: sort, search and scope start over on page 1
    pub fn with_table(&self, table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            ..self.cleared()
        }
    }

    /// Drop the table selection and everything that hangs off it
    pub fn cleared(&self) -> Self {
        Self {
            database: self.database.clone(),
            ..Self::with_page_size_default(self.page_size)
        }
    }

    /// Same column flips the direction, a new column sorts ascending
    pub fn with_sort(&self, column: &str) -> Self {
        let sort_order = if self.sort_column.as_deref() == Some(column) {
            self.sort_order.toggled()
        } else {
            SortOrder::Asc
        };
        Self {
            sort_column: Some(column.to_string()),
            sort_order,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_search_term(&self, term: &str) -> Self {
        Self {
            search_term: term.to_string(),
            page: 1,
            ..self.clone()
        }
    }

    /// Replacing the scope keeps the current page
    pub fn with_search_scope(&self, scope: SearchScope) -> Self {
        Self {
            search_scope: scope,
            ..self.clone()
        }
    }

    pub fn with_page_size(&self, page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    /// Direction of the sort if `column` is the active sort column
    pub fn sort_for(&self, column: &str) -> Option<SortOrder> {
        (self.sort_column.as_deref() == Some(column)).then_some(self.sort_order)
    }

    pub fn to_query_params(&self) -> QueryParams {
        QueryParams {
            page: self.page,
            per_page: self.page_size,
            sort_column: self.sort_column.clone().unwrap_or_default(),
            sort_order: self.sort_order,
            search: self.search_term.clone(),
            search_columns: self.search_scope.columns().to_vec(),
        }
    }
}

/// Canonical query parameters for the paginated table endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub page: u32,
    pub per_page: u32,
    pub sort_column: String,
    pub sort_order: SortOrder,
    pub search: String,
    pub search_columns: Vec<String>,
}

impl QueryParams {
    /// Key/value pairs in wire order; `search_columns` repeats once per column
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
            ("sort_column", self.sort_column.clone()),
            ("sort_order", self.sort_order.as_param().to_string()),
            ("search", self.search.clone()),
        ];
        pairs.extend(
            self.search_columns
                .iter()
                .map(|column| ("search_columns", column.clone())),
        );
        pairs
    }

    /// The same parameters with paging replaced, for unpaginated fetches
    pub fn unpaginated(&self, per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            ..self.clone()
        }
    }
}

/// Owns the `ViewState` and the pending (debounced) search keystrokes
#[derive(Debug)]
pub struct QueryStateManager {
    state: ViewState,
    search_debounce: Debouncer<String>,
}

impl Default for QueryStateManager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE_MS)
    }
}

impl QueryStateManager {
    pub fn new(page_size: u32, debounce_ms: u64) -> Self {
        Self {
            state: ViewState::with_page_size_default(page_size),
            search_debounce: Debouncer::new(debounce_ms),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    fn transition(&mut self, next: ViewState, reason: &str) {
        debug!(target: "view_state", "{}: {:?} -> {:?}", reason, self.state, next);
        self.state = next;
    }

    pub fn select_database(&mut self, database: DatabaseId) {
        self.search_debounce.cancel();
        let next = self.state.with_database(Some(database));
        self.transition(next, "select_database");
    }

    pub fn set_table(&mut self, table: &str) {
        self.search_debounce.cancel();
        let next = self.state.with_table(table);
        self.transition(next, "set_table");
    }

    pub fn clear_table(&mut self) {
        self.search_debounce.cancel();
        let next = self.state.cleared();
        self.transition(next, "clear_table");
    }

    pub fn set_sort(&mut self, column: &str) {
        let next = self.state.with_sort(column);
        self.transition(next, "set_sort");
    }

    /// Record a keystroke in the search box. Nothing is committed until the
    /// debounce delay has elapsed without another keystroke.
    pub fn type_search(&mut self, term: &str, now: Instant) {
        self.search_debounce.schedule(term.to_string(), now);
    }

    /// Commit the pending search term if the quiet period is over.
    /// Returns true when the state changed and a reload is due.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        match self.search_debounce.poll(now) {
            Some(term) => {
                let next = self.state.with_search_term(&term);
                self.transition(next, "search (debounced)");
                true
            }
            None => false,
        }
    }

    /// Commit a search term right away, dropping any pending keystrokes
    pub fn commit_search(&mut self, term: &str) {
        self.search_debounce.cancel();
        let next = self.state.with_search_term(term);
        self.transition(next, "search");
    }

    pub fn pending_search(&self) -> Option<&str> {
        self.search_debounce.pending_value().map(String::as_str)
    }

    pub fn search_pending(&self) -> bool {
        self.search_debounce.is_pending()
    }

    pub fn set_search_scope(&mut self, scope: SearchScope) {
        let next = self.state.with_search_scope(scope);
        self.transition(next, "set_search_scope");
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        let next = self.state.with_page_size(page_size);
        self.transition(next, "set_page_size");
    }

    /// Bounds are the caller's business; see `PaginationController`
    pub fn set_page(&mut self, page: u32) {
        let next = self.state.with_page(page);
        self.transition(next, "set_page");
    }

    pub fn to_query_params(&self) -> QueryParams {
        self.state.to_query_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn on_table(table: &str) -> QueryStateManager {
        let mut manager = QueryStateManager::default();
        manager.select_database(DatabaseId::from("20240101_shop.sqlite"));
        manager.set_table(table);
        manager
    }

    #[test]
    fn test_sort_same_column_twice_flips_order() {
        let mut manager = on_table("customers");
        manager.set_page(4);

        manager.set_sort("name");
        assert_eq!(manager.state().sort_column.as_deref(), Some("name"));
        assert_eq!(manager.state().sort_order, SortOrder::Asc);
        assert_eq!(manager.state().page, 1);

        manager.set_sort("name");
        assert_eq!(manager.state().sort_order, SortOrder::Desc);
        assert_eq!(manager.state().page, 1);

        manager.set_sort("email");
        assert_eq!(manager.state().sort_column.as_deref(), Some("email"));
        assert_eq!(manager.state().sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_set_table_resets_sort_and_search() {
        let mut manager = on_table("customers");
        manager.set_page_size(100);
        manager.set_sort("name");
        manager.commit_search("bob");
        manager.set_search_scope(SearchScope::from_columns(["name"]));
        manager.set_page(3);

        manager.set_table("orders");
        let state = manager.state();
        assert_eq!(state.table.as_deref(), Some("orders"));
        assert_eq!(state.page, 1);
        assert_eq!(state.sort_column, None);
        assert_eq!(state.sort_order, SortOrder::Asc);
        assert!(state.search_term.is_empty());
        assert!(state.search_scope.is_all());
        assert_eq!(state.page_size, 100);
        assert!(state.database.is_some());
    }

    #[test]
    fn test_scope_change_keeps_page() {
        let mut manager = on_table("customers");
        manager.set_page(7);
        manager.set_search_scope(SearchScope::from_columns(["city"]));
        assert_eq!(manager.state().page, 7);
    }

    #[test]
    fn test_page_size_resets_page() {
        let mut manager = on_table("customers");
        manager.set_page(7);
        manager.set_page_size(25);
        assert_eq!(manager.state().page, 1);
        assert_eq!(manager.state().page_size, 25);
    }

    #[test]
    fn test_set_page_is_unchecked() {
        let mut manager = on_table("customers");
        manager.set_page(9999);
        assert_eq!(manager.state().page, 9999);
        manager.set_page(0);
        assert_eq!(manager.state().page, 1);
    }

    #[test]
    fn test_debounced_search_commits_after_quiet_period() {
        let start = Instant::now();
        let mut manager = on_table("customers");
        manager.set_page(5);

        manager.type_search("a", start);
        manager.type_search("al", start + Duration::from_millis(100));
        assert!(!manager.poll_search(start + Duration::from_millis(350)));
        assert!(manager.state().search_term.is_empty());
        assert_eq!(manager.state().page, 5);
        assert_eq!(manager.pending_search(), Some("al"));

        assert!(manager.poll_search(start + Duration::from_millis(400)));
        assert_eq!(manager.state().search_term, "al");
        assert_eq!(manager.state().page, 1);
        assert!(!manager.search_pending());
    }

    #[test]
    fn test_commit_search_cancels_pending() {
        let start = Instant::now();
        let mut manager = on_table("customers");
        manager.type_search("abc", start);
        manager.commit_search("");
        assert!(!manager.poll_search(start + Duration::from_secs(1)));
        assert!(manager.state().search_term.is_empty());
    }

    #[test]
    fn test_query_params() {
        let mut manager = on_table("orders");
        manager.set_sort("Total");
        manager.set_sort("Total");
        manager.commit_search("alpha");

        let params = manager.to_query_params();
        assert_eq!(
            params.to_pairs(),
            vec![
                ("page", "1".to_string()),
                ("per_page", "50".to_string()),
                ("sort_column", "Total".to_string()),
                ("sort_order", "DESC".to_string()),
                ("search", "alpha".to_string()),
            ]
        );

        manager.set_search_scope(SearchScope::from_columns(["name", "city", "name"]));
        let pairs = manager.to_query_params().to_pairs();
        let scoped: Vec<&str> = pairs
            .iter()
            .filter(|(key, _)| *key == "search_columns")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(scoped, vec!["name", "city"]);
    }

    #[test]
    fn test_unsorted_params_send_empty_column() {
        let manager = on_table("orders");
        let params = manager.to_query_params();
        assert_eq!(params.sort_column, "");
        assert_eq!(params.sort_order, SortOrder::Asc);
        assert!(params.search_columns.is_empty());
    }

    #[test]
    fn test_scope_sentinel_and_toggle() {
        assert!(SearchScope::from_columns(Vec::<String>::new()).is_all());
        assert!(SearchScope::from_columns(["name", "all"]).is_all());

        let scope = SearchScope::All.toggled("name");
        assert_eq!(scope.columns(), &["name".to_string()]);
        assert!(scope.contains("name"));
        assert!(scope.toggled("name").is_all());
    }

    #[test]
    fn test_transitions_do_not_mutate_previous_state() {
        let before = ViewState::default().with_table("orders");
        let after = before.with_sort("id");
        assert_eq!(before.sort_column, None);
        assert_eq!(after.sort_column.as_deref(), Some("id"));
    }
}
