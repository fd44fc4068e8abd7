//! Load state machine and render model for the table pane
//!
//! `TableViewController` never performs I/O itself. Every user intent that
//! needs fresh data returns a `LoadRequest`; whoever executes it (a worker
//! thread in the TUI, a direct call in the CLI) hands the result back through
//! `complete`. Each request carries a ticket and only the latest ticket is
//! allowed to change what is on screen.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::api::{ApiError, ColumnDescriptor, DatabaseInfo, DatabaseListing, PaginationSummary, Row, TablePage};
use crate::datasource_trait::TableSource;
use crate::notice::Notice;
use crate::view::cell_formatter::{CellFormatter, RenderedCell};
use crate::view::pagination::{NavigationOutcome, PageStrip, PaginationController};
use crate::view::query_state::{
    DatabaseId, QueryParams, QueryStateManager, SearchScope, SortOrder, ViewState, PAGE_SIZE_CHOICES,
};

pub const NO_DATA_MESSAGE: &str = "No data found";
pub const LOAD_FAILED_FALLBACK: &str = "Failed to load table data";

/// Monotonic request sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// A table fetch the controller wants executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub database: DatabaseId,
    pub table: String,
    pub params: QueryParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// What `complete` did with a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer request was issued after this one; the response was dropped
    Stale,
    Failed(Notice),
}

/// Result of a page navigation intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Load(LoadRequest),
    Notice(Notice),
    /// Nothing loaded yet, nothing to do
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub name: String,
    pub declared_type: String,
    pub sort: Option<SortOrder>,
}

impl HeaderCell {
    pub fn sort_marker(&self) -> &'static str {
        match self.sort {
            Some(SortOrder::Asc) => " ▲",
            Some(SortOrder::Desc) => " ▼",
            None => "",
        }
    }
}

/// Everything a front end needs to draw the table pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRender {
    pub table: Option<String>,
    pub phase: LoadPhase,
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Vec<RenderedCell>>,
    /// Set instead of `rows` when a load succeeded with zero rows
    pub placeholder: Option<String>,
    /// Columns offered in the search-scope selector (after "All Columns")
    pub scope_options: Vec<String>,
    pub search_scope: SearchScope,
    pub search_term: String,
    pub strip: Option<PageStrip>,
    pub range_text: Option<String>,
}

#[derive(Debug)]
pub struct TableViewController {
    query: QueryStateManager,
    pager: PaginationController,
    formatter: CellFormatter,
    phase: LoadPhase,
    issued: u64,
    in_flight: Option<LoadTicket>,
    databases: Vec<DatabaseInfo>,
    admin_enabled: bool,
    tables: Vec<String>,
    table_filter: String,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    pagination: Option<PaginationSummary>,
}

impl Default for TableViewController {
    fn default() -> Self {
        Self::new(
            QueryStateManager::default(),
            PaginationController::default(),
            CellFormatter::default(),
        )
    }
}

impl TableViewController {
    pub fn new(query: QueryStateManager, pager: PaginationController, formatter: CellFormatter) -> Self {
        Self {
            query,
            pager,
            formatter,
            phase: LoadPhase::Idle,
            issued: 0,
            in_flight: None,
            databases: Vec::new(),
            admin_enabled: false,
            tables: Vec::new(),
            table_filter: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            pagination: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        self.query.state()
    }

    pub fn query(&self) -> &QueryStateManager {
        &self.query
    }

    pub fn formatter(&self) -> &CellFormatter {
        &self.formatter
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn pagination(&self) -> Option<&PaginationSummary> {
        self.pagination.as_ref()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    // --- databases and tables ---

    pub fn set_databases(&mut self, listing: DatabaseListing) {
        self.databases = listing.databases;
        self.admin_enabled = listing.admin_enabled;
    }

    pub fn databases(&self) -> &[DatabaseInfo] {
        &self.databases
    }

    pub fn admin_enabled(&self) -> bool {
        self.admin_enabled
    }

    /// Switch database. Table list and data belong to the old database and
    /// are dropped; any in-flight load becomes stale.
    pub fn select_database(&mut self, database: DatabaseId) {
        info!("Selecting database {}", database);
        self.query.select_database(database);
        self.tables.clear();
        self.table_filter.clear();
        self.reset_data();
    }

    pub fn set_tables(&mut self, tables: Vec<String>) {
        self.tables = tables;
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn set_table_filter(&mut self, filter: &str) {
        self.table_filter = filter.to_string();
    }

    pub fn table_filter(&self) -> &str {
        &self.table_filter
    }

    /// Tables whose name contains the filter, ignoring case
    pub fn visible_tables(&self) -> Vec<&str> {
        let needle = self.table_filter.to_lowercase();
        self.tables
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    /// Select a table and start loading its first page. `None` when no
    /// database is selected.
    pub fn select_table(&mut self, table: &str) -> Option<LoadRequest> {
        self.state().database.as_ref()?;
        self.query.set_table(table);
        self.reset_data();
        self.issue_load()
    }

    pub fn clear_table(&mut self) {
        self.query.clear_table();
        self.reset_data();
    }

    fn reset_data(&mut self) {
        self.columns.clear();
        self.rows.clear();
        self.pagination = None;
        self.in_flight = None;
        self.phase = LoadPhase::Idle;
    }

    // --- query changes ---

    /// Header click: same column flips direction, another sorts ascending
    pub fn sort_by(&mut self, column: &str) -> Option<LoadRequest> {
        self.state().table.as_ref()?;
        self.query.set_sort(column);
        self.issue_load()
    }

    pub fn type_search(&mut self, term: &str, now: Instant) {
        self.query.type_search(term, now);
    }

    /// Drive the search debounce; returns a request once the term commits
    pub fn poll_search(&mut self, now: Instant) -> Option<LoadRequest> {
        if self.query.poll_search(now) {
            self.issue_load()
        } else {
            None
        }
    }

    pub fn search_pending(&self) -> bool {
        self.query.search_pending()
    }

    pub fn commit_search(&mut self, term: &str) -> Option<LoadRequest> {
        self.query.commit_search(term);
        self.issue_load()
    }

    /// Escape / clear button
    pub fn clear_search(&mut self) -> Option<LoadRequest> {
        if self.state().search_term.is_empty() && !self.query.search_pending() {
            return None;
        }
        self.commit_search("")
    }

    pub fn set_search_scope(&mut self, scope: SearchScope) -> Option<LoadRequest> {
        self.query.set_search_scope(scope);
        self.issue_load()
    }

    /// Add or remove one column from the search scope
    pub fn toggle_search_column(&mut self, column: &str) -> Option<LoadRequest> {
        let scope = self.state().search_scope.toggled(column);
        self.set_search_scope(scope)
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Option<LoadRequest> {
        self.query.set_page_size(page_size);
        self.issue_load()
    }

    /// Step through the page-size choices, staying at either end
    pub fn cycle_page_size(&mut self, step: i32) -> Option<LoadRequest> {
        let current = self.state().page_size;
        let index = PAGE_SIZE_CHOICES
            .iter()
            .position(|size| *size >= current)
            .unwrap_or(PAGE_SIZE_CHOICES.len() - 1) as i64;
        let next = (index + i64::from(step)).clamp(0, PAGE_SIZE_CHOICES.len() as i64 - 1) as usize;
        if PAGE_SIZE_CHOICES[next] == current {
            return None;
        }
        self.set_page_size(PAGE_SIZE_CHOICES[next])
    }

    /// Previous/next page, checked against the last server summary
    pub fn navigate(&mut self, direction: i32) -> Navigation {
        if self.state().table.is_none() {
            return Navigation::Ignored;
        }
        match self.pager.navigate(direction, self.pagination.as_ref()) {
            None => Navigation::Ignored,
            Some(outcome) => self.apply_navigation(outcome),
        }
    }

    /// Direct jump to a page (page strip, CLI `--page`)
    pub fn go_to_page(&mut self, page: u32) -> Navigation {
        if self.state().table.is_none() {
            return Navigation::Ignored;
        }
        match self.pagination.as_ref() {
            None => Navigation::Ignored,
            Some(summary) => {
                let outcome = self.pager.validate_jump(page, summary);
                self.apply_navigation(outcome)
            }
        }
    }

    fn apply_navigation(&mut self, outcome: NavigationOutcome) -> Navigation {
        match outcome {
            NavigationOutcome::Navigate(page) => {
                self.query.set_page(page);
                self.issue_load().map_or(Navigation::Ignored, Navigation::Load)
            }
            NavigationOutcome::Rejected(rejection) => {
                Navigation::Notice(Notice::info("Navigation", rejection.to_string()))
            }
        }
    }

    /// Re-issue the current query (refresh)
    pub fn reload(&mut self) -> Option<LoadRequest> {
        self.issue_load()
    }

    fn issue_load(&mut self) -> Option<LoadRequest> {
        let state = self.query.state();
        let database = state.database.clone()?;
        let table = state.table.clone()?;
        let params = state.to_query_params();

        self.issued += 1;
        let ticket = LoadTicket(self.issued);
        self.in_flight = Some(ticket);
        self.phase = LoadPhase::Loading;

        info!(
            "Loading {}/{} page {} (ticket {})",
            database, table, params.page, ticket.0
        );
        Some(LoadRequest {
            ticket,
            database,
            table,
            params,
        })
    }

    // --- responses ---

    /// Apply a finished load. Anything but the latest issued ticket is
    /// discarded without touching the view.
    pub fn complete(&mut self, ticket: LoadTicket, result: Result<TablePage, ApiError>) -> LoadOutcome {
        if self.in_flight != Some(ticket) {
            debug!(
                "Discarding stale response for ticket {} (latest {:?})",
                ticket.0, self.in_flight
            );
            return LoadOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                info!(
                    "Loaded {} rows (page {}/{}, {} total)",
                    page.rows.len(),
                    page.pagination.page,
                    page.pagination.total_pages,
                    page.pagination.total
                );
                self.columns = page.columns;
                self.rows = page.rows;
                self.pagination = Some(page.pagination);
                self.phase = LoadPhase::Loaded;
                LoadOutcome::Applied
            }
            Err(err) => {
                warn!("Table load failed: {}", err);
                self.phase = LoadPhase::Failed;
                let message = match &err {
                    ApiError::Server { message, .. } if message.trim().is_empty() => {
                        LOAD_FAILED_FALLBACK.to_string()
                    }
                    other => other.user_message("loading table"),
                };
                LoadOutcome::Failed(Notice::error("Load Failed", message))
            }
        }
    }

    /// Execute a request synchronously against `source` and apply it
    pub fn fetch_and_apply(&mut self, source: &dyn TableSource, request: &LoadRequest) -> LoadOutcome {
        let result = source.fetch_page(&request.database, &request.table, &request.params);
        self.complete(request.ticket, result)
    }

    // --- rendering ---

    pub fn render(&self) -> TableRender {
        let state = self.query.state();

        let headers = self
            .columns
            .iter()
            .map(|column| HeaderCell {
                name: column.name.clone(),
                declared_type: column.declared_type.clone(),
                sort: state.sort_for(&column.name),
            })
            .collect();

        let rows: Vec<Vec<RenderedCell>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| self.formatter.format(row.get(&column.name), &column.declared_type))
                    .collect()
            })
            .collect();

        let placeholder = (self.pagination.is_some() && rows.is_empty())
            .then(|| NO_DATA_MESSAGE.to_string());

        TableRender {
            table: state.table.clone(),
            phase: self.phase,
            headers,
            rows,
            placeholder,
            scope_options: self.columns.iter().map(|c| c.name.clone()).collect(),
            search_scope: state.search_scope.clone(),
            search_term: state.search_term.clone(),
            strip: self.pagination.as_ref().map(|p| self.pager.visible_window(p)),
            range_text: self.pagination.as_ref().map(PaginationController::range_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;
    use serde_json::json;

    fn page(rows: usize, page: u32, total_pages: u32) -> TablePage {
        TablePage {
            rows: (0..rows)
                .map(|i| {
                    let mut row = Row::new();
                    row.insert("id".to_string(), json!(i.to_string()));
                    row.insert("name".to_string(), json!(format!("item {i}")));
                    row
                })
                .collect(),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER"),
                ColumnDescriptor::new("name", "TEXT"),
            ],
            pagination: PaginationSummary {
                page,
                per_page: 50,
                total: u64::from(total_pages) * 50,
                total_pages,
                filtered: None,
            },
        }
    }

    fn on_orders() -> (TableViewController, LoadRequest) {
        let mut view = TableViewController::default();
        view.select_database(DatabaseId::from("shop.sqlite"));
        let request = view.select_table("Orders").unwrap();
        (view, request)
    }

    #[test]
    fn test_select_table_requires_database() {
        let mut view = TableViewController::default();
        assert!(view.select_table("Orders").is_none());
        assert_eq!(view.phase(), LoadPhase::Idle);
    }

    #[test]
    fn test_load_cycle() {
        let (mut view, request) = on_orders();
        assert_eq!(view.phase(), LoadPhase::Loading);
        assert_eq!(request.params.page, 1);

        assert_eq!(view.complete(request.ticket, Ok(page(3, 1, 2))), LoadOutcome::Applied);
        assert_eq!(view.phase(), LoadPhase::Loaded);
        let render = view.render();
        assert_eq!(render.rows.len(), 3);
        assert_eq!(render.placeholder, None);
        assert_eq!(render.scope_options, vec!["id", "name"]);
        assert_eq!(render.range_text.as_deref(), Some("Showing 1-50 of 100 rows"));
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let (mut view, first) = on_orders();
        let second = view.sort_by("name").unwrap();
        assert!(second.ticket > first.ticket);

        assert_eq!(view.complete(second.ticket, Ok(page(2, 1, 1))), LoadOutcome::Applied);
        assert_eq!(view.complete(first.ticket, Ok(page(9, 1, 1))), LoadOutcome::Stale);
        assert_eq!(view.rows().len(), 2);
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let (mut view, request) = on_orders();
        view.complete(request.ticket, Ok(page(5, 1, 3)));

        let Navigation::Load(next) = view.navigate(1) else {
            panic!("expected a load");
        };
        let outcome = view.complete(
            next.ticket,
            Err(ApiError::server("Table 'Orders' not found or access denied.")),
        );
        match outcome {
            LoadOutcome::Failed(notice) => {
                assert_eq!(notice.level, NoticeLevel::Error);
                assert_eq!(notice.message, "Table 'Orders' not found or access denied.");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(view.phase(), LoadPhase::Failed);
        assert_eq!(view.rows().len(), 5);
        assert_eq!(view.pagination().map(|p| p.page), Some(1));
    }

    #[test]
    fn test_empty_server_message_uses_fallback() {
        let (mut view, request) = on_orders();
        let LoadOutcome::Failed(notice) = view.complete(request.ticket, Err(ApiError::server(" "))) else {
            panic!("expected failure");
        };
        assert_eq!(notice.message, LOAD_FAILED_FALLBACK);
    }

    #[test]
    fn test_empty_result_shows_placeholder() {
        let (mut view, request) = on_orders();
        view.complete(request.ticket, Ok(page(0, 1, 0)));
        let render = view.render();
        assert_eq!(render.placeholder.as_deref(), Some(NO_DATA_MESSAGE));
        assert_eq!(render.headers.len(), 2);
        assert_eq!(render.range_text.as_deref(), Some("Showing 0-0 of 0 rows"));
    }

    #[test]
    fn test_navigation_notices() {
        let (mut view, request) = on_orders();
        assert_eq!(view.navigate(1), Navigation::Ignored);

        view.complete(request.ticket, Ok(page(1, 1, 2)));
        match view.navigate(-1) {
            Navigation::Notice(notice) => assert_eq!(notice.message, "Already on the first page"),
            other => panic!("unexpected {other:?}"),
        }
        match view.go_to_page(3) {
            Navigation::Notice(notice) => assert_eq!(notice.message, "Already on the last page (2)"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(view.state().page, 1);
        assert!(matches!(view.go_to_page(2), Navigation::Load(r) if r.params.page == 2));
    }

    #[test]
    fn test_header_sort_markers() {
        let (mut view, _) = on_orders();
        let request = view.sort_by("name").unwrap();
        view.complete(request.ticket, Ok(page(1, 1, 1)));
        let render = view.render();
        assert_eq!(render.headers[0].sort, None);
        assert_eq!(render.headers[1].sort, Some(SortOrder::Asc));
        assert_eq!(render.headers[1].sort_marker(), " ▲");

        let request = view.sort_by("name").unwrap();
        view.complete(request.ticket, Ok(page(1, 1, 1)));
        assert_eq!(view.render().headers[1].sort, Some(SortOrder::Desc));
    }

    #[test]
    fn test_table_filter_ignores_case() {
        let mut view = TableViewController::default();
        view.select_database(DatabaseId::from("shop.sqlite"));
        view.set_tables(vec!["Orders".into(), "Customers".into(), "OrderLines".into()]);
        view.set_table_filter("order");
        assert_eq!(view.visible_tables(), vec!["Orders", "OrderLines"]);

        view.select_database(DatabaseId::from("other.sqlite"));
        assert!(view.tables().is_empty());
        assert_eq!(view.table_filter(), "");
    }

    #[test]
    fn test_switching_database_makes_in_flight_load_stale() {
        let (mut view, request) = on_orders();
        view.select_database(DatabaseId::from("other.sqlite"));
        assert_eq!(view.complete(request.ticket, Ok(page(1, 1, 1))), LoadOutcome::Stale);
        assert_eq!(view.phase(), LoadPhase::Idle);
    }

    #[test]
    fn test_cycle_page_size() {
        let (mut view, _) = on_orders();
        let request = view.cycle_page_size(1).unwrap();
        assert_eq!(request.params.per_page, 100);
        let request = view.cycle_page_size(-2).unwrap();
        assert_eq!(request.params.per_page, 25);
        assert!(view.cycle_page_size(-1).is_none());
    }

    #[test]
    fn test_clear_search_only_when_needed() {
        let (mut view, _) = on_orders();
        assert!(view.clear_search().is_none());
        view.commit_search("alpha").unwrap();
        let request = view.clear_search().unwrap();
        assert_eq!(request.params.search, "");
    }
}
