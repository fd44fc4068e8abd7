use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap};
use ratatui::{Frame, Terminal};
use tracing::{debug, info, warn};

use crate::api::{ApiError, DatabaseListing, TablePage};
use crate::data_exporter::{CsvExporter, ExportError, ExportSummary};
use crate::datasource_trait::TableSource;
use crate::logging::LogRingBuffer;
use crate::notice::{Notice, NoticeLevel};
use crate::trace_key;
use crate::utils::app_paths::AppPaths;
use crate::view::{
    CellKind, DatabaseId, LoadOutcome, LoadPhase, LoadRequest, LoadTicket, Navigation, PageItem, RenderedCell,
    SearchScope, TableRender, TableViewController,
};
use crate::widgets::search_input::{SearchInput, SearchInputAction};

const NOTICE_TTL: Duration = Duration::from_secs(4);
const EVENT_POLL: Duration = Duration::from_millis(50);
const MAX_COLUMN_WIDTH: usize = 40;

/// Results posted back by worker threads
#[derive(Debug)]
enum WorkerMessage {
    Databases(Result<DatabaseListing, ApiError>),
    Tables(DatabaseId, Result<Vec<String>, ApiError>),
    Page(LoadTicket, Result<TablePage, ApiError>),
    Exported(Result<ExportSummary, ExportError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Databases,
    Tables,
    Data,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Databases => Focus::Tables,
            Focus::Tables => Focus::Data,
            Focus::Data => Focus::Databases,
        }
    }
}

/// Terminal front end over `TableViewController`
pub struct DbViewTui {
    source: Arc<dyn TableSource>,
    exporter: CsvExporter,
    view: TableViewController,

    search: SearchInput,
    table_filter: SearchInput,
    focus: Focus,

    db_list: ListState,
    table_list: ListState,
    table_state: TableState,
    selected_column: usize,

    notice: Option<(Notice, Instant)>,
    show_help: bool,
    show_logs: bool,
    log_buffer: Option<LogRingBuffer>,

    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
    exporting: bool,
    should_quit: bool,
}

impl DbViewTui {
    pub fn new(
        source: Arc<dyn TableSource>,
        view: TableViewController,
        exporter: CsvExporter,
        log_buffer: Option<LogRingBuffer>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            exporter,
            view,
            search: SearchInput::new("Search"),
            table_filter: SearchInput::new("Filter"),
            focus: Focus::Databases,
            db_list: ListState::default(),
            table_list: ListState::default(),
            table_state: TableState::default(),
            selected_column: 0,
            notice: None,
            show_help: false,
            show_logs: false,
            log_buffer,
            tx,
            rx,
            exporting: false,
            should_quit: false,
        }
    }

    /// Kick off the initial database listing, optionally opening a database
    pub fn start(&mut self, database: Option<DatabaseId>) {
        self.request_databases();
        if let Some(database) = database {
            self.open_database(database);
        }
    }

    /// Main run loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(EVENT_POLL)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key);
                }
            }

            self.tick(Instant::now());

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    /// Timers and worker results; called once per loop iteration
    fn tick(&mut self, now: Instant) {
        if let Some(request) = self.view.poll_search(now) {
            self.dispatch_load(request);
        }

        while let Ok(message) = self.rx.try_recv() {
            self.apply_message(message);
        }

        if self
            .notice
            .as_ref()
            .is_some_and(|(_, shown)| now.duration_since(*shown) > NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    // --- workers ---

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce(&dyn TableSource) -> WorkerMessage + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let message = job(source.as_ref());
            // The receiver is gone once the app has quit
            let _ = tx.send(message);
        });
    }

    fn request_databases(&self) {
        self.spawn(|source| WorkerMessage::Databases(source.list_databases()));
    }

    fn request_tables(&self, database: DatabaseId) {
        self.spawn(move |source| {
            let result = source.list_tables(&database);
            WorkerMessage::Tables(database, result)
        });
    }

    fn dispatch_load(&self, request: LoadRequest) {
        self.spawn(move |source| {
            let result = source.fetch_page(&request.database, &request.table, &request.params);
            WorkerMessage::Page(request.ticket, result)
        });
    }

    fn dispatch_optional(&self, request: Option<LoadRequest>) {
        if let Some(request) = request {
            self.dispatch_load(request);
        }
    }

    fn apply_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Databases(Ok(listing)) => {
                info!("{} databases available", listing.databases.len());
                self.view.set_databases(listing);
                if self.db_list.selected().is_none() && !self.view.databases().is_empty() {
                    self.db_list.select(Some(0));
                }
            }
            WorkerMessage::Databases(Err(err)) => {
                warn!("Listing databases failed: {}", err);
                self.set_notice(Notice::error("Load Failed", err.user_message("loading databases")));
            }
            WorkerMessage::Tables(database, result) => {
                if self.view.state().database.as_ref() != Some(&database) {
                    debug!("Ignoring table list for {}", database);
                    return;
                }
                match result {
                    Ok(tables) => {
                        self.table_list.select((!tables.is_empty()).then_some(0));
                        self.view.set_tables(tables);
                    }
                    Err(err) => {
                        self.set_notice(Notice::error("Load Failed", err.user_message("loading tables")))
                    }
                }
            }
            WorkerMessage::Page(ticket, result) => match self.view.complete(ticket, result) {
                LoadOutcome::Applied => self.clamp_selection(),
                LoadOutcome::Stale => {}
                LoadOutcome::Failed(notice) => self.set_notice(notice),
            },
            WorkerMessage::Exported(result) => {
                self.exporting = false;
                match result {
                    Ok(summary) => self.set_notice(summary.notice()),
                    Err(err) => {
                        warn!("Export failed: {}", err);
                        self.set_notice(err.notice());
                    }
                }
            }
        }
    }

    fn set_notice(&mut self, notice: Notice) {
        self.notice = Some((notice, Instant::now()));
    }

    fn clamp_selection(&mut self) {
        let rows = self.view.rows().len();
        self.table_state
            .select(if rows == 0 { None } else { Some(self.table_state.selected().unwrap_or(0).min(rows - 1)) });
        let columns = self.view.columns().len();
        self.selected_column = self.selected_column.min(columns.saturating_sub(1));
    }

    // --- intents ---

    fn open_database(&mut self, database: DatabaseId) {
        self.view.select_database(database.clone());
        self.search.set_value(String::new());
        self.table_filter.set_value(String::new());
        self.table_list.select(None);
        self.table_state.select(None);
        self.request_tables(database);
        self.focus = Focus::Tables;
    }

    fn open_table(&mut self, table: &str) {
        self.search.set_value(String::new());
        self.selected_column = 0;
        self.table_state.select(Some(0));
        if let Some(request) = self.view.select_table(table) {
            self.dispatch_load(request);
            self.focus = Focus::Data;
        }
    }

    fn navigate(&mut self, navigation: Navigation) {
        match navigation {
            Navigation::Load(request) => {
                self.table_state.select(Some(0));
                self.dispatch_load(request);
            }
            Navigation::Notice(notice) => self.set_notice(notice),
            Navigation::Ignored => {}
        }
    }

    fn start_export(&mut self) {
        if self.view.state().table.is_none() {
            self.set_notice(Notice::info("Export", "Select a table first"));
            return;
        }
        if self.exporting {
            return;
        }
        self.exporting = true;
        self.set_notice(Notice::info("Export", "Exporting table..."));
        let state = self.view.state().clone();
        let exporter = self.exporter.clone();
        self.spawn(move |source| WorkerMessage::Exported(exporter.export_current_table(source, &state)));
    }

    fn clear_search(&mut self) {
        self.search.set_value(String::new());
        let request = self.view.clear_search();
        self.dispatch_optional(request);
    }

    // --- keys ---

    /// Returns true when the app should exit
    fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        trace_key!(key);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')) {
            self.should_quit = true;
            return true;
        }

        if self.show_help || self.show_logs {
            if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::F(12) | KeyCode::Char('q') | KeyCode::Char('?')) {
                self.show_help = false;
                self.show_logs = false;
            }
            return false;
        }

        if self.search.is_active() {
            self.handle_search_key(key);
            return false;
        }
        if self.table_filter.is_active() {
            self.handle_table_filter_key(key);
            return false;
        }

        match key.code {
            KeyCode::Char('f') if ctrl => {
                self.search.activate();
                return false;
            }
            KeyCode::Char('e') if ctrl => {
                self.start_export();
                return false;
            }
            KeyCode::Char('r') if ctrl => {
                self.request_databases();
                let request = self.view.reload();
                self.dispatch_optional(request);
                return false;
            }
            KeyCode::Left if ctrl => {
                let navigation = self.view.navigate(-1);
                self.navigate(navigation);
                return false;
            }
            KeyCode::Right if ctrl => {
                let navigation = self.view.navigate(1);
                self.navigate(navigation);
                return false;
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.show_help = true;
                return false;
            }
            KeyCode::F(12) => {
                self.show_logs = true;
                return false;
            }
            KeyCode::Esc => {
                self.clear_search();
                return false;
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return false;
            }
            KeyCode::Char('q') => {
                self.should_quit = true;
                return true;
            }
            _ => {}
        }

        match self.focus {
            Focus::Databases => self.handle_databases_key(key),
            Focus::Tables => self.handle_tables_key(key),
            Focus::Data => self.handle_data_key(key),
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match self.search.handle_key(key) {
            SearchInputAction::Changed(term) => self.view.type_search(&term, Instant::now()),
            SearchInputAction::Confirm(term) => {
                let request = self.view.commit_search(&term);
                self.dispatch_optional(request);
                self.focus = Focus::Data;
            }
            SearchInputAction::Clear => self.clear_search(),
            SearchInputAction::Leave => self.focus = Focus::Data,
            SearchInputAction::Continue | SearchInputAction::PassThrough => {}
        }
    }

    fn handle_table_filter_key(&mut self, key: KeyEvent) {
        match self.table_filter.handle_key(key) {
            SearchInputAction::Changed(filter) => {
                self.view.set_table_filter(&filter);
                self.table_list.select((!self.view.visible_tables().is_empty()).then_some(0));
            }
            SearchInputAction::Clear => {
                self.view.set_table_filter("");
                self.table_list.select((!self.view.tables().is_empty()).then_some(0));
            }
            SearchInputAction::Confirm(_) | SearchInputAction::Leave => self.focus = Focus::Tables,
            SearchInputAction::Continue | SearchInputAction::PassThrough => {}
        }
    }

    fn handle_databases_key(&mut self, key: KeyEvent) {
        let count = self.view.databases().len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => move_selection(&mut self.db_list, count, -1),
            KeyCode::Down | KeyCode::Char('j') => move_selection(&mut self.db_list, count, 1),
            KeyCode::Enter => {
                let selected = self
                    .db_list
                    .selected()
                    .and_then(|i| self.view.databases().get(i))
                    .map(|db| DatabaseId::from(db.filename.as_str()));
                if let Some(database) = selected {
                    self.open_database(database);
                }
            }
            _ => {}
        }
    }

    fn handle_tables_key(&mut self, key: KeyEvent) {
        let count = self.view.visible_tables().len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => move_selection(&mut self.table_list, count, -1),
            KeyCode::Down | KeyCode::Char('j') => move_selection(&mut self.table_list, count, 1),
            KeyCode::Char('/') => self.table_filter.activate(),
            KeyCode::Enter => {
                let selected = self
                    .table_list
                    .selected()
                    .and_then(|i| self.view.visible_tables().get(i).map(|t| t.to_string()));
                if let Some(table) = selected {
                    self.open_table(&table);
                }
            }
            _ => {}
        }
    }

    fn handle_data_key(&mut self, key: KeyEvent) {
        let rows = self.view.rows().len();
        let columns = self.view.columns().len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => move_table_selection(&mut self.table_state, rows, -1),
            KeyCode::Down | KeyCode::Char('j') => move_table_selection(&mut self.table_state, rows, 1),
            KeyCode::Left | KeyCode::Char('h') => {
                self.selected_column = self.selected_column.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.selected_column + 1 < columns {
                    self.selected_column += 1;
                }
            }
            KeyCode::PageUp | KeyCode::Char('p') => {
                let navigation = self.view.navigate(-1);
                self.navigate(navigation);
            }
            KeyCode::PageDown | KeyCode::Char('n') => {
                let navigation = self.view.navigate(1);
                self.navigate(navigation);
            }
            KeyCode::Home | KeyCode::Char('g') => {
                let navigation = self.view.go_to_page(1);
                self.navigate(navigation);
            }
            KeyCode::End | KeyCode::Char('G') => {
                if let Some(last) = self.view.pagination().map(|p| p.last_page()) {
                    let navigation = self.view.go_to_page(last);
                    self.navigate(navigation);
                }
            }
            KeyCode::Char('s') => {
                if let Some(column) = self.view.columns().get(self.selected_column).map(|c| c.name.clone()) {
                    let request = self.view.sort_by(&column);
                    self.dispatch_optional(request);
                }
            }
            KeyCode::Char('c') => {
                if let Some(column) = self.view.columns().get(self.selected_column).map(|c| c.name.clone()) {
                    let request = self.view.toggle_search_column(&column);
                    self.dispatch_optional(request);
                }
            }
            KeyCode::Char('a') => {
                if !self.view.state().search_scope.is_all() {
                    let request = self.view.set_search_scope(SearchScope::All);
                    self.dispatch_optional(request);
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let request = self.view.cycle_page_size(1);
                self.dispatch_optional(request);
            }
            KeyCode::Char('-') => {
                let request = self.view.cycle_page_size(-1);
                self.dispatch_optional(request);
            }
            _ => {}
        }
    }

    // --- drawing ---

    fn draw(&mut self, f: &mut Frame) {
        let size = f.area();

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(32), Constraint::Min(20)])
            .split(size);

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(40), // Databases
                Constraint::Length(3),      // Table filter
                Constraint::Min(3),         // Tables
            ])
            .split(columns[0]);

        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search input
                Constraint::Min(5),    // Data table
                Constraint::Length(3), // Pagination and status
                Constraint::Length(1), // Help line
            ])
            .split(columns[1]);

        self.draw_databases(f, sidebar[0]);
        self.table_filter.render(f, sidebar[1], false, "tables");
        self.draw_tables(f, sidebar[2]);

        let render = self.view.render();
        let scope = render.search_scope.to_string();
        self.search.render(f, main[0], self.view.search_pending(), &scope);
        self.draw_data(f, main[1], &render);
        self.draw_status(f, main[2], &render);

        let help = Paragraph::new(self.help_line()).style(Style::default().fg(Color::DarkGray));
        f.render_widget(help, main[3]);

        if let Some(cell) = self.selected_cell(&render) {
            if let Some(tooltip) = &cell.tooltip {
                draw_cell_inspector(f, tooltip);
            }
        }
        if self.show_help {
            draw_help_overlay(f);
        }
        if self.show_logs {
            self.draw_log_overlay(f);
        }
    }

    fn focus_style(&self, focus: Focus) -> Style {
        if self.focus == focus && !self.search.is_active() && !self.table_filter.is_active() {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn draw_databases(&mut self, f: &mut Frame, area: Rect) {
        let current = self.view.state().database.clone();
        let items: Vec<ListItem> = self
            .view
            .databases()
            .iter()
            .map(|db| {
                let style = if current.as_ref().map(DatabaseId::as_str) == Some(db.filename.as_str()) {
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Green)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(db.display_name().to_string(), style),
                    Span::styled(format!(" ({})", db.table_count), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Databases")
                    .border_style(self.focus_style(Focus::Databases)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, area, &mut self.db_list);
    }

    fn draw_tables(&mut self, f: &mut Frame, area: Rect) {
        let current = self.view.state().table.clone();
        let items: Vec<ListItem> = self
            .view
            .visible_tables()
            .into_iter()
            .map(|name| {
                let style = if current.as_deref() == Some(name) {
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Green)
                } else {
                    Style::default()
                };
                ListItem::new(Span::styled(name.to_string(), style))
            })
            .collect();

        let title = format!("Tables ({})", self.view.tables().len());
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(self.focus_style(Focus::Tables)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, area, &mut self.table_list);
    }

    fn draw_data(&mut self, f: &mut Frame, area: Rect, render: &TableRender) {
        let mut title = render.table.clone().unwrap_or_else(|| "Data".to_string());
        match render.phase {
            LoadPhase::Loading => title.push_str(" (loading...)"),
            LoadPhase::Failed => title.push_str(" (last load failed)"),
            LoadPhase::Idle | LoadPhase::Loaded => {}
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(self.focus_style(Focus::Data));

        if render.table.is_none() {
            let welcome = Paragraph::new("Select a database and a table to browse its data.")
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(welcome, area);
            return;
        }
        if let Some(placeholder) = &render.placeholder {
            let empty = Paragraph::new(placeholder.as_str())
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(empty, area);
            return;
        }

        // Horizontal scroll keeps the selected column on screen
        let widths = column_widths(render);
        let available = area.width.saturating_sub(2) as usize;
        let first = first_visible_column(&widths, self.selected_column, available);
        let visible: Vec<usize> = (first..widths.len()).collect();

        let header = Row::new(visible.iter().map(|&i| {
            let h = &render.headers[i];
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            if i == self.selected_column {
                style = style.fg(Color::Yellow);
            }
            if render.search_scope.contains(&h.name) {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Cell::from(format!("{}{}", h.name, h.sort_marker())).style(style)
        }));

        let rows = render.rows.iter().map(|row| {
            Row::new(visible.iter().map(|&i| {
                let cell = &row[i];
                Cell::from(cell.text.clone()).style(cell_style(cell.kind))
            }))
        });

        let constraints: Vec<Constraint> = visible
            .iter()
            .map(|&i| Constraint::Length(widths[i] as u16))
            .collect();

        let table = Table::new(rows, constraints)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .column_spacing(1);
        f.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_status(&self, f: &mut Frame, area: Rect, render: &TableRender) {
        let mut spans: Vec<Span> = Vec::new();

        if let Some(range) = &render.range_text {
            spans.push(Span::raw(range.clone()));
            spans.push(Span::raw("  "));
        }
        if let Some(strip) = &render.strip {
            let arrow = |enabled: bool, text: &'static str| {
                Span::styled(
                    text,
                    if enabled {
                        Style::default()
                    } else {
                        Style::default().fg(Color::DarkGray)
                    },
                )
            };
            spans.push(arrow(strip.has_previous, "◀ "));
            for item in &strip.items {
                match item {
                    PageItem::Page { number, current: true } => spans.push(Span::styled(
                        format!("[{}] ", number),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )),
                    PageItem::Page { number, .. } => spans.push(Span::raw(format!("{} ", number))),
                    PageItem::Ellipsis => spans.push(Span::raw("… ")),
                }
            }
            spans.push(arrow(strip.has_next, "▶"));
            spans.push(Span::raw(format!("  {}/page", self.view.state().page_size)));
        }

        if let Some((notice, _)) = &self.notice {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(notice.to_string(), Style::default().fg(color)));
        }

        let status = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn help_line(&self) -> String {
        if self.search.is_active() {
            return "Search: Enter: Apply now | Esc: Clear | Tab: Back to data | Type to search...".to_string();
        }
        if self.table_filter.is_active() {
            return "Filter tables: Enter/Tab: Done | Esc: Clear".to_string();
        }
        match self.focus {
            Focus::Databases => "Databases: ↑↓: Move | Enter: Open | Tab: Next pane | ?: Help | q: Quit".to_string(),
            Focus::Tables => "Tables: ↑↓: Move | Enter: Open | /: Filter | Tab: Next pane | ?: Help".to_string(),
            Focus::Data => {
                "Data: ↑↓←→: Move | s: Sort | c: Scope | n/p: Page | +/-: Page size | Ctrl+F: Search | Ctrl+E: Export"
                    .to_string()
            }
        }
    }

    fn selected_cell<'a>(&self, render: &'a TableRender) -> Option<&'a RenderedCell> {
        if self.focus != Focus::Data {
            return None;
        }
        let row = self.table_state.selected()?;
        render.rows.get(row)?.get(self.selected_column)
    }

    fn draw_log_overlay(&self, f: &mut Frame) {
        let area = centered_rect(80, 70, f.area());
        let lines: Vec<Line> = match &self.log_buffer {
            Some(buffer) => buffer
                .get_recent(area.height.saturating_sub(2) as usize)
                .into_iter()
                .map(|entry| {
                    let color = match entry.level.as_str() {
                        "ERROR" => Color::Red,
                        "WARN" => Color::Yellow,
                        "INFO" => Color::Green,
                        _ => Color::Gray,
                    };
                    Line::from(Span::styled(entry.format_for_display(), Style::default().fg(color)))
                })
                .collect(),
            None => vec![Line::from("Logging to stderr")],
        };

        let logs = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Logs (F12/Esc to close)"))
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(logs, area);
    }
}

fn move_selection(state: &mut ListState, count: usize, step: i32) {
    if count == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0) as i64;
    let next = (current + i64::from(step)).clamp(0, count as i64 - 1);
    state.select(Some(next as usize));
}

fn move_table_selection(state: &mut TableState, count: usize, step: i32) {
    if count == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0) as i64;
    let next = (current + i64::from(step)).clamp(0, count as i64 - 1);
    state.select(Some(next as usize));
}

fn cell_style(kind: CellKind) -> Style {
    match kind {
        CellKind::Null => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        CellKind::Number => Style::default().fg(Color::Cyan),
        CellKind::Date | CellKind::DateTime => Style::default().fg(Color::Magenta),
        CellKind::Boolean(true) => Style::default().fg(Color::Green),
        CellKind::Boolean(false) => Style::default().fg(Color::Red),
        CellKind::Url | CellKind::Email => Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        CellKind::LongText | CellKind::Text => Style::default(),
    }
}

/// Widest of header and cell texts per column, capped
fn column_widths(render: &TableRender) -> Vec<usize> {
    render
        .headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let header_width = header.name.chars().count() + header.sort_marker().chars().count();
            let cell_width = render
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.text.chars().count())
                .max()
                .unwrap_or(0);
            header_width.max(cell_width).clamp(3, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Leftmost column to draw so that `selected` still fits in `available`
fn first_visible_column(widths: &[usize], selected: usize, available: usize) -> usize {
    let selected = selected.min(widths.len().saturating_sub(1));
    let mut first = 0;
    while first < selected {
        let used: usize = widths[first..=selected].iter().map(|w| w + 1).sum();
        if used <= available {
            break;
        }
        first += 1;
    }
    first
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Full value of a long cell in the bottom right corner
fn draw_cell_inspector(f: &mut Frame, value: &str) {
    let size = f.area();
    let width = 50.min(size.width / 2);
    let height = 6.min(size.height / 4);
    let area = Rect {
        x: size.width.saturating_sub(width + 1),
        y: size.height.saturating_sub(height + 5),
        width,
        height,
    };

    let inspector = Paragraph::new(value.to_string())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Cell Value")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(inspector, area);
}

const HELP_TEXT: &str = "\
Keyboard shortcuts

  Ctrl+F        Focus search
  Esc           Clear search
  Ctrl+← / →    Previous / next page
  Ctrl+E        Export table as CSV
  Ctrl+R        Refresh
  ? / F1        This help
  F12           Log viewer
  Tab           Next pane
  Ctrl+Q        Quit

Data pane

  ↑↓ ←→         Move row / column
  s             Sort by column (again to reverse)
  c             Add/remove column from search scope
  a             Search all columns
  n / p         Next / previous page
  g / G         First / last page
  + / -         Larger / smaller pages";

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());
    let help = Paragraph::new(HELP_TEXT).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Help (Esc to close)")
            .style(Style::default().fg(Color::White)),
    );
    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

/// Set up the terminal, run the app, and always restore the terminal
/// Run `setup`; if it fails, run `restore` before handing the error back
fn setup_or_restore<T>(
    setup: impl FnOnce() -> io::Result<T>,
    restore: impl FnOnce(),
) -> io::Result<T> {
    setup().inspect_err(|_| restore())
}

fn restore_terminal() {
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen);
}

pub fn run_tui(mut app: DbViewTui, database: Option<DatabaseId>) -> Result<()> {
    crossterm::terminal::enable_raw_mode().context("Failed to enable raw mode")?;
    let mut terminal = setup_or_restore(
        || {
            let mut stdout = io::stdout();
            crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
            Terminal::new(ratatui::backend::CrosstermBackend::new(stdout))
        },
        restore_terminal,
    )
    .context("Failed to set up terminal")?;

    app.start(database);
    let result = app.run(&mut terminal);

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Some(buffer) = &app.log_buffer {
        match AppPaths::log_file() {
            Ok(path) => {
                if let Err(err) = buffer.dump_to(&path) {
                    eprintln!("Could not write log file {}: {}", path.display(), err);
                }
            }
            Err(err) => eprintln!("Could not determine log file location: {}", err),
        }
    }

    result.context("TUI event loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ColumnDescriptor, DatabaseInfo, PaginationSummary, Row};
    use crate::view::QueryParams;
    use serde_json::json;

    struct StaticSource;

    impl TableSource for StaticSource {
        fn list_databases(&self) -> Result<DatabaseListing, ApiError> {
            Ok(DatabaseListing {
                databases: vec![DatabaseInfo {
                    filename: "20240101_shop.sqlite".to_string(),
                    original_name: "shop.sqlite".to_string(),
                    table_count: 1,
                    file_size: 2048,
                    modified_time: None,
                }],
                admin_enabled: false,
            })
        }

        fn list_tables(&self, _database: &DatabaseId) -> Result<Vec<String>, ApiError> {
            Ok(vec!["Orders".to_string()])
        }

        fn fetch_page(
            &self,
            _database: &DatabaseId,
            _table: &str,
            params: &QueryParams,
        ) -> Result<TablePage, ApiError> {
            let mut row = Row::new();
            row.insert("Total".to_string(), json!("12.5"));
            Ok(TablePage {
                rows: vec![row],
                columns: vec![ColumnDescriptor::new("Total", "REAL")],
                pagination: PaginationSummary {
                    page: params.page,
                    per_page: params.per_page,
                    total: 1,
                    total_pages: 1,
                    filtered: Some(1),
                },
            })
        }
    }

    fn app() -> DbViewTui {
        let dir = std::env::temp_dir();
        DbViewTui::new(
            Arc::new(StaticSource),
            TableViewController::default(),
            CsvExporter::new(dir, 100),
            None,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    /// Wait for worker results and apply them
    fn pump(app: &mut DbViewTui, expected: usize) {
        for _ in 0..expected {
            let message = app.rx.recv_timeout(Duration::from_secs(5)).unwrap();
            app.apply_message(message);
        }
    }

    #[test]
    fn test_quit_keys() {
        let mut tui = app();
        assert!(tui.handle_key_event(ctrl(KeyCode::Char('q'))));
        assert!(tui.should_quit);

        let mut tui = app();
        assert!(tui.handle_key_event(key(KeyCode::Char('q'))));
    }

    #[test]
    fn test_typing_q_in_search_does_not_quit() {
        let mut tui = app();
        tui.handle_key_event(ctrl(KeyCode::Char('f')));
        assert!(!tui.handle_key_event(key(KeyCode::Char('q'))));
        assert_eq!(tui.search.value(), "q");
        assert!(tui.view.search_pending());
    }

    #[test]
    fn test_help_overlay_toggles() {
        let mut tui = app();
        tui.handle_key_event(key(KeyCode::Char('?')));
        assert!(tui.show_help);
        tui.handle_key_event(key(KeyCode::Esc));
        assert!(!tui.show_help);
    }

    #[test]
    fn test_navigation_without_table_is_ignored() {
        let mut tui = app();
        tui.handle_key_event(ctrl(KeyCode::Right));
        assert!(tui.notice.is_none());
    }

    #[test]
    fn test_export_without_table_shows_notice() {
        let mut tui = app();
        tui.handle_key_event(ctrl(KeyCode::Char('e')));
        assert_eq!(tui.notice.as_ref().map(|(n, _)| n.message.as_str()), Some("Select a table first"));
    }

    #[test]
    fn test_open_table_end_to_end() {
        let mut tui = app();
        tui.start(None);
        pump(&mut tui, 1);
        assert_eq!(tui.view.databases().len(), 1);

        tui.handle_key_event(key(KeyCode::Enter));
        pump(&mut tui, 1);
        assert_eq!(tui.view.tables(), &["Orders".to_string()]);
        assert_eq!(tui.focus, Focus::Tables);

        tui.handle_key_event(key(KeyCode::Enter));
        assert_eq!(tui.view.phase(), LoadPhase::Loading);
        pump(&mut tui, 1);
        assert_eq!(tui.view.phase(), LoadPhase::Loaded);
        assert_eq!(tui.focus, Focus::Data);

        tui.handle_key_event(key(KeyCode::Char('n')));
        match &tui.notice {
            Some((notice, _)) => assert_eq!(notice.message, "Already on the last page (1)"),
            None => panic!("expected a navigation notice"),
        }
    }

    #[test]
    fn test_failed_setup_restores_terminal() {
        let mut restored = false;
        let result: io::Result<()> = setup_or_restore(
            || Err(io::Error::new(io::ErrorKind::Other, "no tty")),
            || restored = true,
        );
        assert!(result.is_err());
        assert!(restored);

        let mut restored = false;
        let value = setup_or_restore(|| Ok(7), || restored = true).unwrap();
        assert_eq!(value, 7);
        assert!(!restored);
    }

    #[test]
    fn test_first_visible_column() {
        let widths = [10, 10, 10, 10];
        assert_eq!(first_visible_column(&widths, 0, 25), 0);
        assert_eq!(first_visible_column(&widths, 1, 25), 0);
        assert_eq!(first_visible_column(&widths, 3, 25), 2);
    }
}
