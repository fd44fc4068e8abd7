//! Search box for the table pane
//!
//! Only edits text. Debouncing lives in the view's query state; the
//! widget is told whether a commit is pending so it can show it.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

/// Result of handling a key in the search box
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchInputAction {
    /// Key consumed, text unchanged
    Continue,
    /// Text changed; schedule a debounced search
    Changed(String),
    /// Enter: search right away and leave the box
    Confirm(String),
    /// Esc: text cleared and the box left
    Clear,
    /// Tab: leave the box, keep the text
    Leave,
    /// Not ours; let the parent handle it
    PassThrough,
}

pub struct SearchInput {
    input: Input,
    title: String,
    style: Style,
    active: bool,
}

impl Default for SearchInput {
    fn default() -> Self {
        Self::new("Search")
    }
}

impl SearchInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            title: title.into(),
            style: Style::default().fg(Color::Yellow),
            active: false,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn set_value(&mut self, value: String) {
        self.input = Input::default().with_value(value);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> SearchInputAction {
        if !self.active {
            return SearchInputAction::PassThrough;
        }

        match key.code {
            KeyCode::Esc => {
                self.input.reset();
                self.deactivate();
                SearchInputAction::Clear
            }
            KeyCode::Enter => {
                self.deactivate();
                SearchInputAction::Confirm(self.input.value().to_string())
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.deactivate();
                SearchInputAction::Leave
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                SearchInputAction::PassThrough
            }
            _ => {
                let before = self.input.value().to_string();
                self.input.handle_event(&Event::Key(key));
                if self.input.value() != before {
                    SearchInputAction::Changed(self.input.value().to_string())
                } else {
                    SearchInputAction::Continue
                }
            }
        }
    }

    /// `pending` adds the typing indicator while a debounced commit waits
    pub fn render(&self, f: &mut Frame, area: Rect, pending: bool, scope_label: &str) {
        let mut title = format!("{} [{}]", self.title, scope_label);
        if pending {
            title.push_str(" (typing...)");
        }

        let border_style = if self.active {
            self.style
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style);

        let widget = Paragraph::new(self.input.value()).block(block).style(self.style);
        f.render_widget(widget, area);

        if self.active {
            let x = area.x + (self.input.cursor() as u16).min(area.width.saturating_sub(3)) + 1;
            f.set_cursor_position((x, area.y + 1));
        }
    }
}
