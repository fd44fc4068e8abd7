//! UI widgets for the TUI application

pub mod search_input;
