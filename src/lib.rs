pub mod api;
pub mod api_client;
pub mod config;
pub mod data_exporter;
pub mod datasource_trait;
pub mod debouncer;
pub mod html_renderer;
pub mod logging;
pub mod notice;
pub mod table_display;
pub mod tui_app;
pub mod utils;
pub mod view;
pub mod widgets;
