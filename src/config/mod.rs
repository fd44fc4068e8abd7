//! Configuration module
//!
//! Settings file loading and the commented default template.

pub mod config;

pub use config::Config;
