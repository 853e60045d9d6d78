//! pagelens library
//!
//! Exposes the CLI, configuration and the file-backed page source for
//! integration testing.

pub mod cli;
pub mod config;
pub mod page_source;

pub use config::{Config, ConfigError};
pub use page_source::FilePage;
