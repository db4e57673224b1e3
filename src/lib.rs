pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod resolver;
pub mod types;

// Ports (what the core needs) and their adapters (how it is provided)
pub mod app;
pub mod infra;

pub use error::{Result, ScraperError};
pub use pipeline::{Pipeline, RunFailure, RunOptions, RunSummary};
