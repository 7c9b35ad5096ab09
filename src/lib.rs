pub mod aggregate;
pub mod config;
pub mod constants;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod plot;
pub mod storage;
pub mod types;

// Ports and their adapters
pub mod app;
pub mod infra;
