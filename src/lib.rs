pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod sink;
pub mod table;

// Layered boundaries for application ports and infrastructure adapters
pub mod app;
pub mod infra;
