pub mod app;
pub mod config;
pub mod infra;
pub mod observability;
pub mod server;
