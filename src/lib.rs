pub mod config;
pub mod mid;
pub mod models;
pub mod server;
pub mod service;
pub mod session;
pub mod setup;
pub mod telemetry;
