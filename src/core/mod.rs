pub mod types;
pub mod reports;
pub mod database;
pub mod config;
pub mod error;
pub mod observability;
pub mod stats;
