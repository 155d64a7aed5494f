pub mod config;
pub mod database_ops;
pub mod error;
pub mod legacy;
pub mod models;
pub mod normalization;
pub mod orchestrator;
pub mod tracing;

pub mod util {
    pub mod env;
    pub mod progress;
}

pub use error::{EtlError, EtlResult};
pub use orchestrator::{MigrationDriver, MigrationReport};
