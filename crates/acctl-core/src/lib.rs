pub mod adapter;
pub mod config;
pub mod error;
pub mod exec;
pub mod io;
pub mod license;
pub mod orchestrator;
pub mod person;
pub mod provision;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod types;

pub use error::{AcctlError, Result};
