pub mod browser;
pub mod capture;
pub mod chrome;
pub mod classify;
pub mod config;
pub mod dedup;
mod error;
pub mod fetch;
pub mod models;
pub mod page;
pub mod paths;
pub mod session;
pub mod stats;

pub use error::{EngineError, FetchError, Result};
