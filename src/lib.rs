pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod service;

pub use config::AppConfig;
pub use error::{ContextError, FetchError, ParseError, ReconcileError, SubmissionError};
pub use service::SessionStore;
