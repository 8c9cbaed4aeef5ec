//! Configuration module for rankeval
//!
//! This module defines the retrieval parameters, application configuration
//! and path resolution helpers.

pub mod app_config;
pub mod path_resolver;
mod retrieval_config;

pub use app_config::AppConfig;
pub use retrieval_config::RetrievalConfig;
