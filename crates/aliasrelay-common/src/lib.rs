//! AliasRelay Common - Shared types and configuration
//!
//! This crate provides the configuration, error types and routing
//! vocabulary shared across all AliasRelay components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{RouteKind, RouteResult};
