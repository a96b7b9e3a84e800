//! AliasRelay Storage - Database abstraction
//!
//! This crate provides the PostgreSQL-backed alias store and
//! routing log used by the AliasRelay router.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
