//! SQLite persistence for completed matches.
//!
//! This module provides:
//! - Database initialization and schema setup
//! - SQLite pragma configuration
//! - The `Repository` that implements `MatchStore`

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{RepoError, Repository};
