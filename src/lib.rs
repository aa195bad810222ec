//! Zions Bank connector
//!
//! Library crate exposing all modules for use by integration tests
//! and the sync binary.

pub mod config;
pub mod types;
pub mod parse;
pub mod browser;
pub mod session;
pub mod institutions;
