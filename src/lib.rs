// ABOUTME: Library root for stevedore - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod envfile;
pub mod error;
pub mod output;
pub mod shell;
pub mod ssh;
pub mod types;
