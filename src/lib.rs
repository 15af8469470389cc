//! eli: terminal companion backed by a hosted language model.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod agent;
pub mod cli;
pub mod config;
pub mod context;
pub mod logs;
pub mod models;
pub mod persona;
pub mod session;
pub mod utils;

/// Return the eli home directory.
///
/// Resolution order:
/// 1. `ELI_HOME` environment variable
/// 2. `$HOME/.eli`
pub fn eli_home() -> std::path::PathBuf {
    if let Ok(p) = std::env::var("ELI_HOME") {
        std::path::PathBuf::from(p)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".eli")
    }
}
