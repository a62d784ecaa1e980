//! Error kinds surfaced to the operator.
//!
//! Target-resolution failures exit with code 2, identifier and RPC failures
//! with code 1; best-effort paths (doctor, dashboard refresh, bulk fan-out)
//! swallow individual errors instead of propagating them.

use std::path::PathBuf;

/// All failure modes the CLI can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem target does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),
    /// Directory target has none of the recognized entry files.
    #[error("no entrypoint found under '{0}'. Try a file, or add __main__.py / main.py / app.py")]
    NoEntrypoint(PathBuf),
    /// Exact-shape unit name is not present in the registry.
    #[error("unit not found: {0}")]
    UnitNotFound(String),
    /// Numeric or friendly-name identifier matched zero live services.
    #[error("no unit matches '{0}'")]
    NoMatch(String),
    /// Friendly-name identifier matched two or more services.
    #[error("ambiguous name '{name}': matches {}", candidates.join(", "))]
    AmbiguousName {
        name: String,
        candidates: Vec<String>,
    },
    /// Underlying service-manager call failed.
    #[error("service manager call failed: {0}")]
    Rpc(String),
    /// journalctl / uvx / systemd-run binary unavailable.
    #[error("external tool not found: {0}")]
    ToolMissing(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this failure, per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_) | Error::NoEntrypoint(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
