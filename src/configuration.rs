//! Config for the evolver behaviors
//!
//! This module provides configuration options for controlling the behavior
//! of the evolution loop. Configuration can be created programmatically
//! using [`Configuration::new()`] or by reading environment variables using
//! [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional and case-insensitive. Set a flag to `"true"` to
//! enable it.
//!
//! - `EVO_VERBOSE` — Print per-generation progress to stdout (default: `true`)
//! - `EVO_LOG_DIR` — Enable file logging into a directory (must be a valid directory path)
//! - `EVO_SEED` — Fix the master RNG seed for reproducible runs

use std::path::{Path, PathBuf};

/// Configuration for evolver behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) seed: Option<u64>,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Per-generation progress is printed to stdout.
    /// - File logging is disabled (no log directory set).
    /// - The master RNG is seeded from the operating system.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log_dir: None,
            seed: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Recognizes `EVO_VERBOSE`, `EVO_LOG_DIR` and `EVO_SEED`; any other
    /// value (including unset) falls back to the default.
    pub fn from_env() -> Self {
        let verbose = match std::env::var("EVO_VERBOSE") {
            Ok(val) => val.eq_ignore_ascii_case("true"),
            Err(_) => true,
        };
        let log_dir = std::env::var("EVO_LOG_DIR")
            .ok()
            .map(PathBuf::from)
            .filter(|p| p.is_dir());
        let seed = std::env::var("EVO_SEED").ok().and_then(|s| s.parse().ok());

        Self {
            verbose,
            log_dir,
            seed,
        }
    }

    /// Enable or disable progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable file logging into the given directory.
    ///
    /// # Panics
    ///
    /// Panics if the path exists and is not a directory, or cannot be
    /// created.
    pub fn with_log<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            std::fs::create_dir(path)
                .unwrap_or_else(|e| panic!("Could not create directory {}: {e}", path.display()));
        }
        if !path.is_dir() {
            panic!("Logging path must be a valid directory: {}", path.display());
        }

        self.log_dir = Some(path.to_path_buf());
        self
    }

    /// Fix the master RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns true if logging is enabled (i.e., a log directory is set).
    pub(crate) fn is_logging_enabled(&self) -> bool {
        self.log_dir.is_some()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
