//! Defines execution limits for games and tournaments.
//!
//! The main entry point is the [`ConstraintsBuilder`] struct, which uses a
//! builder pattern to configure limits:
//!
//! - **Timing**: the hard wall-clock budget of a single turn, search
//!   recursion included.
//! - **Search**: the depth at which zero-scored candidates stop recursing.
//! - **Concurrency**: how many games a tournament runs at once.
//! - **Game length**: a safety cap on halfmoves per game.
//!
//! Once built, a [`Constraints`] object is passed to the evolver and from
//! there to every match runner.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use evochess::constraints::ConstraintsBuilder;
//!
//! let constraints = ConstraintsBuilder::new()
//!     .with_turn_timeout(Duration::from_millis(250))
//!     .with_max_parallel_games(4)
//!     .with_max_plies(200)
//!     .build()
//!     .unwrap();
//! ```
//!
//! Constraints may also be read from environment variables using
//! [`ConstraintsBuilder::from_env()`] for runtime configurability.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::search::MAX_SEARCH_DEPTH;

/// Default per-turn wall-clock budget.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default cap on halfmoves per game.
pub const DEFAULT_MAX_PLIES: u32 = 300;

/// Execution limits applied to every game of a tournament.
#[derive(Debug, Clone)]
pub struct Constraints {
    /// Hard wall-clock budget of one turn.
    pub turn_timeout: Duration,
    /// Depth at which the move search stops recursing.
    pub max_search_depth: u32,
    /// Number of games run concurrently.
    pub max_parallel_games: usize,
    /// Safety cap on halfmoves per game.
    pub max_plies: u32,
}

/// A builder for [`Constraints`].
///
/// Defaults: a one second turn budget, the full search depth, one game per
/// available CPU, and a 300-halfmove game cap.
#[derive(Debug)]
pub struct ConstraintsBuilder {
    turn_timeout: Duration,
    max_search_depth: u32,
    max_parallel_games: Option<usize>,
    max_plies: u32,
}

impl ConstraintsBuilder {
    /// A builder holding the default limits.
    pub fn new() -> Self {
        ConstraintsBuilder {
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            max_search_depth: MAX_SEARCH_DEPTH,
            max_parallel_games: None,
            max_plies: DEFAULT_MAX_PLIES,
        }
    }

    /// A builder initialized from environment variables.
    ///
    /// Recognized variables, all optional:
    /// - `EVO_TURN_TIMEOUT_MS` — per-turn budget in milliseconds
    /// - `EVO_MAX_SEARCH_DEPTH` — search recursion cap
    /// - `EVO_MAX_PARALLEL_GAMES` — concurrent games
    /// - `EVO_MAX_PLIES` — halfmove cap per game
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        fn get_env_number<T: std::str::FromStr>(var: &str) -> Option<T> {
            let raw = env::var(var).ok()?;
            match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring unparseable {var}='{raw}'");
                    None
                }
            }
        }

        let mut builder = Self::new();
        if let Some(ms) = get_env_number::<u64>("EVO_TURN_TIMEOUT_MS") {
            builder.turn_timeout = Duration::from_millis(ms);
        }
        if let Some(depth) = get_env_number::<u32>("EVO_MAX_SEARCH_DEPTH") {
            builder.max_search_depth = depth;
        }
        if let Some(games) = get_env_number::<usize>("EVO_MAX_PARALLEL_GAMES") {
            builder.max_parallel_games = Some(games);
        }
        if let Some(plies) = get_env_number::<u32>("EVO_MAX_PLIES") {
            builder.max_plies = plies;
        }
        builder
    }

    /// Set the hard wall-clock budget of one turn.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Set the depth at which the move search stops recursing.
    pub fn with_max_search_depth(mut self, depth: u32) -> Self {
        self.max_search_depth = depth;
        self
    }

    /// Set the number of games run concurrently.
    pub fn with_max_parallel_games(mut self, games: usize) -> Self {
        self.max_parallel_games = Some(games);
        self
    }

    /// Set the safety cap on halfmoves per game.
    pub fn with_max_plies(mut self, plies: u32) -> Self {
        self.max_plies = plies;
        self
    }

    /// Validates the limits and builds the [`Constraints`].
    ///
    /// # Errors
    /// Fails on a zero game cap, a search depth beyond the supported
    /// recursion bound, or an explicit zero for parallel games.
    pub fn build(self) -> Result<Constraints> {
        if self.max_search_depth > MAX_SEARCH_DEPTH {
            bail!(
                "search depth {} exceeds the supported bound {MAX_SEARCH_DEPTH}",
                self.max_search_depth
            );
        }
        if self.max_plies == 0 {
            bail!("a game needs a non-zero ply cap");
        }
        if self.max_parallel_games == Some(0) {
            bail!("at least one game must be allowed to run");
        }
        let max_parallel_games = match self.max_parallel_games {
            Some(games) => games,
            None => std::thread::available_parallelism()
                .context("could not determine available parallelism")?
                .get(),
        };
        Ok(Constraints {
            turn_timeout: self.turn_timeout,
            max_search_depth: self.max_search_depth,
            max_parallel_games,
            max_plies: self.max_plies,
        })
    }
}

impl Default for ConstraintsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
