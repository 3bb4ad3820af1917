//! # Evochess
//!
//! Evolves chess-playing agents whose decision function is an inspectable
//! symbolic program rather than a neural network.
//!
//! Every agent carries two expression trees, a *board program* that scores a
//! single square in context and a *movement program* that scores or accepts
//! a candidate move after a hypothetical play, plus a bank of persistent
//! integer memory cells. A tournament runner pits agents against each other
//! in full games, awards fitness, selects survivors, and produces the next
//! generation by mutation.
//!
//! It provides:
//! - The tree model with random synthesis, walking and mutation ([`token`],
//!   [`mutation`])
//! - A tree-walking interpreter over a chess turn context ([`interpreter`],
//!   [`variables`])
//! - A per-turn move search under a hard wall-clock budget ([`search`],
//!   [`match_runner`])
//! - Tournament logic via the
//!   [`TournamentStrategy`](tournament_strategy::TournamentStrategy) trait
//!   and the generational loop ([`evolution`])
//!
//! The rules of chess come from the `chess` crate, wrapped by a thin adapter
//! ([`board`]) that adds last-move metadata and draw tracking.
//!
//! # Usage Example
//!
//! Run a small evolution and print the champions:
//!
//! ```no_run
//! use std::time::Duration;
//! use evochess::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Limit each turn so stuck searches cannot stall a tournament.
//!     let constraints = ConstraintsBuilder::new()
//!         .with_turn_timeout(Duration::from_millis(250))
//!         .with_max_plies(200)
//!         .build()?;
//!
//!     let config = Configuration::new().with_seed(42);
//!     let mut evolver = Evolver::new(config, constraints);
//!
//!     // 8 agents, 10 generations, 2 shuffled-pair rounds per tournament.
//!     let report = evolver.run(8, 10, 2)?;
//!     for summary in &report.generations {
//!         println!(
//!             "generation {}: agent-{} scored {}",
//!             summary.generation, summary.champion, summary.score
//!         );
//!     }
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;

pub mod agent;
pub mod board;
pub mod configuration;
pub mod constraints;
pub mod evolution;
pub mod interpreter;
mod logger;
pub mod match_runner;
pub mod mutation;
pub mod persistence;
pub mod search;
pub mod token;
pub mod tournament_scheduler;
pub mod tournament_strategy;
pub mod variables;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use evochess::prelude::*;
/// ```
///
/// Includes:
/// - [`Configuration`](crate::configuration::Configuration)
/// - [`ConstraintsBuilder`](crate::constraints::ConstraintsBuilder)
/// - [`Evolver`](crate::evolution::Evolver)
/// - [`Agent`](crate::agent::Agent)
/// - all built-in [`tournament strategies`](crate::tournament_strategy)
pub mod prelude {
    pub use crate::agent::Agent;
    pub use crate::configuration::Configuration;
    pub use crate::constraints::ConstraintsBuilder;
    pub use crate::evolution::{migrate, EvolutionReport, Evolver};
    pub use crate::tournament_strategy::*;
}
