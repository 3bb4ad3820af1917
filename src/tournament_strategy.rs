//! Tournament strategies used to schedule games between agents.
//!
//! This module defines the [`TournamentStrategy`] trait and the built-in
//! strategies the evolution loop and evaluation runs use to structure a
//! tournament and aggregate fitness.
//!
//! # Provided Strategies
//! - [`ShuffledPairsTournament`]: shuffles the population into pairs each
//!   round. This is what the generational loop runs.
//! - [`RoundRobinTournament`]: every agent meets every other agent with both
//!   color assignments. Thorough and slow; meant for small populations.
//!
//! # Implementing a Custom Strategy
//! The scheduler calls `add_agents`, then repeatedly `advance_round` with
//! the results gathered so far, until it returns an empty list. Fitness is
//! cumulative: a game's score vector is summed into each participant's
//! total.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::agent::Agent;

/// Per-game score vector, one entry per participant.
pub type GameScores = Vec<(Arc<Agent>, i64)>;

/// How agents are grouped into games and how their results aggregate.
pub trait TournamentStrategy {
    /// Adds the population. Must be called before advancing rounds.
    fn add_agents(&mut self, agents: Vec<Arc<Agent>>);

    /// Consumes the previous round's results and returns the next round's
    /// matchups. An empty list means the tournament is finished.
    fn advance_round(&mut self, results: Vec<GameScores>) -> Vec<Vec<Arc<Agent>>>;

    /// Number of players per game. Every matchup list has this length.
    fn players_per_match(&self) -> usize;

    /// Total fitness per agent once the tournament is over.
    fn final_scores(&self) -> HashMap<Arc<Agent>, i64>;
}

/// Pairs a shuffled population, every agent playing one game per round.
pub struct ShuffledPairsTournament {
    agents: Vec<Arc<Agent>>,
    scores: HashMap<Arc<Agent>, i64>,
    rounds: usize,
    played_rounds: usize,
    rng: StdRng,
}

impl ShuffledPairsTournament {
    /// A tournament of `rounds` shuffled-pair rounds with a random pairing
    /// order.
    pub fn new(rounds: usize) -> Self {
        Self::seeded(rounds, rand::random())
    }

    /// Like [`new`](Self::new) with a fixed pairing seed, for reproducible
    /// runs.
    pub fn seeded(rounds: usize, seed: u64) -> Self {
        assert!(rounds >= 1, "a tournament needs at least one round");
        ShuffledPairsTournament {
            agents: vec![],
            scores: HashMap::new(),
            rounds,
            played_rounds: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn apply_results(&mut self, results: Vec<GameScores>) {
        for game in results {
            for (agent, score) in game {
                *self.scores.entry(agent).or_default() += score;
            }
        }
    }
}

impl TournamentStrategy for ShuffledPairsTournament {
    fn add_agents(&mut self, agents: Vec<Arc<Agent>>) {
        for agent in &agents {
            self.scores.insert(agent.clone(), 0);
        }
        self.agents = agents;
    }

    fn advance_round(&mut self, results: Vec<GameScores>) -> Vec<Vec<Arc<Agent>>> {
        self.apply_results(results);
        if self.played_rounds >= self.rounds {
            return vec![];
        }
        self.played_rounds += 1;

        let mut order = self.agents.clone();
        order.shuffle(&mut self.rng);
        if order.len() % 2 != 0 {
            // The odd one out sits this round out.
            let benched = order.pop().expect("odd length implies non-empty");
            warn!("agent-{} sits out this round", benched.id);
        }
        order.chunks(2).map(|pair| pair.to_vec()).collect()
    }

    fn players_per_match(&self) -> usize {
        2
    }

    fn final_scores(&self) -> HashMap<Arc<Agent>, i64> {
        self.scores.clone()
    }
}

/// Every agent plays every other agent, once with each color assignment.
pub struct RoundRobinTournament {
    agents: Vec<Arc<Agent>>,
    scores: HashMap<Arc<Agent>, i64>,
    started: bool,
}

impl RoundRobinTournament {
    /// A full round-robin over the population.
    pub fn new() -> Self {
        RoundRobinTournament {
            agents: vec![],
            scores: HashMap::new(),
            started: false,
        }
    }
}

impl Default for RoundRobinTournament {
    fn default() -> Self {
        Self::new()
    }
}

impl TournamentStrategy for RoundRobinTournament {
    fn add_agents(&mut self, agents: Vec<Arc<Agent>>) {
        for agent in &agents {
            self.scores.insert(agent.clone(), 0);
        }
        self.agents = agents;
    }

    fn advance_round(&mut self, results: Vec<GameScores>) -> Vec<Vec<Arc<Agent>>> {
        for game in results {
            for (agent, score) in game {
                *self.scores.entry(agent).or_default() += score;
            }
        }

        if self.started {
            // The single all-pairs round already ran.
            return vec![];
        }
        self.started = true;

        let n = self.agents.len();
        let mut pending = vec![];
        for i in 0..n {
            for j in (i + 1)..n {
                // Both seatings, since the color flip favors one seat.
                pending.push(vec![self.agents[i].clone(), self.agents[j].clone()]);
                pending.push(vec![self.agents[j].clone(), self.agents[i].clone()]);
            }
        }
        info!(games = pending.len(), "round robin scheduled");
        pending
    }

    fn players_per_match(&self) -> usize {
        2
    }

    fn final_scores(&self) -> HashMap<Arc<Agent>, i64> {
        self.scores.clone()
    }
}
