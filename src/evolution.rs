//! The generational loop.
//!
//! This module defines the [`Evolver`] type, which orchestrates evolution.
//! Its responsibilities include:
//!
//! - Seeding a population of random agents
//! - Running tournaments under a [`TournamentStrategy`], games in parallel
//! - Selecting the surviving agent and breeding the next generation
//! - Optionally replacing the population tail with migrated agents
//!
//! Matches run on worker threads, one per scheduled game, and report over a
//! channel; the population itself is only ever touched between tournaments,
//! on the coordinating thread.

use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, instrument, trace};

use crate::agent::Agent;
use crate::configuration::Configuration;
use crate::constraints::Constraints;
use crate::logger::init_logger;
use crate::match_runner::{run_match, MatchSettings, RunnerResult};
use crate::mutation::evolve;
use crate::tournament_scheduler::TournamentScheduler;
use crate::tournament_strategy::{ShuffledPairsTournament, TournamentStrategy};

/// The champion of one generation.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    /// Zero-based generation index.
    pub generation: usize,
    /// Identity of the winning agent.
    pub champion: u64,
    /// Its tournament fitness.
    pub score: i64,
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct EvolutionReport {
    /// One summary per generation, in order.
    pub generations: Vec<GenerationSummary>,
    /// The final population, the last champion first.
    pub population: Vec<Arc<Agent>>,
}

/// The main type for evolving agents.
///
/// Owns the master RNG; every stochastic decision (population seeding,
/// pairing, color flips, mutation) flows from it, so a fixed seed in the
/// [`Configuration`] fixes the whole run.
pub struct Evolver {
    config: Configuration,
    constraints: Constraints,
    rng: StdRng,
}

impl Evolver {
    /// Create an [`Evolver`] with the given behavior and limits.
    #[instrument(skip_all)]
    pub fn new(config: Configuration, constraints: Constraints) -> Evolver {
        if config.is_logging_enabled() {
            let dir = config.log_dir.clone().expect("logging enabled implies a directory");
            init_logger(&dir);
        }
        trace!(?config, ?constraints);

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Evolver {
            config,
            constraints,
            rng,
        }
    }

    /// A population of fresh random agents.
    pub fn seed_population(&mut self, size: usize) -> Vec<Arc<Agent>> {
        (0..size)
            .map(|_| Arc::new(Agent::random(&mut self.rng)))
            .collect()
    }

    /// Runs `generations` rounds of tournament-select-breed over a fresh
    /// population of `population_size` agents, `rounds_per_generation`
    /// shuffled-pair rounds each.
    ///
    /// # Errors
    /// Fails on an odd or too-small population, or if a match worker dies.
    pub fn run(
        &mut self,
        population_size: usize,
        generations: usize,
        rounds_per_generation: usize,
    ) -> Result<EvolutionReport> {
        ensure!(
            population_size >= 2 && population_size % 2 == 0,
            "population size must be even and at least 2, got {population_size}"
        );

        let mut population = self.seed_population(population_size);
        let mut summaries = Vec::with_capacity(generations);

        for generation in 0..generations {
            let strategy =
                ShuffledPairsTournament::seeded(rounds_per_generation, self.rng.random());
            let ranked = self.run_tournament(&population, strategy)?;
            let (champion, score) = ranked.first().expect("a tournament ranks someone").clone();
            info!(generation, champion = champion.id, score, "generation done");
            if self.config.verbose {
                println!(
                    "generation {generation}: champion agent-{} with fitness {score}",
                    champion.id
                );
            }
            summaries.push(GenerationSummary {
                generation,
                champion: champion.id,
                score,
            });
            population = self.next_generation(&ranked);
        }

        Ok(EvolutionReport {
            generations: summaries,
            population,
        })
    }

    /// Plays a full tournament and returns the population ranked by
    /// fitness, ties broken toward the most recent arrival.
    pub fn run_tournament<T: TournamentStrategy>(
        &mut self,
        population: &[Arc<Agent>],
        mut strategy: T,
    ) -> Result<Vec<(Arc<Agent>, i64)>> {
        strategy.add_agents(population.to_vec());
        let mut scheduler =
            TournamentScheduler::new(self.constraints.max_parallel_games, strategy);
        let (tx_result, rx_result) = mpsc::channel();

        for settings in scheduler.advance() {
            self.launch_match(settings, tx_result.clone());
        }
        while !scheduler.is_finished() {
            // not finished <=> a game is running <=> a result will arrive
            let result = rx_result
                .recv()
                .context("a match worker died without reporting")?;
            for settings in scheduler.on_result(result) {
                self.launch_match(settings, tx_result.clone());
            }
        }

        Ok(rank(scheduler.final_scores()))
    }

    /// Breeds the next population from a ranking: the unchanged survivor
    /// plus mutated offspring, topped up with fresh randoms if mutation
    /// cannot produce enough distinct genomes.
    pub fn next_generation(&mut self, ranked: &[(Arc<Agent>, i64)]) -> Vec<Arc<Agent>> {
        let size = ranked.len();
        let survivor = ranked.first().expect("ranking is never empty").0.clone();
        trace!(survivor = survivor.id, "breeding next generation");

        // The brood's leading parent copy makes way for the survivor itself.
        let brood = evolve(&mut self.rng, &survivor, size);
        let mut population: Vec<Arc<Agent>> = Vec::with_capacity(size);
        population.push(survivor);
        population.extend(brood.into_iter().skip(1).map(Arc::new));
        while population.len() < size {
            population.push(Arc::new(Agent::random(&mut self.rng)));
        }
        population
    }

    fn launch_match(&mut self, settings: MatchSettings, tx_result: Sender<RunnerResult>) {
        let constraints = self.constraints.clone();
        let seed = self.rng.random();
        let verbose = self.config.verbose;
        std::thread::spawn(move || {
            let result = run_match(&settings, &constraints, seed);
            if verbose {
                let scores = result
                    .results
                    .iter()
                    .map(|(agent, score)| format!("agent-{} {score}", agent.id))
                    .collect::<Vec<_>>()
                    .join(" / ");
                println!("{settings}: {scores} ({:?}, {} plies)", result.outcome, result.plies);
            }
            // The coordinator hanging up just means the tournament is over.
            let _ = tx_result.send(result);
        });
    }
}

/// Replaces the population tail with imported agents.
///
/// Imports keep their programs and memory verbatim; their dynamic memory is
/// zeroed on arrival. At most the whole population is replaced.
pub fn migrate(population: &mut Vec<Arc<Agent>>, imports: Vec<Agent>) {
    let count = imports.len().min(population.len());
    let start = population.len() - count;
    info!(count, "migrating agents into the population tail");
    for (slot, mut import) in population[start..].iter_mut().zip(imports) {
        import.memory.zero_dynamic();
        *slot = Arc::new(import);
    }
}

fn rank(scores: HashMap<Arc<Agent>, i64>) -> Vec<(Arc<Agent>, i64)> {
    let mut ranked: Vec<_> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.id.cmp(&a.0.id)));
    ranked
}

#[cfg(test)]
mod evolution_tests {
    use super::*;

    #[test]
    fn ranking_prefers_score_then_recency() {
        let mut rng = StdRng::seed_from_u64(81);
        let old = Arc::new(Agent::random(&mut rng));
        let new = Arc::new(Agent::random(&mut rng));
        let third = Arc::new(Agent::random(&mut rng));

        let mut scores = HashMap::new();
        scores.insert(old.clone(), 10);
        scores.insert(new.clone(), 10);
        scores.insert(third.clone(), 3);
        let ranked = rank(scores);
        // Equal scores: the more recent (larger) id wins the tie.
        assert_eq!(ranked[0].0.id, new.id);
        assert_eq!(ranked[1].0.id, old.id);
        assert_eq!(ranked[2].0.id, third.id);
    }

    #[test]
    fn next_generation_keeps_the_survivor_and_the_size() {
        let config = Configuration::new().with_verbose(false).with_seed(5);
        let constraints = crate::constraints::ConstraintsBuilder::new().build().unwrap();
        let mut evolver = Evolver::new(config, constraints);

        let population = evolver.seed_population(6);
        let ranked: Vec<(Arc<Agent>, i64)> = population
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), -(i as i64)))
            .collect();
        let next = evolver.next_generation(&ranked);
        assert_eq!(next.len(), 6);
        // The survivor carries over by identity, not by copy.
        assert_eq!(next[0].id, ranked[0].0.id);
        for child in &next[1..] {
            assert!(child.memory.dynamic_is_zero());
            assert_ne!(child.id, ranked[0].0.id);
        }
    }

    #[test]
    fn migration_replaces_the_tail_with_zeroed_dynamics() {
        let mut rng = StdRng::seed_from_u64(82);
        let mut population: Vec<Arc<Agent>> = (0..4)
            .map(|_| Arc::new(Agent::random(&mut rng)))
            .collect();
        let head = population[0].id;

        let mut import = Agent::random(&mut rng);
        import
            .memory
            .write_dynamic(crate::agent::STATIC_CELLS, 9)
            .unwrap();
        let import_id = import.id;
        migrate(&mut population, vec![import]);

        assert_eq!(population.len(), 4);
        assert_eq!(population[0].id, head);
        assert_eq!(population[3].id, import_id);
        assert!(population[3].memory.dynamic_is_zero());
    }
}
