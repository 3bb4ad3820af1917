//! Feeds a tournament strategy into a bounded pool of running games.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use tracing::trace;

use crate::agent::Agent;
use crate::match_runner::{MatchSettings, RunnerResult};
use crate::tournament_strategy::{GameScores, TournamentStrategy};

/// Tracks pending and running games of one tournament, asking the strategy
/// for the next round whenever the current one drains, and never handing out
/// more concurrent games than the slot budget allows.
pub struct TournamentScheduler<T: TournamentStrategy> {
    scores: Vec<GameScores>,
    pending: Vec<Vec<Arc<Agent>>>,
    strategy: T,
    max_parallel: usize,
    running: usize,
    is_finished: bool,
}

impl<T: TournamentStrategy> TournamentScheduler<T> {
    /// A scheduler running at most `max_parallel` games at once.
    pub fn new(max_parallel: usize, strategy: T) -> Self {
        TournamentScheduler {
            scores: vec![],
            pending: vec![],
            strategy,
            max_parallel: max_parallel.max(1),
            running: 0,
            is_finished: false,
        }
    }

    /// Returns the games to launch now. Empty when every slot is taken or
    /// the tournament is over.
    pub fn advance(&mut self) -> Vec<MatchSettings> {
        // A new round starts only once the previous one fully drains, so a
        // strategy always sees a complete round of results.
        if self.running == 0 && self.pending.is_empty() && !self.is_finished {
            trace!("next round");
            self.pending = self.strategy.advance_round(mem::take(&mut self.scores));
            if self.pending.is_empty() {
                trace!("no more games");
                self.is_finished = true;
            }
        }

        let free = self.max_parallel - self.running;
        let take = free.min(self.pending.len());
        let matches: Vec<MatchSettings> = self
            .pending
            .drain(..take)
            .map(|ordered_player| MatchSettings { ordered_player })
            .collect();
        self.running += matches.len();
        matches
    }

    /// Records a finished game and returns the next games to launch.
    pub fn on_result(&mut self, result: RunnerResult) -> Vec<MatchSettings> {
        self.scores.push(result.results);
        self.running -= 1;
        self.advance()
    }

    /// True once every game ran and the strategy wants no more.
    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    /// Final fitness per agent.
    pub fn final_scores(&self) -> HashMap<Arc<Agent>, i64> {
        self.strategy.final_scores()
    }
}

#[cfg(test)]
mod scheduler_tests {
    use super::*;
    use crate::match_runner::MatchOutcome;
    use crate::tournament_strategy::RoundRobinTournament;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fake_result(settings: &MatchSettings) -> RunnerResult {
        RunnerResult {
            results: settings
                .ordered_player
                .iter()
                .map(|a| (a.clone(), 1))
                .collect(),
            plies: 0,
            outcome: MatchOutcome::Draw,
        }
    }

    #[test]
    fn slots_cap_concurrency_and_the_round_completes() {
        let mut rng = StdRng::seed_from_u64(71);
        let agents: Vec<Arc<Agent>> = (0..4)
            .map(|_| Arc::new(crate::agent::Agent::random(&mut rng)))
            .collect();
        let mut strategy = RoundRobinTournament::new();
        strategy.add_agents(agents.clone());
        let mut scheduler = TournamentScheduler::new(3, strategy);

        let mut in_flight = scheduler.advance();
        assert_eq!(in_flight.len(), 3);
        let mut completed = 0;
        while !scheduler.is_finished() {
            let settings = in_flight.pop().expect("running games while unfinished");
            completed += 1;
            in_flight.extend(scheduler.on_result(fake_result(&settings)));
            assert!(in_flight.len() <= 3);
        }
        // 4 agents, all ordered pairs.
        assert_eq!(completed, 12);
        // Every agent collected one point per game played.
        for score in scheduler.final_scores().values() {
            assert_eq!(*score, 6);
        }
    }
}
