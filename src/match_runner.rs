//! Runs a single game between two agents.
//!
//! Colors are assigned by a coin flip on entry. Each side keeps its own
//! [`TurnContext`] across the game, so scan totals and memory writes carry
//! from turn to turn. Every terminal state, the adapter reporting the game
//! over, a per-turn timeout, a program fault or a failure to pick a move,
//! resolves to a final score vector; nothing propagates past this module.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use chess::Color;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{instrument, trace, warn};

use crate::agent::Agent;
use crate::board::BoardState;
use crate::constraints::Constraints;
use crate::search::{take_turn, SearchLimits, TurnContext, TurnFailure};

/// Fitness awarded for playing any move.
const TURN_PLAYED: i64 = 1;
/// Fitness for capturing, and the opponent's share.
const CAPTURE: (i64, i64) = (2, -1);
/// Fitness for giving check, and the opponent's share.
const CHECK: (i64, i64) = (3, -1);
/// Fitness for delivering checkmate, and the mated side's share.
const CHECKMATE: (i64, i64) = (50, -10);
/// Fitness for forcing a draw, and the opponent's share.
const DRAW: (i64, i64) = (5, -1);
/// Penalty for a timeout, a fault or a failure to pick a move.
const FAILURE_PENALTY: i64 = -20;

/// The two participants of one game, in seating order.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// The paired agents. Which one plays white is decided inside the match.
    pub ordered_player: Vec<Arc<Agent>>,
}

impl Display for MatchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self
            .ordered_player
            .iter()
            .fold(String::new(), |acu, agent| {
                if acu.is_empty() {
                    format!("agent-{}", agent.id)
                } else {
                    format!("{acu} VS agent-{}", agent.id)
                }
            });
        write!(f, "[{s}]")
    }
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The given color delivered mate.
    Checkmate(Color),
    /// Stalemate, repetition or fifty quiet moves.
    Draw,
    /// The given color ran out of its turn budget.
    Timeout(Color),
    /// The given color found no move to play.
    NoMove(Color),
    /// A program of the given color faulted.
    Fault(Color),
    /// The safety cap on game length fired.
    PlyLimit,
}

/// Final state of a finished game.
#[derive(Debug, Clone)]
pub struct RunnerResult {
    /// Accumulated fitness per agent, the white player first.
    pub results: Vec<(Arc<Agent>, i64)>,
    /// Number of halfmoves played.
    pub plies: u32,
    /// Terminal event.
    pub outcome: MatchOutcome,
}

/// Plays one game and returns the fitness vector.
///
/// `seed` drives the color assignment, so a caller that fixes it fixes the
/// seating.
#[instrument(skip_all, fields(game = settings.to_string()))]
pub fn run_match(settings: &MatchSettings, constraints: &Constraints, seed: u64) -> RunnerResult {
    assert!(
        settings.ordered_player.len() == 2,
        "chess wants exactly two players"
    );
    let mut rng = StdRng::seed_from_u64(seed);

    // Seat index by color: by_color[0] plays white.
    let mut by_color = [0usize, 1usize];
    if rng.random_bool(0.5) {
        by_color.swap(0, 1);
    }
    trace!(white = settings.ordered_player[by_color[0]].id, "game started");

    let white = &settings.ordered_player[by_color[0]];
    let black = &settings.ordered_player[by_color[1]];
    let mut contexts = [
        TurnContext::new(white, Color::White),
        TurnContext::new(black, Color::Black),
    ];
    let mut scores = [0i64; 2];

    let mut board = BoardState::initial();
    let mut plies = 0;
    let mut outcome = MatchOutcome::PlyLimit;

    while !board.is_game_over() && plies < constraints.max_plies {
        let (mover, opponent) = match board.side_to_move() {
            Color::White => (0, 1),
            Color::Black => (1, 0),
        };
        let limits = SearchLimits {
            deadline: Instant::now() + constraints.turn_timeout,
            max_depth: constraints.max_search_depth,
        };
        let color = board.side_to_move();

        let selected = match take_turn(&board, &contexts[mover], &limits) {
            Ok((ctx, selected)) => {
                contexts[mover] = ctx;
                selected
            }
            Err(TurnFailure::Timeout) => {
                scores[mover] += FAILURE_PENALTY;
                outcome = MatchOutcome::Timeout(color);
                break;
            }
            Err(TurnFailure::Fault(e)) => {
                warn!("agent-{} faulted: {e:#}", settings.ordered_player[by_color[mover]].id);
                scores[mover] += FAILURE_PENALTY;
                outcome = MatchOutcome::Fault(color);
                break;
            }
        };
        let Some(selected) = selected else {
            scores[mover] += FAILURE_PENALTY;
            outcome = MatchOutcome::NoMove(color);
            break;
        };

        let after = board.apply(&selected.mv);
        plies += 1;

        scores[mover] += TURN_PLAYED;
        if selected.mv.capture {
            scores[mover] += CAPTURE.0;
            scores[opponent] += CAPTURE.1;
        }
        if after.is_checkmate() {
            scores[mover] += CHECKMATE.0;
            scores[opponent] += CHECKMATE.1;
            outcome = MatchOutcome::Checkmate(color);
        } else if after.is_draw() {
            scores[mover] += DRAW.0;
            scores[opponent] += DRAW.1;
            outcome = MatchOutcome::Draw;
        } else if after.in_check() {
            scores[mover] += CHECK.0;
            scores[opponent] += CHECK.1;
        }

        board = after;
    }

    trace!(?outcome, plies, "game over");

    let results = vec![
        (settings.ordered_player[by_color[0]].clone(), scores[0]),
        (settings.ordered_player[by_color[1]].clone(), scores[1]),
    ];
    RunnerResult {
        results,
        plies,
        outcome,
    }
}

#[cfg(test)]
mod match_runner_tests {
    use super::*;
    use crate::agent::Agent;
    use crate::constraints::ConstraintsBuilder;
    use crate::token::{Algorithm, Token};
    use crate::variables::{ProgramKind, VariableId};
    use std::time::Duration;

    // An agent whose movement program reads a constant, so turns resolve
    // without recursion.
    fn quick_agent(seed: u64) -> Arc<Agent> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut agent = Agent::random(&mut rng);
        agent.memory.set_static(0, 1).unwrap();
        agent.movement_program = Algorithm {
            kind: ProgramKind::Movement,
            root: Token::Variable(VariableId::Custom(0)),
        };
        agent
            .board_program
            .verify_variables()
            .expect("random board program is well formed");
        Arc::new(agent)
    }

    fn settings(a: Arc<Agent>, b: Arc<Agent>) -> MatchSettings {
        MatchSettings {
            ordered_player: vec![a, b],
        }
    }

    #[test]
    fn a_game_always_yields_a_score_per_player() {
        let constraints = ConstraintsBuilder::new()
            .with_turn_timeout(Duration::from_millis(200))
            .with_max_plies(30)
            .build()
            .unwrap();
        let result = run_match(&settings(quick_agent(41), quick_agent(42)), &constraints, 7);
        assert_eq!(result.results.len(), 2);
        assert!(result.plies <= 30);
    }

    #[test]
    fn color_assignment_follows_the_seed() {
        let constraints = ConstraintsBuilder::new()
            .with_turn_timeout(Duration::from_millis(200))
            .with_max_plies(2)
            .build()
            .unwrap();
        let a = quick_agent(43);
        let b = quick_agent(44);
        let one = run_match(&settings(a.clone(), b.clone()), &constraints, 0);
        let two = run_match(&settings(a, b), &constraints, 0);
        // Same seed, same seating, same outcome.
        assert_eq!(one.results[0].0.id, two.results[0].0.id);
        assert_eq!(one.outcome, two.outcome);
    }

    #[test]
    fn an_instant_deadline_charges_the_side_to_move() {
        let constraints = ConstraintsBuilder::new()
            .with_turn_timeout(Duration::ZERO)
            .build()
            .unwrap();
        let result = run_match(&settings(quick_agent(45), quick_agent(46)), &constraints, 3);
        assert!(matches!(result.outcome, MatchOutcome::Timeout(Color::White)));
        assert_eq!(result.plies, 0);
        // Exactly one side was charged, the other left untouched.
        let mut scores: Vec<i64> = result.results.iter().map(|(_, s)| *s).collect();
        scores.sort();
        assert_eq!(scores, vec![FAILURE_PENALTY, 0]);
    }

    #[test]
    fn every_played_turn_is_worth_at_least_one_point() {
        let constraints = ConstraintsBuilder::new()
            .with_turn_timeout(Duration::from_millis(200))
            .with_max_plies(8)
            .build()
            .unwrap();
        let result = run_match(&settings(quick_agent(47), quick_agent(48)), &constraints, 11);
        if result.outcome == MatchOutcome::PlyLimit {
            // 8 plies, 4 turns each; captures and checks only add on top of
            // the turn point, checks subtract at most one per opposing turn.
            let total: i64 = result.results.iter().map(|(_, s)| *s).sum();
            assert!(total >= 0, "turn points cannot sum negative: {total}");
        }
    }
}
