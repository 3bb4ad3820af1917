//! Per-turn move selection.
//!
//! A turn runs the board program over all 64 squares of the current position
//! (the pre-move scan), then for every legal move over the hypothetical
//! position after it (the post-move scan), and finally asks the movement
//! program to score the candidate. A movement score of zero is a request to
//! look deeper: the whole procedure recurses on the hypothetical position,
//! playing both sides with the same agent, until the depth cap.
//!
//! The wall clock is the hard bound. It is polled in exactly two places, at
//! the top of the legal-move loop and on entry to a recursive turn; tree
//! evaluation itself is never interrupted.

use std::time::Instant;

use chess::{Color, Square, ALL_SQUARES};

use crate::agent::{Agent, MemoryBank};
use crate::board::{BoardState, MoveInfo};
use crate::interpreter::evaluate;
use crate::token::Token;
use crate::variables::ProgramKind;

/// Maximum recursion depth of the move search.
pub const MAX_SEARCH_DEPTH: u32 = 30;

/// The canonical square the movement program is evaluated at.
pub fn movement_square() -> Square {
    ALL_SQUARES[0] // a1
}

/// Limits a single turn runs under.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    /// Hard wall-clock bound for the whole turn, recursion included.
    pub deadline: Instant,
    /// Depth at which zero-scored candidates stop recursing.
    pub max_depth: u32,
}

/// Running totals a movement program can read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOutputs {
    /// Pre-move scan total of this color's first turn.
    pub first_pre: i64,
    /// Post-move scan total of this color's first turn.
    pub first_post: i64,
    /// Pre-move scan total of the previous turn.
    pub prev_pre: i64,
    /// Post-move scan total of the previous turn.
    pub prev_post: i64,
    /// Pre-move scan total of the current turn.
    pub this_pre: i64,
    /// Post-move scan total of the current turn so far.
    pub this_post: i64,
}

impl TurnOutputs {
    // Entering a new turn: the current totals become the previous ones.
    fn shifted(self) -> Self {
        TurnOutputs {
            first_pre: self.first_pre,
            first_post: self.first_post,
            prev_pre: self.this_pre,
            prev_post: self.this_post,
            this_pre: 0,
            this_post: 0,
        }
    }
}

/// The per-turn evaluation bundle: the agent's programs, a working copy of
/// its memory, the color it plays, the search depth and the scan totals.
#[derive(Debug, Clone)]
pub struct TurnContext<'a> {
    /// The board program of the evaluating agent.
    pub board_program: &'a Token,
    /// The movement program of the evaluating agent.
    pub movement_program: &'a Token,
    /// Working memory. Writes land here and nowhere else.
    pub memory: MemoryBank,
    /// The color this context evaluates for.
    pub color: Color,
    /// Turn counter for this color, counting real turns and search recursion
    /// alike. Zero until the first turn begins.
    pub depth: u32,
    /// The running scan totals.
    pub outputs: TurnOutputs,
}

impl<'a> TurnContext<'a> {
    /// A fresh context for `agent` playing `color`, with zeroed dynamic
    /// memory, zero depth and zero totals.
    pub fn new(agent: &'a Agent, color: Color) -> Self {
        let mut memory = agent.memory.clone();
        memory.zero_dynamic();
        TurnContext {
            board_program: &agent.board_program.root,
            movement_program: &agent.movement_program.root,
            memory,
            color,
            depth: 0,
            outputs: TurnOutputs::default(),
        }
    }

    // The context a new turn starts from: one level deeper, current totals
    // shifted into the previous slots.
    fn next_turn(&self) -> Self {
        let mut ctx = self.clone();
        ctx.depth += 1;
        ctx.outputs = ctx.outputs.shifted();
        ctx
    }

    // The context a hypothetical position is scanned under: same depth and
    // totals, opposite color, its own memory copy so writes cannot leak
    // across sibling candidates.
    fn hypothetical(&self) -> Self {
        let mut ctx = self.clone();
        ctx.color = !ctx.color;
        ctx
    }
}

/// Why a turn produced no move.
#[derive(Debug)]
pub enum TurnFailure {
    /// The wall-clock budget elapsed.
    Timeout,
    /// A program or the adapter faulted.
    Fault(anyhow::Error),
}

impl From<anyhow::Error> for TurnFailure {
    fn from(e: anyhow::Error) -> Self {
        TurnFailure::Fault(e)
    }
}

/// A candidate move together with the score that selected it.
#[derive(Debug, Clone)]
pub struct SelectedMove {
    /// The chosen move.
    pub mv: MoveInfo,
    /// Its movement score, or the sub-score a deeper search returned.
    pub score: i64,
}

/// Runs one turn from `board` for the side `prev` plays.
///
/// Returns the advanced context (its scan totals and memory writes carry to
/// the next turn) and the selected move, or `None` when the position offers
/// no legal move.
pub fn take_turn<'a>(
    board: &BoardState,
    prev: &TurnContext<'a>,
    limits: &SearchLimits,
) -> Result<(TurnContext<'a>, Option<SelectedMove>), TurnFailure> {
    if Instant::now() >= limits.deadline {
        return Err(TurnFailure::Timeout);
    }

    let mut ctx = prev.next_turn();
    scan(board, &mut ctx, Phase::Pre)?;

    let mut best: Option<SelectedMove> = None;
    for candidate in board.legal_moves() {
        if Instant::now() >= limits.deadline {
            return Err(TurnFailure::Timeout);
        }

        let after = board.apply(candidate);
        let mut hypo = ctx.hypothetical();
        scan(&after, &mut hypo, Phase::Post)?;
        // The post totals are running totals across candidates; carry them
        // back into the turn context. Memory writes stay behind.
        ctx.outputs.this_post = hypo.outputs.this_post;
        ctx.outputs.first_post = hypo.outputs.first_post;

        let movement_program = hypo.movement_program;
        let m = evaluate(
            movement_program,
            ProgramKind::Movement,
            movement_square(),
            &after,
            &mut hypo,
        )?;

        // Zero asks for a deeper look; any other value is the score, even a
        // negative one.
        let score = if m == 0 && ctx.depth < limits.max_depth {
            match take_turn(&after, &hypo, limits)? {
                (_, Some(sub)) => sub.score,
                (_, None) => m,
            }
        } else {
            m
        };

        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(SelectedMove {
                mv: candidate.clone(),
                score,
            });
        }
    }

    Ok((ctx, best))
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Pre,
    Post,
}

// One board-program pass over all squares in a fixed order, accumulated
// into the matching totals. The first turn of a color additionally seeds
// the first-iteration totals.
fn scan(board: &BoardState, ctx: &mut TurnContext<'_>, phase: Phase) -> Result<(), TurnFailure> {
    let board_program = ctx.board_program;
    for square in ALL_SQUARES {
        let value = evaluate(board_program, ProgramKind::Board, square, board, ctx)?;
        let first = ctx.depth == 1;
        match phase {
            Phase::Pre => {
                ctx.outputs.this_pre = ctx.outputs.this_pre.saturating_add(value);
                if first {
                    ctx.outputs.first_pre = ctx.outputs.first_pre.saturating_add(value);
                }
            }
            Phase::Post => {
                ctx.outputs.this_post = ctx.outputs.this_post.saturating_add(value);
                if first {
                    ctx.outputs.first_post = ctx.outputs.first_post.saturating_add(value);
                }
            }
        }
    }
    Ok(())
}
