//! Variables readable by agent programs.
//!
//! A program leaf names either a *provided* variable, whose value is derived
//! from the chess position or the turn context, or a *custom* variable, which
//! reads one of the agent's memory cells. Each program kind sees its own
//! subset of the provided set:
//!
//! - board programs see the per-square predicates and move counts,
//! - movement programs see the search depth and the iteration totals,
//! - the game-outcome predicates and the custom cells are visible to both.
//!
//! Asking for a variable outside the running program's subset is a fault of
//! the program itself, not of the position; it aborts the evaluation.

use anyhow::{bail, Context, Result};
use chess::{Piece, Square};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::MEMORY_CELLS;
use crate::board::{BoardState, CastleSide};
use crate::search::TurnContext;

/// Which of the two agent programs a tree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramKind {
    /// Scores one square of a position.
    Board,
    /// Scores or accepts a candidate move after a hypothetical play.
    Movement,
}

impl ProgramKind {
    /// The provided variables a program of this kind may reference.
    pub fn allowed_variables(self) -> &'static [ProvidedVar] {
        match self {
            ProgramKind::Board => BOARD_VARIABLES,
            ProgramKind::Movement => MOVEMENT_VARIABLES,
        }
    }
}

/// A variable reference carried by a program leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableId {
    /// A variable derived from the position or the turn context.
    Provided(ProvidedVar),
    /// A memory cell of the owning agent.
    Custom(usize),
}

impl VariableId {
    /// Draws a uniform variable over the subset allowed for `program`,
    /// custom cells included.
    pub fn random<R: Rng>(rng: &mut R, program: ProgramKind) -> Self {
        let provided = program.allowed_variables();
        let pick = rng.random_range(0..provided.len() + MEMORY_CELLS);
        if pick < provided.len() {
            VariableId::Provided(provided[pick])
        } else {
            VariableId::Custom(pick - provided.len())
        }
    }

    /// True if this variable may appear in a program of the given kind.
    pub fn allowed_in(self, program: ProgramKind) -> bool {
        match self {
            VariableId::Custom(i) => i < MEMORY_CELLS,
            VariableId::Provided(var) => program.allowed_variables().contains(&var),
        }
    }
}

/// The fixed set of provided variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)] // the variants are their own documentation
pub enum ProvidedVar {
    // Square occupancy (board programs).
    IsSelf,
    IsOpponent,
    IsEmpty,
    IsPawn,
    IsKnight,
    IsBishop,
    IsRook,
    IsQueen,
    IsKing,
    // Game outcome predicates (both program kinds).
    IsInCheck,
    IsInCheckmate,
    IsDraw,
    // Last-move predicates (board programs).
    CastledKingSide,
    CastledQueenSide,
    WasCaptured,
    PawnWasCaptured,
    KnightWasCaptured,
    BishopWasCaptured,
    RookWasCaptured,
    QueenWasCaptured,
    // Legal-move counts (board programs).
    PossibleMoves,
    CanCapture,
    CanCapturePawn,
    CanCaptureKnight,
    CanCaptureBishop,
    CanCaptureRook,
    CanCaptureQueen,
    CanMoveHere,
    PawnCanMoveHere,
    KnightCanMoveHere,
    BishopCanMoveHere,
    RookCanMoveHere,
    QueenCanMoveHere,
    KingCanMoveHere,
    // Search state (movement programs).
    Depth,
    FirstIterationPreMoveTotal,
    FirstIterationPostMoveTotal,
    PrevIterationPreMoveTotal,
    PrevIterationPostMoveTotal,
    ThisIterationPreMoveTotal,
    ThisIterationPostMoveTotal,
}

/// Provided variables visible to board programs.
pub const BOARD_VARIABLES: &[ProvidedVar] = &[
    ProvidedVar::IsSelf,
    ProvidedVar::IsOpponent,
    ProvidedVar::IsEmpty,
    ProvidedVar::IsPawn,
    ProvidedVar::IsKnight,
    ProvidedVar::IsBishop,
    ProvidedVar::IsRook,
    ProvidedVar::IsQueen,
    ProvidedVar::IsKing,
    ProvidedVar::IsInCheck,
    ProvidedVar::IsInCheckmate,
    ProvidedVar::IsDraw,
    ProvidedVar::CastledKingSide,
    ProvidedVar::CastledQueenSide,
    ProvidedVar::WasCaptured,
    ProvidedVar::PawnWasCaptured,
    ProvidedVar::KnightWasCaptured,
    ProvidedVar::BishopWasCaptured,
    ProvidedVar::RookWasCaptured,
    ProvidedVar::QueenWasCaptured,
    ProvidedVar::PossibleMoves,
    ProvidedVar::CanCapture,
    ProvidedVar::CanCapturePawn,
    ProvidedVar::CanCaptureKnight,
    ProvidedVar::CanCaptureBishop,
    ProvidedVar::CanCaptureRook,
    ProvidedVar::CanCaptureQueen,
    ProvidedVar::CanMoveHere,
    ProvidedVar::PawnCanMoveHere,
    ProvidedVar::KnightCanMoveHere,
    ProvidedVar::BishopCanMoveHere,
    ProvidedVar::RookCanMoveHere,
    ProvidedVar::QueenCanMoveHere,
    ProvidedVar::KingCanMoveHere,
];

/// Provided variables visible to movement programs.
pub const MOVEMENT_VARIABLES: &[ProvidedVar] = &[
    ProvidedVar::IsInCheck,
    ProvidedVar::IsInCheckmate,
    ProvidedVar::IsDraw,
    ProvidedVar::Depth,
    ProvidedVar::FirstIterationPreMoveTotal,
    ProvidedVar::FirstIterationPostMoveTotal,
    ProvidedVar::PrevIterationPreMoveTotal,
    ProvidedVar::PrevIterationPostMoveTotal,
    ProvidedVar::ThisIterationPreMoveTotal,
    ProvidedVar::ThisIterationPostMoveTotal,
];

/// Resolves `id` against `square`, the position and the turn context.
///
/// Pure in everything it reads: the same position, memory, color, depth and
/// outputs always produce the same value.
pub fn variable_value(
    id: VariableId,
    program: ProgramKind,
    square: Square,
    board: &BoardState,
    ctx: &TurnContext<'_>,
) -> Result<i64> {
    if !id.allowed_in(program) {
        bail!("variable {id:?} is not allowed in a {program:?} program");
    }
    let var = match id {
        VariableId::Custom(i) => {
            let value = ctx
                .memory
                .get(i)
                .with_context(|| format!("memory cell {i} out of range"))?;
            return Ok(i64::from(value));
        }
        VariableId::Provided(var) => var,
    };

    use ProvidedVar::*;
    let value = match var {
        IsSelf => flag(board.color_on(square) == Some(ctx.color)),
        IsOpponent => flag(board.color_on(square) == Some(!ctx.color)),
        IsEmpty => flag(board.piece_on(square).is_none()),
        IsPawn => occupied_by(board, square, Piece::Pawn),
        IsKnight => occupied_by(board, square, Piece::Knight),
        IsBishop => occupied_by(board, square, Piece::Bishop),
        IsRook => occupied_by(board, square, Piece::Rook),
        IsQueen => occupied_by(board, square, Piece::Queen),
        IsKing => occupied_by(board, square, Piece::King),

        IsInCheck => flag(board.in_check()),
        IsInCheckmate => flag(board.is_checkmate()),
        IsDraw => flag(board.is_draw()),

        CastledKingSide => castled(board, square, CastleSide::King),
        CastledQueenSide => castled(board, square, CastleSide::Queen),

        WasCaptured => captured_here(board, square, None),
        PawnWasCaptured => captured_here(board, square, Some(Piece::Pawn)),
        KnightWasCaptured => captured_here(board, square, Some(Piece::Knight)),
        BishopWasCaptured => captured_here(board, square, Some(Piece::Bishop)),
        RookWasCaptured => captured_here(board, square, Some(Piece::Rook)),
        QueenWasCaptured => captured_here(board, square, Some(Piece::Queen)),

        PossibleMoves => count_moves(board, |m| m.source() == square),
        CanCapture => count_moves(board, |m| m.source() == square && m.capture),
        CanCapturePawn => can_capture_kind(board, square, Piece::Pawn),
        CanCaptureKnight => can_capture_kind(board, square, Piece::Knight),
        CanCaptureBishop => can_capture_kind(board, square, Piece::Bishop),
        CanCaptureRook => can_capture_kind(board, square, Piece::Rook),
        CanCaptureQueen => can_capture_kind(board, square, Piece::Queen),
        CanMoveHere => count_moves(board, |m| m.dest() == square),
        PawnCanMoveHere => can_move_here_kind(board, square, Piece::Pawn),
        KnightCanMoveHere => can_move_here_kind(board, square, Piece::Knight),
        BishopCanMoveHere => can_move_here_kind(board, square, Piece::Bishop),
        RookCanMoveHere => can_move_here_kind(board, square, Piece::Rook),
        QueenCanMoveHere => can_move_here_kind(board, square, Piece::Queen),
        KingCanMoveHere => can_move_here_kind(board, square, Piece::King),

        Depth => i64::from(ctx.depth),
        FirstIterationPreMoveTotal => ctx.outputs.first_pre,
        FirstIterationPostMoveTotal => ctx.outputs.first_post,
        PrevIterationPreMoveTotal => ctx.outputs.prev_pre,
        PrevIterationPostMoveTotal => ctx.outputs.prev_post,
        ThisIterationPreMoveTotal => ctx.outputs.this_pre,
        ThisIterationPostMoveTotal => ctx.outputs.this_post,
    };
    Ok(value)
}

fn flag(b: bool) -> i64 {
    i64::from(b)
}

fn occupied_by(board: &BoardState, square: Square, piece: Piece) -> i64 {
    flag(board.piece_on(square) == Some(piece))
}

fn castled(board: &BoardState, square: Square, side: CastleSide) -> i64 {
    flag(matches!(
        board.last_move(),
        Some(last) if last.castle == Some(side) && last.to == square
    ))
}

// The capture square is the move's destination, also for en passant.
fn captured_here(board: &BoardState, square: Square, kind: Option<Piece>) -> i64 {
    flag(matches!(
        board.last_move(),
        Some(last) if last.to == square
            && last.captured.is_some()
            && kind.map_or(true, |k| last.captured == Some(k))
    ))
}

fn count_moves<F: Fn(&crate::board::MoveInfo) -> bool>(board: &BoardState, pred: F) -> i64 {
    board.legal_moves().iter().filter(|m| pred(m)).count() as i64
}

fn can_capture_kind(board: &BoardState, square: Square, kind: Piece) -> i64 {
    count_moves(board, |m| {
        m.source() == square && m.capture_kind == Some(kind)
    })
}

fn can_move_here_kind(board: &BoardState, square: Square, kind: Piece) -> i64 {
    count_moves(board, |m| m.dest() == square && m.piece == kind)
}

#[cfg(test)]
mod variable_tests {
    use super::*;
    use crate::agent::Agent;
    use crate::search::TurnContext;
    use chess::{Color, File, Rank, ALL_SQUARES};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sq(name: &str) -> Square {
        let b = name.as_bytes();
        Square::make_square(
            Rank::from_index((b[1] - b'1') as usize),
            File::from_index((b[0] - b'a') as usize),
        )
    }

    fn test_context(agent: &Agent, color: Color) -> TurnContext<'_> {
        TurnContext::new(agent, color)
    }

    #[test]
    fn is_king_fires_on_exactly_the_two_king_squares() {
        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let ctx = test_context(&agent, Color::White);
        let board = BoardState::initial();

        let king_squares: Vec<Square> = ALL_SQUARES
            .iter()
            .copied()
            .filter(|s| {
                variable_value(
                    VariableId::Provided(ProvidedVar::IsKing),
                    ProgramKind::Board,
                    *s,
                    &board,
                    &ctx,
                )
                .unwrap()
                    == 1
            })
            .collect();
        assert_eq!(king_squares, vec![sq("e1"), sq("e8")]);
    }

    #[test]
    fn self_and_opponent_depend_on_context_color() {
        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let board = BoardState::initial();

        let as_white = test_context(&agent, Color::White);
        let as_black = test_context(&agent, Color::Black);
        let read = |ctx: &TurnContext<'_>, var| {
            variable_value(
                VariableId::Provided(var),
                ProgramKind::Board,
                sq("e1"),
                &board,
                ctx,
            )
            .unwrap()
        };
        assert_eq!(read(&as_white, ProvidedVar::IsSelf), 1);
        assert_eq!(read(&as_white, ProvidedVar::IsOpponent), 0);
        assert_eq!(read(&as_black, ProvidedVar::IsSelf), 0);
        assert_eq!(read(&as_black, ProvidedVar::IsOpponent), 1);
    }

    #[test]
    fn queen_capture_attribution_fires_only_on_the_capture_square() {
        let board = BoardState::from_fen(
            "rnb1k1nr/pppp1ppp/3bp3/4N2q/3PP3/2P5/PP2QPPP/RNB1KB1R b KQkq - 4 6",
        )
        .unwrap();
        let mv = board
            .legal_moves()
            .iter()
            .find(|m| m.source() == sq("h5") && m.dest() == sq("e2"))
            .unwrap()
            .clone();
        let after = board.apply(&mv);

        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let ctx = test_context(&agent, Color::Black);
        let read = |var, square| {
            variable_value(
                VariableId::Provided(var),
                ProgramKind::Board,
                square,
                &after,
                &ctx,
            )
            .unwrap()
        };
        assert_eq!(read(ProvidedVar::WasCaptured, sq("e2")), 1);
        assert_eq!(read(ProvidedVar::QueenWasCaptured, sq("e2")), 1);
        assert_eq!(read(ProvidedVar::WasCaptured, sq("e1")), 0);
        assert_eq!(read(ProvidedVar::QueenWasCaptured, sq("e1")), 0);
        assert_eq!(read(ProvidedVar::PawnWasCaptured, sq("e2")), 0);
    }

    #[test]
    fn castled_king_side_decays_on_the_next_move() {
        let board =
            BoardState::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let castle = board
            .legal_moves()
            .iter()
            .find(|m| m.castle == Some(CastleSide::King))
            .unwrap()
            .clone();
        let after = board.apply(&castle);

        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let ctx = test_context(&agent, Color::White);
        let read = |board: &BoardState, square| {
            variable_value(
                VariableId::Provided(ProvidedVar::CastledKingSide),
                ProgramKind::Board,
                square,
                board,
                &ctx,
            )
            .unwrap()
        };
        assert_eq!(read(&after, sq("g1")), 1);
        assert_eq!(read(&after, sq("e1")), 0);

        // One more (black) move and the flag is gone everywhere.
        let reply = after.legal_moves()[0].clone();
        let later = after.apply(&reply);
        assert_eq!(read(&later, sq("g1")), 0);
    }

    #[test]
    fn move_counts_on_the_initial_position() {
        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let ctx = test_context(&agent, Color::White);
        let board = BoardState::initial();
        let read = |var, square| {
            variable_value(
                VariableId::Provided(var),
                ProgramKind::Board,
                square,
                &board,
                &ctx,
            )
            .unwrap()
        };
        // A knight on b1 has two moves; the e2 pawn one or two squares.
        assert_eq!(read(ProvidedVar::PossibleMoves, sq("b1")), 2);
        assert_eq!(read(ProvidedVar::PossibleMoves, sq("e2")), 2);
        assert_eq!(read(ProvidedVar::PossibleMoves, sq("e1")), 0);
        // a3 is reachable by the a2 pawn and the b1 knight.
        assert_eq!(read(ProvidedVar::CanMoveHere, sq("a3")), 2);
        assert_eq!(read(ProvidedVar::PawnCanMoveHere, sq("a3")), 1);
        assert_eq!(read(ProvidedVar::KnightCanMoveHere, sq("a3")), 1);
        assert_eq!(read(ProvidedVar::CanCapture, sq("e2")), 0);
    }

    #[test]
    fn movement_variables_read_the_turn_context() {
        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let mut ctx = test_context(&agent, Color::White);
        ctx.depth = 4;
        ctx.outputs.this_pre = 17;
        ctx.outputs.prev_post = -5;
        let board = BoardState::initial();
        let read = |ctx: &TurnContext<'_>, var| {
            variable_value(
                VariableId::Provided(var),
                ProgramKind::Movement,
                sq("a1"),
                &board,
                ctx,
            )
            .unwrap()
        };
        assert_eq!(read(&ctx, ProvidedVar::Depth), 4);
        assert_eq!(read(&ctx, ProvidedVar::ThisIterationPreMoveTotal), 17);
        assert_eq!(read(&ctx, ProvidedVar::PrevIterationPostMoveTotal), -5);
        assert_eq!(read(&ctx, ProvidedVar::FirstIterationPreMoveTotal), 0);
    }

    #[test]
    fn subset_violations_are_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let agent = Agent::random(&mut rng);
        let ctx = test_context(&agent, Color::White);
        let board = BoardState::initial();

        // A board-only variable inside a movement program.
        let err = variable_value(
            VariableId::Provided(ProvidedVar::IsKing),
            ProgramKind::Movement,
            sq("e1"),
            &board,
            &ctx,
        );
        assert!(err.is_err());

        // A movement-only variable inside a board program.
        let err = variable_value(
            VariableId::Provided(ProvidedVar::Depth),
            ProgramKind::Board,
            sq("e1"),
            &board,
            &ctx,
        );
        assert!(err.is_err());

        // Custom cells are fine in both.
        for program in [ProgramKind::Board, ProgramKind::Movement] {
            assert!(
                variable_value(VariableId::Custom(0), program, sq("e1"), &board, &ctx).is_ok()
            );
        }
    }
}
