//! Thin adapter over the `chess` crate.
//!
//! The rules of chess (move legality, check and mate detection, FEN parsing)
//! are entirely delegated to the backend. What this module adds is the state
//! the evaluator needs and the backend does not keep:
//!
//! - a flagged legal-move list ([`MoveInfo`]: capture, en passant, promotion,
//!   castle side, captured piece kind),
//! - last-move metadata ([`LastMove`]), with the captured kind resolved from
//!   the pre-move position at the time the move is applied,
//! - draw tracking (threefold repetition via position hashes, the fifty-move
//!   rule via a halfmove clock).
//!
//! A [`BoardState`] is immutable: [`BoardState::apply`] returns the successor
//! position, which makes hypothetical play during move search a plain value
//! copy.

use std::str::FromStr;

use anyhow::Result;
use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square};

/// Which side a castling move belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastleSide {
    /// Short castle (king toward the h-file).
    King,
    /// Long castle (king toward the a-file).
    Queen,
}

/// A legal move of the current position, with the flags the evaluator needs.
#[derive(Debug, Clone)]
pub struct MoveInfo {
    /// The backend move (source, destination, optional promotion).
    pub mv: ChessMove,
    /// Kind of the moving piece.
    pub piece: Piece,
    /// True if the move captures, en passant included.
    pub capture: bool,
    /// Kind of the captured piece, if any.
    pub capture_kind: Option<Piece>,
    /// True if the capture is en passant.
    pub en_passant: bool,
    /// Promotion target, if the move promotes.
    pub promotion: Option<Piece>,
    /// Castle side, if the move castles.
    pub castle: Option<CastleSide>,
}

impl MoveInfo {
    /// Source square.
    pub fn source(&self) -> Square {
        self.mv.get_source()
    }

    /// Destination square.
    pub fn dest(&self) -> Square {
        self.mv.get_dest()
    }
}

/// Metadata of the move that produced the current position.
#[derive(Debug, Clone)]
pub struct LastMove {
    /// Square the move started from.
    pub from: Square,
    /// Square the move ended on.
    pub to: Square,
    /// Kind of the piece that moved (before any promotion).
    pub piece: Piece,
    /// Kind of the piece that was captured, resolved from the pre-move
    /// position. `Some(Piece::Pawn)` for en passant.
    pub captured: Option<Piece>,
    /// True if the capture was en passant.
    pub en_passant: bool,
    /// Promotion target, if the move promoted.
    pub promotion: Option<Piece>,
    /// Castle side, if the move castled.
    pub castle: Option<CastleSide>,
}

/// A chess position plus the history the draw rules need.
#[derive(Debug, Clone)]
pub struct BoardState {
    board: Board,
    // Position hashes of every position seen so far, current included.
    history: Vec<u64>,
    halfmove_clock: u32,
    last_move: Option<LastMove>,
    moves: Vec<MoveInfo>,
}

impl BoardState {
    /// The standard initial position.
    pub fn initial() -> Self {
        Self::from_parts(Board::default(), vec![], 0, None)
    }

    /// A position parsed from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self> {
        let board = Board::from_str(fen)
            .map_err(|e| anyhow::anyhow!("invalid FEN '{fen}': {e}"))?;
        let halfmove_clock = fen
            .split_whitespace()
            .nth(4)
            .and_then(|f| f.parse().ok())
            .unwrap_or(0);
        Ok(Self::from_parts(board, vec![], halfmove_clock, None))
    }

    fn from_parts(
        board: Board,
        mut history: Vec<u64>,
        halfmove_clock: u32,
        last_move: Option<LastMove>,
    ) -> Self {
        history.push(board.get_hash());
        let moves = flagged_legal_moves(&board);
        BoardState {
            board,
            history,
            halfmove_clock,
            last_move,
            moves,
        }
    }

    /// The successor position after playing `info`.
    ///
    /// The captured piece kind, if any, is resolved here, while the pre-move
    /// position is still at hand.
    pub fn apply(&self, info: &MoveInfo) -> BoardState {
        let next = self.board.make_move_new(info.mv);
        let halfmove_clock = if info.capture || info.piece == Piece::Pawn {
            0
        } else {
            self.halfmove_clock + 1
        };
        let last_move = LastMove {
            from: info.source(),
            to: info.dest(),
            piece: info.piece,
            captured: info.capture_kind,
            en_passant: info.en_passant,
            promotion: info.promotion,
            castle: info.castle,
        };
        Self::from_parts(next, self.history.clone(), halfmove_clock, Some(last_move))
    }

    /// Legal moves of the current position.
    pub fn legal_moves(&self) -> &[MoveInfo] {
        &self.moves
    }

    /// The move that produced this position, if any.
    pub fn last_move(&self) -> Option<&LastMove> {
        self.last_move.as_ref()
    }

    /// Side to move.
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Piece kind on `square`, if occupied.
    pub fn piece_on(&self, square: Square) -> Option<Piece> {
        self.board.piece_on(square)
    }

    /// Color of the piece on `square`, if occupied.
    pub fn color_on(&self, square: Square) -> Option<Color> {
        self.board.color_on(square)
    }

    /// True if the side to move is in check.
    pub fn in_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    /// True if the side to move is checkmated.
    pub fn is_checkmate(&self) -> bool {
        self.board.status() == BoardStatus::Checkmate
    }

    /// True if the side to move is stalemated.
    pub fn is_stalemate(&self) -> bool {
        self.board.status() == BoardStatus::Stalemate
    }

    /// True if the current position occurred at least three times.
    pub fn is_threefold_repetition(&self) -> bool {
        let current = self.board.get_hash();
        self.history.iter().filter(|h| **h == current).count() >= 3
    }

    /// True if fifty full moves passed without a capture or a pawn move.
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// True if the position is drawn (stalemate, repetition or fifty-move).
    pub fn is_draw(&self) -> bool {
        self.is_stalemate() || self.is_threefold_repetition() || self.is_fifty_move_draw()
    }

    /// True if the game cannot continue from this position.
    pub fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }
}

fn flagged_legal_moves(board: &Board) -> Vec<MoveInfo> {
    MoveGen::new_legal(board)
        .map(|mv| {
            let piece = board
                .piece_on(mv.get_source())
                .expect("legal move has a piece on its source square");
            let dest_piece = board.piece_on(mv.get_dest());
            // A pawn landing on an empty square of another file can only be
            // an en passant capture.
            let en_passant = piece == Piece::Pawn
                && dest_piece.is_none()
                && mv.get_source().get_file() != mv.get_dest().get_file();
            let capture = dest_piece.is_some() || en_passant;
            let capture_kind = if en_passant { Some(Piece::Pawn) } else { dest_piece };
            let castle = if piece == Piece::King {
                let from = mv.get_source().get_file().to_index() as i8;
                let to = mv.get_dest().get_file().to_index() as i8;
                match to - from {
                    2 => Some(CastleSide::King),
                    -2 => Some(CastleSide::Queen),
                    _ => None,
                }
            } else {
                None
            };
            MoveInfo {
                mv,
                piece,
                capture,
                capture_kind,
                en_passant,
                promotion: mv.get_promotion(),
                castle,
            }
        })
        .collect()
}
