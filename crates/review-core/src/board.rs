//! Mailbox board with FEN parsing, move generation, and move application.
//!
//! The analysis layer treats rule enforcement as a collaborator behind the
//! [`BoardView`](crate::BoardView) capability; this board is the reference
//! implementation backing [`StandardRules`](crate::StandardRules).

use crate::{Color, Piece, Square, UciMove};
use thiserror::Error;

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

const CASTLE_WK: u8 = 1;
const CASTLE_WQ: u8 = 2;
const CASTLE_BK: u8 = 4;
const CASTLE_BQ: u8 = 8;

/// The standard starting position.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Errors that can occur while parsing FEN strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// The FEN string does not have the required fields.
    #[error("FEN is missing required fields: {0}")]
    MissingFields(String),
    /// The piece placement field is malformed.
    #[error("Invalid piece placement: {0}")]
    InvalidPlacement(String),
    /// The side-to-move field is not "w" or "b".
    #[error("Invalid side to move: {0}")]
    InvalidSideToMove(String),
    /// The en passant field is not "-" or a valid square.
    #[error("Invalid en passant square: {0}")]
    InvalidEnPassant(String),
}

/// A full chess position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Option<(Piece, Color)>; 64],
    side_to_move: Color,
    castling: u8,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Board {
    /// Returns the standard starting position.
    pub fn startpos() -> Self {
        Board::from_fen(STARTPOS_FEN).expect("startpos FEN is valid")
    }

    /// Parses a FEN string into a board.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::MissingFields(fen.to_string()));
        }

        let mut squares = [None; 64];
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidPlacement(fields[0].to_string()));
        }
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                } else {
                    let (piece, color) = Piece::from_fen_char(c)
                        .ok_or_else(|| FenError::InvalidPlacement(rank_str.to_string()))?;
                    let sq = Square::from_coords(file, rank)
                        .ok_or_else(|| FenError::InvalidPlacement(rank_str.to_string()))?;
                    squares[sq.index()] = Some((piece, color));
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::InvalidPlacement(rank_str.to_string()));
                }
            }
            if file != 8 {
                return Err(FenError::InvalidPlacement(rank_str.to_string()));
            }
        }

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidSideToMove(other.to_string())),
        };

        let mut castling = 0u8;
        if fields[2] != "-" {
            for c in fields[2].chars() {
                castling |= match c {
                    'K' => CASTLE_WK,
                    'Q' => CASTLE_WQ,
                    'k' => CASTLE_BK,
                    'q' => CASTLE_BQ,
                    _ => 0,
                };
            }
        }

        let en_passant = if fields[3] == "-" {
            None
        } else {
            Some(
                Square::from_algebraic(fields[3])
                    .ok_or_else(|| FenError::InvalidEnPassant(fields[3].to_string()))?,
            )
        };

        let halfmove_clock = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        let fullmove_number = fields.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);

        Ok(Board {
            squares,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Serializes the board to a FEN string.
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let sq = Square::from_coords(file, rank).unwrap();
                match self.squares[sq.index()] {
                    Some((piece, color)) => {
                        if empty > 0 {
                            fen.push(char::from_digit(empty, 10).unwrap());
                            empty = 0;
                        }
                        fen.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push(char::from_digit(empty, 10).unwrap());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        fen.push(' ');
        if self.castling == 0 {
            fen.push('-');
        } else {
            if self.castling & CASTLE_WK != 0 {
                fen.push('K');
            }
            if self.castling & CASTLE_WQ != 0 {
                fen.push('Q');
            }
            if self.castling & CASTLE_BK != 0 {
                fen.push('k');
            }
            if self.castling & CASTLE_BQ != 0 {
                fen.push('q');
            }
        }

        fen.push(' ');
        match self.en_passant {
            Some(sq) => fen.push_str(&sq.to_algebraic()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        fen
    }

    /// Returns the piece and color on a square.
    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        self.squares[sq.index()]
    }

    /// Returns the side to move.
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// Returns the square of the given color's king, if present.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        Square::all().find(|&sq| self.squares[sq.index()] == Some((Piece::King, color)))
    }

    /// Returns every square attacked by the piece on `sq`.
    ///
    /// Sliding attacks stop at the first occupied square and include it,
    /// regardless of the blocker's color, so the result doubles as a
    /// defended-square set for same-colored occupants.
    pub fn attacks_from(&self, sq: Square) -> Vec<Square> {
        let Some((piece, color)) = self.squares[sq.index()] else {
            return Vec::new();
        };
        let mut attacks = Vec::new();
        match piece {
            Piece::Pawn => {
                let dir = color.pawn_direction();
                for df in [-1, 1] {
                    if let Some(target) = sq.offset(df, dir) {
                        attacks.push(target);
                    }
                }
            }
            Piece::Knight => {
                for (df, dr) in KNIGHT_DELTAS {
                    if let Some(target) = sq.offset(df, dr) {
                        attacks.push(target);
                    }
                }
            }
            Piece::King => {
                for (df, dr) in KING_DELTAS {
                    if let Some(target) = sq.offset(df, dr) {
                        attacks.push(target);
                    }
                }
            }
            Piece::Bishop | Piece::Rook | Piece::Queen => {
                let dirs: &[(i8, i8)] = match piece {
                    Piece::Bishop => &BISHOP_DIRS,
                    Piece::Rook => &ROOK_DIRS,
                    _ => &[
                        (1, 1),
                        (1, -1),
                        (-1, 1),
                        (-1, -1),
                        (1, 0),
                        (-1, 0),
                        (0, 1),
                        (0, -1),
                    ],
                };
                for &(df, dr) in dirs {
                    let mut current = sq;
                    while let Some(next) = current.offset(df, dr) {
                        attacks.push(next);
                        if self.squares[next.index()].is_some() {
                            break;
                        }
                        current = next;
                    }
                }
            }
        }
        attacks
    }

    /// Returns true if any piece of `by` attacks `sq`.
    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        Square::all().any(|from| {
            matches!(self.squares[from.index()], Some((_, c)) if c == by)
                && self.attacks_from(from).contains(&sq)
        })
    }

    /// Returns true if the given color's king is attacked.
    pub fn in_check(&self, color: Color) -> bool {
        match self.king_square(color) {
            Some(king) => self.is_square_attacked(king, color.opposite()),
            None => false,
        }
    }

    /// Generates pseudo-legal moves for the piece on `sq`, ignoring whose
    /// turn it is. Legality filtering happens in [`Board::legal_moves_from`].
    pub fn pseudo_moves_from(&self, sq: Square) -> Vec<UciMove> {
        let Some((piece, color)) = self.squares[sq.index()] else {
            return Vec::new();
        };
        let mut moves = Vec::new();

        if piece == Piece::Pawn {
            let dir = color.pawn_direction();
            let start_rank = match color {
                Color::White => 1,
                Color::Black => 6,
            };
            let promo_rank = match color {
                Color::White => 7,
                Color::Black => 0,
            };

            let mut push_pawn_move = |from: Square, to: Square, moves: &mut Vec<UciMove>| {
                if to.rank() == promo_rank {
                    for promo in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight] {
                        moves.push(UciMove {
                            from,
                            to,
                            promotion: Some(promo),
                        });
                    }
                } else {
                    moves.push(UciMove::new(from, to));
                }
            };

            if let Some(one) = sq.offset(0, dir) {
                if self.squares[one.index()].is_none() {
                    push_pawn_move(sq, one, &mut moves);
                    if sq.rank() == start_rank {
                        if let Some(two) = sq.offset(0, 2 * dir) {
                            if self.squares[two.index()].is_none() {
                                moves.push(UciMove::new(sq, two));
                            }
                        }
                    }
                }
            }
            for df in [-1, 1] {
                if let Some(target) = sq.offset(df, dir) {
                    let is_enemy =
                        matches!(self.squares[target.index()], Some((_, c)) if c != color);
                    let is_ep = self.en_passant == Some(target);
                    if is_enemy || is_ep {
                        push_pawn_move(sq, target, &mut moves);
                    }
                }
            }
            return moves;
        }

        for target in self.attacks_from(sq) {
            match self.squares[target.index()] {
                Some((_, c)) if c == color => {}
                _ => moves.push(UciMove::new(sq, target)),
            }
        }

        if piece == Piece::King {
            self.push_castling_moves(sq, color, &mut moves);
        }

        moves
    }

    fn push_castling_moves(&self, sq: Square, color: Color, moves: &mut Vec<UciMove>) {
        let (home_rank, kingside_right, queenside_right) = match color {
            Color::White => (0, CASTLE_WK, CASTLE_WQ),
            Color::Black => (7, CASTLE_BK, CASTLE_BQ),
        };
        if sq != Square::from_coords(4, home_rank).unwrap() {
            return;
        }
        let empty = |file: u8| {
            self.squares[Square::from_coords(file, home_rank).unwrap().index()].is_none()
        };
        if self.castling & kingside_right != 0 && empty(5) && empty(6) {
            moves.push(UciMove::new(
                sq,
                Square::from_coords(6, home_rank).unwrap(),
            ));
        }
        if self.castling & queenside_right != 0 && empty(1) && empty(2) && empty(3) {
            moves.push(UciMove::new(
                sq,
                Square::from_coords(2, home_rank).unwrap(),
            ));
        }
    }

    /// Returns true if `mv` is a castling move for the piece on its source.
    fn is_castling(&self, mv: UciMove) -> bool {
        matches!(self.squares[mv.from.index()], Some((Piece::King, _)))
            && mv.from.file() == 4
            && (mv.to.file() == 6 || mv.to.file() == 2)
            && mv.from.rank() == mv.to.rank()
    }

    /// Generates the legal moves for the piece on `sq`.
    pub fn legal_moves_from(&self, sq: Square) -> Vec<UciMove> {
        let Some((_, color)) = self.squares[sq.index()] else {
            return Vec::new();
        };
        let opponent = color.opposite();
        self.pseudo_moves_from(sq)
            .into_iter()
            .filter(|&mv| {
                if self.is_castling(mv) {
                    // King may not castle out of, through, or into check.
                    let mid_file = (mv.from.file() + mv.to.file()) / 2;
                    let mid = Square::from_coords(mid_file, mv.from.rank()).unwrap();
                    if self.is_square_attacked(mv.from, opponent)
                        || self.is_square_attacked(mid, opponent)
                    {
                        return false;
                    }
                }
                match self.apply(mv) {
                    Some(next) => !next.in_check(color),
                    None => false,
                }
            })
            .collect()
    }

    /// Generates all legal moves for the side to move.
    pub fn legal_moves(&self) -> Vec<UciMove> {
        Square::all()
            .filter(|&sq| {
                matches!(self.squares[sq.index()], Some((_, c)) if c == self.side_to_move)
            })
            .flat_map(|sq| self.legal_moves_from(sq))
            .collect()
    }

    /// Returns true if `mv` captures a piece (including en passant).
    pub fn is_capture(&self, mv: UciMove) -> bool {
        match self.squares[mv.from.index()] {
            Some((piece, color)) => {
                if matches!(self.squares[mv.to.index()], Some((_, c)) if c != color) {
                    return true;
                }
                piece == Piece::Pawn && self.en_passant == Some(mv.to)
            }
            None => false,
        }
    }

    /// Returns true if the side to move is checkmated.
    pub fn is_checkmate(&self) -> bool {
        self.in_check(self.side_to_move) && self.legal_moves().is_empty()
    }

    /// Applies a move and returns the resulting board, or `None` if the
    /// source square is empty. Legality is not re-checked here.
    pub fn apply(&self, mv: UciMove) -> Option<Board> {
        let (piece, color) = self.squares[mv.from.index()]?;
        let mut next = self.clone();

        let is_capture = self.is_capture(mv);

        // En passant removes the pawn behind the target square.
        if piece == Piece::Pawn && self.en_passant == Some(mv.to) {
            let captured = Square::from_coords(mv.to.file(), mv.from.rank())?;
            next.squares[captured.index()] = None;
        }

        next.squares[mv.from.index()] = None;
        let placed = match mv.promotion {
            Some(promo) if piece == Piece::Pawn => promo,
            _ => piece,
        };
        next.squares[mv.to.index()] = Some((placed, color));

        // Castling moves the rook as well.
        if self.is_castling(mv) {
            let rank = mv.from.rank();
            let (rook_from, rook_to) = if mv.to.file() == 6 {
                (Square::from_coords(7, rank)?, Square::from_coords(5, rank)?)
            } else {
                (Square::from_coords(0, rank)?, Square::from_coords(3, rank)?)
            };
            next.squares[rook_to.index()] = next.squares[rook_from.index()].take();
        }

        // Castling rights fall when the king or a rook moves, or a rook is
        // captured on its home square.
        let clear_rights_for = |sq: Square, rights: &mut u8| match sq.to_algebraic().as_str() {
            "e1" => *rights &= !(CASTLE_WK | CASTLE_WQ),
            "h1" => *rights &= !CASTLE_WK,
            "a1" => *rights &= !CASTLE_WQ,
            "e8" => *rights &= !(CASTLE_BK | CASTLE_BQ),
            "h8" => *rights &= !CASTLE_BK,
            "a8" => *rights &= !CASTLE_BQ,
            _ => {}
        };
        clear_rights_for(mv.from, &mut next.castling);
        clear_rights_for(mv.to, &mut next.castling);

        next.en_passant = if piece == Piece::Pawn
            && (mv.from.rank() as i8 - mv.to.rank() as i8).abs() == 2
        {
            Square::from_coords(mv.from.file(), (mv.from.rank() + mv.to.rank()) / 2)
        } else {
            None
        };

        next.halfmove_clock = if piece == Piece::Pawn || is_capture {
            0
        } else {
            self.halfmove_clock + 1
        };
        if color == Color::Black {
            next.fullmove_number = self.fullmove_number + 1;
        }
        next.side_to_move = color.opposite();

        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        Board::from_fen(fen).unwrap()
    }

    #[test]
    fn startpos_roundtrip() {
        let b = Board::startpos();
        assert_eq!(b.to_fen(), STARTPOS_FEN);
        assert_eq!(b.side_to_move(), Color::White);
    }

    #[test]
    fn startpos_has_twenty_moves() {
        assert_eq!(Board::startpos().legal_moves().len(), 20);
    }

    #[test]
    fn reject_bad_fen() {
        assert!(Board::from_fen("").is_err());
        assert!(Board::from_fen("8/8/8/8 w - -").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/9 w - - 0 1").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 x - - 0 1").is_err());
    }

    #[test]
    fn apply_basic_move() {
        let b = Board::startpos();
        let next = b.apply(UciMove::from_uci("e2e4").unwrap()).unwrap();
        assert_eq!(next.side_to_move(), Color::Black);
        assert_eq!(
            next.piece_at(Square::from_algebraic("e4").unwrap()),
            Some((Piece::Pawn, Color::White))
        );
        assert_eq!(next.piece_at(Square::from_algebraic("e2").unwrap()), None);
        // Double push sets the en passant square.
        assert!(next.to_fen().contains(" e3 "));
    }

    #[test]
    fn en_passant_capture_removes_pawn() {
        let b = board("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2");
        let mv = UciMove::from_uci("d4e3").unwrap();
        assert!(b.is_capture(mv));
        let next = b.apply(mv).unwrap();
        assert_eq!(next.piece_at(Square::from_algebraic("e4").unwrap()), None);
        assert_eq!(
            next.piece_at(Square::from_algebraic("e3").unwrap()),
            Some((Piece::Pawn, Color::Black))
        );
    }

    #[test]
    fn castling_moves_rook() {
        let b = board("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4");
        let next = b.apply(UciMove::from_uci("e1g1").unwrap()).unwrap();
        assert_eq!(
            next.piece_at(Square::from_algebraic("g1").unwrap()),
            Some((Piece::King, Color::White))
        );
        assert_eq!(
            next.piece_at(Square::from_algebraic("f1").unwrap()),
            Some((Piece::Rook, Color::White))
        );
        assert_eq!(next.piece_at(Square::from_algebraic("h1").unwrap()), None);
    }

    #[test]
    fn promotion_places_piece() {
        let b = board("8/P7/8/8/8/8/8/k2K4 w - - 0 1");
        let next = b.apply(UciMove::from_uci("a7a8q").unwrap()).unwrap();
        assert_eq!(
            next.piece_at(Square::from_algebraic("a8").unwrap()),
            Some((Piece::Queen, Color::White))
        );
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let mut b = Board::startpos();
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            b = b.apply(UciMove::from_uci(uci).unwrap()).unwrap();
        }
        assert!(b.in_check(Color::White));
        assert!(b.is_checkmate());
    }

    #[test]
    fn pinned_piece_cannot_move() {
        // Knight on e4 is pinned against the white king by the black rook.
        let b = board("4r3/8/8/8/4N3/8/8/4K3 w - - 0 1");
        let knight = Square::from_algebraic("e4").unwrap();
        assert!(b.legal_moves_from(knight).is_empty());
    }

    #[test]
    fn attacks_include_defended_squares() {
        // Rook on a1 defends the pawn on a4 and attacks through to it.
        let b = board("4k3/8/8/8/P7/8/8/R3K3 w - - 0 1");
        let rook = Square::from_algebraic("a1").unwrap();
        let attacks = b.attacks_from(rook);
        assert!(attacks.contains(&Square::from_algebraic("a4").unwrap()));
        assert!(!attacks.contains(&Square::from_algebraic("a5").unwrap()));
    }

    #[test]
    fn cannot_castle_through_check() {
        // Black rook on f8 covers f1.
        let b = board("4kr2/8/8/8/8/8/8/4K2R w K - 0 1");
        let king = Square::from_algebraic("e1").unwrap();
        let moves = b.legal_moves_from(king);
        assert!(!moves.contains(&UciMove::from_uci("e1g1").unwrap()));
    }
}
