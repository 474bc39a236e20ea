//! Board square representation.

use std::fmt;

/// A square on the board, indexed 0-63 with a1 = 0 and h8 = 63.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Creates a square from a raw index (0-63).
    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 {
            Some(Square(index))
        } else {
            None
        }
    }

    /// Creates a square from file (0-7, a-h) and rank (0-7, 1-8) indices.
    #[inline]
    pub const fn from_coords(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Square(rank * 8 + file))
        } else {
            None
        }
    }

    /// Returns the raw index (0-63).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the file index (0 = a, 7 = h).
    #[inline]
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// Returns the rank index (0 = rank 1, 7 = rank 8).
    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Returns the square shifted by file/rank deltas, if still on the board.
    pub fn offset(self, d_file: i8, d_rank: i8) -> Option<Self> {
        let f = self.file() as i8 + d_file;
        let r = self.rank() as i8 + d_rank;
        if (0..8).contains(&f) && (0..8).contains(&r) {
            Square::from_coords(f as u8, r as u8)
        } else {
            None
        }
    }

    /// Parses algebraic notation like "e4".
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let file_char = chars.next()?;
        let rank_char = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let file = match file_char {
            'a'..='h' => file_char as u8 - b'a',
            _ => return None,
        };
        let rank = match rank_char {
            '1'..='8' => rank_char as u8 - b'1',
            _ => return None,
        };
        Square::from_coords(file, rank)
    }

    /// Returns algebraic notation like "e4".
    pub fn to_algebraic(self) -> String {
        format!("{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }

    /// Iterates over all 64 squares.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn coords_roundtrip() {
        let e4 = Square::from_algebraic("e4").unwrap();
        assert_eq!(e4.file(), 4);
        assert_eq!(e4.rank(), 3);
        assert_eq!(e4.to_algebraic(), "e4");
        assert_eq!(Square::from_coords(4, 3), Some(e4));
    }

    #[test]
    fn corners() {
        assert_eq!(Square::from_algebraic("a1").unwrap().index(), 0);
        assert_eq!(Square::from_algebraic("h8").unwrap().index(), 63);
    }

    #[test]
    fn invalid_algebraic() {
        assert_eq!(Square::from_algebraic("i4"), None);
        assert_eq!(Square::from_algebraic("e9"), None);
        assert_eq!(Square::from_algebraic("e"), None);
        assert_eq!(Square::from_algebraic("e44"), None);
    }

    #[test]
    fn offsets_stay_on_board() {
        let a1 = Square::from_algebraic("a1").unwrap();
        assert_eq!(a1.offset(-1, 0), None);
        assert_eq!(a1.offset(0, -1), None);
        assert_eq!(a1.offset(1, 1), Square::from_algebraic("b2"));
    }

    proptest! {
        #[test]
        fn algebraic_roundtrip(idx in 0u8..64) {
            let sq = Square::from_index(idx).unwrap();
            let parsed = Square::from_algebraic(&sq.to_algebraic()).unwrap();
            prop_assert_eq!(sq, parsed);
        }
    }
}
