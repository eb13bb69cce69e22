//! Board-state labels.
//!
//! A board state is written as a compact string, one rank after the other, where each
//! piece is a case-sensitive letter (`rnbqkp` for black, `RNBQKP` for white) and a digit
//! stands for a run of empty squares. Ranks may be separated by `-` (the file-name
//! convention of the training set) or `/`. Once expanded, a board has exactly 64 squares,
//! each one of [`NUM_CLASSES`] tile classes.

use core::fmt;
use core::str::FromStr;
use std::path::Path;

use thiserror::Error;

/// Number of squares on a board.
pub const NUM_SQUARES: usize = 64;

/// Number of tile classes: twelve pieces plus the empty square.
pub const NUM_CLASSES: usize = 13;

/// Symbol of each class, indexed by class. The empty square is written `1`, which keeps
/// an expanded board a valid compact board string.
pub const ALPHABET: [char; NUM_CLASSES] = [
    '1', 'r', 'n', 'b', 'q', 'k', 'p', 'R', 'N', 'B', 'Q', 'K', 'P',
];

const SEPARATORS: [char; 2] = ['-', '/'];

/// A 13-wide indicator vector.
pub type OneHot = [f32; NUM_CLASSES];

/// Error raised while decoding a board state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// A character that is neither a piece, a digit nor a separator.
    #[error("unknown symbol `{symbol}` at position {position}")]
    UnknownSymbol { symbol: char, position: usize },

    /// The expanded board does not have 64 squares.
    #[error("expected 64 squares, found {0}")]
    SquareCount(usize),

    /// The predicted distributions do not cover 64 squares of 13 classes.
    #[error("expected 64 x 13 values, found {0}")]
    DistributionSize(usize),

    /// The file name could not be used as a label.
    #[error("no board label in path `{0}`")]
    InvalidPath(String),
}

/// The occupant of a single square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileClass(u8);

impl TileClass {
    /// The empty square.
    pub const EMPTY: TileClass = TileClass(0);

    /// Class with the given index, if it is below [`NUM_CLASSES`].
    pub fn from_index(index: usize) -> Option<Self> {
        (index < NUM_CLASSES).then_some(Self(index as u8))
    }

    /// Class written with the given symbol.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        ALPHABET
            .iter()
            .position(|candidate| *candidate == symbol)
            .map(|index| Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn symbol(self) -> char {
        ALPHABET[self.index()]
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    pub fn one_hot(self) -> OneHot {
        let mut vector = [0.0; NUM_CLASSES];
        vector[self.index()] = 1.0;
        vector
    }

    /// Class with the highest score. Ties resolve to the lowest index.
    pub fn from_distribution(distribution: &[f32]) -> Self {
        let mut best = 0;

        for (index, score) in distribution.iter().enumerate().take(NUM_CLASSES) {
            if *score > distribution[best] {
                best = index;
            }
        }

        Self(best as u8)
    }
}

impl fmt::Display for TileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The occupants of the 64 squares, first rank first, in row-major order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoardState {
    squares: [TileClass; NUM_SQUARES],
}

impl BoardState {
    pub fn empty() -> Self {
        Self {
            squares: [TileClass::EMPTY; NUM_SQUARES],
        }
    }

    /// Build a board from exactly 64 classes.
    pub fn from_classes<I>(classes: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = TileClass>,
    {
        let mut squares = [TileClass::EMPTY; NUM_SQUARES];
        let mut count = 0;

        for class in classes {
            if count < NUM_SQUARES {
                squares[count] = class;
            }
            count += 1;
        }

        if count != NUM_SQUARES {
            return Err(LabelError::SquareCount(count));
        }

        Ok(Self { squares })
    }

    /// The label of a training image is its file name without the extension.
    pub fn from_image_path<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| LabelError::InvalidPath(path.to_string_lossy().into_owned()))?;

        stem.parse()
    }

    /// Decode arg-max distributions, 13 consecutive scores per square.
    pub fn from_distributions(values: &[f32]) -> Result<Self, LabelError> {
        if values.len() != NUM_SQUARES * NUM_CLASSES {
            return Err(LabelError::DistributionSize(values.len()));
        }

        Self::from_classes(
            values
                .chunks_exact(NUM_CLASSES)
                .map(TileClass::from_distribution),
        )
    }

    pub fn from_one_hot(vectors: &[OneHot]) -> Result<Self, LabelError> {
        Self::from_classes(vectors.iter().map(|vector| TileClass::from_distribution(vector)))
    }

    pub fn squares(&self) -> &[TileClass; NUM_SQUARES] {
        &self.squares
    }

    pub fn one_hot(&self) -> Vec<OneHot> {
        self.squares.iter().map(|class| class.one_hot()).collect()
    }

    /// Run-length form with ranks separated by `-`, as used for training file names.
    pub fn to_compact(&self) -> String {
        let mut compact = String::with_capacity(NUM_SQUARES + 7);

        for (rank, squares) in self.squares.chunks_exact(8).enumerate() {
            if rank > 0 {
                compact.push('-');
            }

            let mut empty = 0;
            for class in squares {
                if class.is_empty() {
                    empty += 1;
                    continue;
                }
                if empty > 0 {
                    compact.push_str(&empty.to_string());
                    empty = 0;
                }
                compact.push(class.symbol());
            }
            if empty > 0 {
                compact.push_str(&empty.to_string());
            }
        }

        compact
    }
}

impl FromStr for BoardState {
    type Err = LabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut classes = Vec::with_capacity(NUM_SQUARES);

        for (position, symbol) in value.chars().enumerate() {
            if SEPARATORS.contains(&symbol) {
                continue;
            }

            match symbol.to_digit(10) {
                Some(run @ 1..=8) => {
                    classes.extend(std::iter::repeat(TileClass::EMPTY).take(run as usize))
                }
                Some(_) => return Err(LabelError::UnknownSymbol { symbol, position }),
                None => match TileClass::from_symbol(symbol) {
                    Some(class) => classes.push(class),
                    None => return Err(LabelError::UnknownSymbol { symbol, position }),
                },
            }
        }

        Self::from_classes(classes)
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in self.squares.iter() {
            write!(f, "{class}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &str = "1B1B1K2-3p1N2-6k1-R7-5P2-4q3-7R-1B6";

    #[test]
    fn expands_run_lengths_to_64_squares() {
        let board: BoardState = LABEL.parse().unwrap();

        assert_eq!(board.squares().len(), NUM_SQUARES);
        assert_eq!(
            board.to_string(),
            concat!(
                "1B1B1K11", "111p1N11", "111111k1", "R1111111", "11111P11", "1111q111",
                "1111111R", "1B111111"
            )
        );
        assert_eq!(board.to_string().chars().count(), NUM_SQUARES);
    }

    #[test]
    fn separators_are_optional() {
        let dashed: BoardState = LABEL.parse().unwrap();
        let bare: BoardState = LABEL.replace('-', "").parse().unwrap();
        let slashed: BoardState = LABEL.replace('-', "/").parse().unwrap();

        assert_eq!(dashed, bare);
        assert_eq!(dashed, slashed);
    }

    #[test]
    fn empty_board() {
        let board: BoardState = "8/8/8/8/8/8/8/8".parse().unwrap();

        assert_eq!(board, BoardState::empty());
        assert_eq!(board.to_string(), "1".repeat(NUM_SQUARES));
    }

    #[test]
    fn maps_symbols_to_classes() {
        let board: BoardState = "rnbqkbnr-pppppppp-8-8-8-8-PPPPPPPP-RNBQKBNR".parse().unwrap();
        let squares = board.squares();

        assert_eq!(squares[0].index(), 1);
        assert_eq!(squares[4].symbol(), 'k');
        assert_eq!(squares[16], TileClass::EMPTY);
        assert_eq!(squares[60].symbol(), 'K');
        assert_eq!(squares[63].index(), 7);
    }

    #[test]
    fn rejects_wrong_square_count() {
        assert_eq!(
            "8-8-8".parse::<BoardState>(),
            Err(LabelError::SquareCount(24))
        );
        assert_eq!(
            "8-8-8-8-8-8-8-8-p".parse::<BoardState>(),
            Err(LabelError::SquareCount(65))
        );
    }

    #[test]
    fn rejects_unknown_symbols() {
        assert_eq!(
            "8-8-8-8-8-8-8-7x".parse::<BoardState>(),
            Err(LabelError::UnknownSymbol {
                symbol: 'x',
                position: 15
            })
        );
        assert!(matches!(
            "0-8-8-8-8-8-8-8".parse::<BoardState>(),
            Err(LabelError::UnknownSymbol { symbol: '0', .. })
        ));
    }

    #[test]
    fn one_hot_has_a_single_hot_entry_per_square() {
        let board: BoardState = LABEL.parse().unwrap();
        let vectors = board.one_hot();

        assert_eq!(vectors.len(), NUM_SQUARES);
        for (vector, class) in vectors.iter().zip(board.squares()) {
            assert_eq!(vector.iter().sum::<f32>(), 1.0);
            assert_eq!(vector[class.index()], 1.0);
        }
    }

    #[test]
    fn one_hot_decodes_back_to_the_same_board() {
        let board: BoardState = LABEL.parse().unwrap();

        let decoded = BoardState::from_one_hot(&board.one_hot()).unwrap();

        assert_eq!(decoded, board);
    }

    #[test]
    fn decodes_distributions_by_arg_max() {
        let board: BoardState = LABEL.parse().unwrap();
        let values: Vec<f32> = board
            .squares()
            .iter()
            .flat_map(|class| {
                let mut scores = [0.05; NUM_CLASSES];
                scores[class.index()] = 0.4;
                scores
            })
            .collect();

        assert_eq!(BoardState::from_distributions(&values).unwrap(), board);
        assert_eq!(
            BoardState::from_distributions(&values[1..]),
            Err(LabelError::DistributionSize(NUM_SQUARES * NUM_CLASSES - 1))
        );
    }

    #[test]
    fn ties_resolve_to_the_lowest_class() {
        assert_eq!(TileClass::from_distribution(&[0.5; NUM_CLASSES]), TileClass::EMPTY);
    }

    #[test]
    fn compact_form_round_trips() {
        let board: BoardState = LABEL.parse().unwrap();

        assert_eq!(board.to_compact(), LABEL);
        assert_eq!(BoardState::empty().to_compact(), "8-8-8-8-8-8-8-8");
    }

    #[test]
    fn label_from_image_path() {
        let board = BoardState::from_image_path(format!("/data/train/{LABEL}.jpeg")).unwrap();

        assert_eq!(board, LABEL.parse().unwrap());
    }
}
