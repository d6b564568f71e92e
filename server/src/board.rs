//! Board generation: sampling a personal 24-cell board from the theme list

use rand::Rng;
use shared::BOARD_SIZE;
use std::error::Error;
use std::fmt;

/// Returned when the vocabulary cannot fill a board.
#[derive(Debug, PartialEq, Eq)]
pub struct VocabularyTooSmall {
    pub have: usize,
}

impl fmt::Display for VocabularyTooSmall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vocabulary has {} entries, need at least {}",
            self.have, BOARD_SIZE
        )
    }
}

impl Error for VocabularyTooSmall {}

/// Draws a randomized board of exactly [`BOARD_SIZE`] distinct cells.
///
/// Sampling without replacement: each pick removes the chosen cell from the
/// candidate pool, so duplicates are impossible by construction. Every call
/// produces an independently shuffled board.
pub fn generate_board(vocabulary: &[String]) -> Result<Vec<String>, VocabularyTooSmall> {
    if vocabulary.len() < BOARD_SIZE {
        return Err(VocabularyTooSmall {
            have: vocabulary.len(),
        });
    }

    let mut rng = rand::thread_rng();
    let mut pool: Vec<String> = vocabulary.to_vec();
    let mut board = Vec::with_capacity(BOARD_SIZE);

    for _ in 0..BOARD_SIZE {
        let index = rng.gen_range(0..pool.len());
        board.push(pool.swap_remove(index));
    }

    Ok(board)
}
