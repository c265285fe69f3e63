//! Dice roll generation
//!
//! A roll is presented as a fixed number of random intermediate faces
//! followed by a final face. None of the faces are stored; only the fact
//! that a roll happened is persisted (as `last_roll_time`).

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// Intermediate faces shown before the result
pub const ROLL_FRAMES: usize = 10;

/// Cadence of the intermediate faces
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Faces of the die
pub const DIE_FACES: RangeInclusive<u8> = 1..=6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// Presentational only
    pub frames: Vec<u8>,
    pub face: u8,
}

impl DiceRoll {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let frames = (0..ROLL_FRAMES)
            .map(|_| rng.gen_range(DIE_FACES))
            .collect();
        let face = rng.gen_range(DIE_FACES);
        Self { frames, face }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_roll_has_fixed_frame_count_and_valid_faces() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let roll = DiceRoll::generate(&mut rng);
            assert_eq!(roll.frames.len(), ROLL_FRAMES);
            assert!(roll.frames.iter().all(|f| DIE_FACES.contains(f)));
            assert!(DIE_FACES.contains(&roll.face));
        }
    }

    #[test]
    fn test_same_seed_same_roll() {
        let a = DiceRoll::generate(&mut StdRng::seed_from_u64(42));
        let b = DiceRoll::generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
