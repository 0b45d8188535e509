//! Dissonance-weighted pitch selection.
//!
//! Every pitch starts with weight 1. Each other voice whose note overlaps the
//! candidate interval multiplies the weights by [`DISSONANCE_PROFILE`], indexed
//! by the semitone distance from that voice's pitch. A single draw over the
//! folded weights picks the pitch, so a candidate has to sit well against
//! every overlapping note, not just the latest one.

use alloc::vec;
use alloc::vec::Vec;
use rand::Rng;

use crate::error::EngineError;
use crate::voice::Voice;

/// Relative weight per interval, indexed by
/// `(other pitch - candidate pitch) mod 12`.
pub const DISSONANCE_PROFILE: [u64; 12] = [
    8, // unison / octave
    1, // minor second below, major seventh above
    2, // major second below
    5, // minor third below
    5, // major third below
    7, // fourth below, fifth above
    1, // tritone
    7, // fifth below, fourth above
    6, // minor sixth below
    6, // major sixth below
    2, // minor seventh below
    1, // major seventh below, minor second above
];

/// Reusable weight scratch for one tone table. Allocated once so the draw
/// can run inside the mixer.
#[derive(Clone, Debug)]
pub struct NoteSelector {
    weights: Vec<u64>,
}

impl NoteSelector {
    pub fn new(table_len: usize) -> Self {
        Self { weights: vec![1; table_len] }
    }

    /// Fold every voice other than `assigning` that overlaps `[start, end]`
    /// into the weight array and return it.
    pub fn fold_weights(
        &mut self,
        voices: &[Voice],
        assigning: usize,
        start: i32,
        end: i32,
    ) -> Result<&[u64], EngineError> {
        self.weights.fill(1);
        let len = self.weights.len() as i64;

        for (i, voice) in voices.iter().enumerate() {
            if i == assigning || !voice.overlaps(start, end) {
                continue;
            }
            let Some(other) = voice.tone else { continue };

            for (candidate, weight) in self.weights.iter_mut().enumerate() {
                let distance = (other as i64 - candidate as i64).rem_euclid(len);
                let factor = DISSONANCE_PROFILE[(distance % 12) as usize];
                *weight = weight.checked_mul(factor).ok_or(EngineError::WeightOverflow(i))?;
            }
        }

        Ok(&self.weights)
    }

    /// Pick a pitch index for voice `assigning` over `[start, end]`.
    pub fn pick_pitch<R: Rng + ?Sized>(
        &mut self,
        voices: &[Voice],
        assigning: usize,
        start: i32,
        end: i32,
        rng: &mut R,
    ) -> Result<usize, EngineError> {
        let weights = self.fold_weights(voices, assigning, start, end)?;
        let total = weights
            .iter()
            .try_fold(0u64, |acc, &w| acc.checked_add(w))
            .ok_or(EngineError::WeightOverflow(assigning))?;
        if total == 0 {
            return Err(EngineError::NoCandidate);
        }

        let mut remaining = rng.random_range(1..=total);
        for (index, &weight) in weights.iter().enumerate() {
            if remaining <= weight {
                return Ok(index);
            }
            remaining -= weight;
        }
        Err(EngineError::NoCandidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TABLE: usize = 36;

    fn sounding(tone: usize, start: i32, end: i32) -> Voice {
        let mut v = Voice::idle();
        v.assign(tone, start, end);
        v
    }

    #[test]
    fn lone_voice_gets_uniform_weights() {
        let voices = [sounding(4, 0, 3)];
        let mut selector = NoteSelector::new(TABLE);
        let weights = selector.fold_weights(&voices, 0, 0, 3).unwrap();
        assert_eq!(weights.len(), TABLE);
        assert!(weights.iter().all(|&w| w == 1));
    }

    #[test]
    fn non_overlapping_voices_are_ignored() {
        let voices = [sounding(4, 5, 8), sounding(9, -3, -1), Voice::idle(), Voice::idle()];
        let mut selector = NoteSelector::new(TABLE);
        let weights = selector.fold_weights(&voices, 3, 0, 4).unwrap();
        assert!(weights.iter().all(|&w| w == 1));
    }

    #[test]
    fn overlapping_voice_applies_profile() {
        let voices = [sounding(12, 0, 4), Voice::idle()];
        let mut selector = NoteSelector::new(TABLE);
        let weights = selector.fold_weights(&voices, 1, 2, 6).unwrap();
        assert_eq!(weights[12], DISSONANCE_PROFILE[0]);
        assert_eq!(weights[13], DISSONANCE_PROFILE[11]);
        assert_eq!(weights[19], DISSONANCE_PROFILE[5]);
        assert_eq!(weights[24], DISSONANCE_PROFILE[0]);
    }

    #[test]
    fn weights_multiply_across_voices() {
        let voices = [sounding(0, 0, 4), sounding(7, 0, 4), Voice::idle()];
        let mut selector = NoteSelector::new(TABLE);
        let weights = selector.fold_weights(&voices, 2, 0, 4).unwrap();
        // Candidate 4: distance 8 from C, 3 from G.
        assert_eq!(weights[4], DISSONANCE_PROFILE[8] * DISSONANCE_PROFILE[3]);
    }

    #[test]
    fn single_voice_draw_is_uniform() {
        let voices = [Voice::idle()];
        let mut selector = NoteSelector::new(TABLE);
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = [0u32; TABLE];
        let draws = 36_000;
        for _ in 0..draws {
            counts[selector.pick_pitch(&voices, 0, 0, 2, &mut rng).unwrap()] += 1;
        }
        for &c in &counts {
            assert!((700..1300).contains(&c), "count {} far from uniform", c);
        }
    }

    #[test]
    fn semitone_is_drawn_far_less_than_fifth() {
        let voices = [sounding(12, 0, 4), Voice::idle()];
        let mut selector = NoteSelector::new(TABLE);
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 30_000u32;
        let mut counts = [0u32; TABLE];
        for _ in 0..draws {
            counts[selector.pick_pitch(&voices, 1, 1, 3, &mut rng).unwrap()] += 1;
        }

        // Every residue class appears three times in 36 pitches.
        let total: u64 = DISSONANCE_PROFILE.iter().sum::<u64>() * 3;
        let expected = |weight: u64| draws as f64 * weight as f64 / total as f64;

        let semitone = counts[13] as f64;
        let fifth = counts[19] as f64;
        assert!(fifth > 3.0 * semitone, "fifth {} vs semitone {}", fifth, semitone);
        assert!((fifth - expected(DISSONANCE_PROFILE[5])).abs() < expected(DISSONANCE_PROFILE[5]) * 0.2);
        assert!((semitone - expected(DISSONANCE_PROFILE[11])).abs() < expected(DISSONANCE_PROFILE[11]) * 0.5);
    }

    #[test]
    fn same_seed_same_choice() {
        let voices = [sounding(3, -1, 2), sounding(10, 0, 5), Voice::idle()];
        let mut a = NoteSelector::new(TABLE);
        let mut b = NoteSelector::new(TABLE);
        let mut rng_a = StdRng::seed_from_u64(2024);
        let mut rng_b = StdRng::seed_from_u64(2024);
        for _ in 0..100 {
            assert_eq!(
                a.pick_pitch(&voices, 2, 1, 4, &mut rng_a).unwrap(),
                b.pick_pitch(&voices, 2, 1, 4, &mut rng_b).unwrap()
            );
        }
    }

    #[test]
    fn walk_always_lands_in_table() {
        let voices = [sounding(0, 0, 9), sounding(5, 0, 9), sounding(11, 0, 9), Voice::idle()];
        let mut selector = NoteSelector::new(TABLE);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..5_000 {
            let pick = selector.pick_pitch(&voices, 3, 0, 9, &mut rng).unwrap();
            assert!(pick < TABLE);
        }
    }
}
