//! Beat clock: sample position within the current beat.

/// Samples elapsed in the current beat. `position` stays in
/// `0..=length`; stepping past `length` rolls over to 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatClock {
    position: u32,
    length: u32,
}

impl BeatClock {
    pub fn new(length: u32) -> Self {
        Self { position: 0, length: length.max(1) }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Fraction of the beat elapsed, `0.0..=1.0`.
    #[inline]
    pub fn fraction(&self) -> f32 {
        self.position as f32 / self.length as f32
    }

    /// Step one sample. Returns `true` when the beat rolled over.
    #[inline]
    pub fn advance(&mut self) -> bool {
        self.position += 1;
        if self.position > self.length {
            self.position = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolls_over_after_exceeding_length() {
        let mut clock = BeatClock::new(4);
        for expected in 1..=4 {
            assert!(!clock.advance());
            assert_eq!(clock.position(), expected);
        }
        assert!(clock.advance());
        assert_eq!(clock.position(), 0);
    }

    #[test]
    fn fraction_spans_zero_to_one() {
        let mut clock = BeatClock::new(8);
        assert_eq!(clock.fraction(), 0.0);
        for _ in 0..4 {
            clock.advance();
        }
        assert_eq!(clock.fraction(), 0.5);
        for _ in 0..4 {
            clock.advance();
        }
        assert_eq!(clock.fraction(), 1.0);
    }

    #[test]
    fn zero_length_is_clamped() {
        assert_eq!(BeatClock::new(0).length(), 1);
    }
}
