//! Precomputed one-period waveform tables.

use alloc::vec::Vec;
use arrayvec::ArrayString;
use core::f32::consts::PI;
use core::fmt;
use core::str::FromStr;

use crate::error::EngineError;

/// Shortest period a tone table may hold. Anything shorter cannot carry the
/// quarter-period plateau of the square shape.
pub const MIN_PERIOD: usize = 4;

/// Waveform shape used for every tone in a table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Triangle,
        Waveform::Square,
        Waveform::Sawtooth,
    ];

    /// Amplitude at sample `i` of a `period`-sample cycle.
    pub fn sample(self, i: usize, period: usize) -> f32 {
        let phase = i as f32 / period as f32;
        match self {
            Waveform::Sine => libm::sinf(2.0 * PI * phase),
            // 0 -> 1 over the first half, mirrored back to 0.
            Waveform::Triangle => 1.0 - libm::fabsf(2.0 * phase - 1.0),
            // Plateau over the central half; zero at both ends so the buffer
            // wraps without a step.
            Waveform::Square => {
                let quarter = period / 4;
                if i >= quarter && i < period - quarter {
                    1.0
                } else {
                    0.0
                }
            }
            // Rising ramp over the first half, reset at the midpoint, then
            // the same ramp negated.
            Waveform::Sawtooth => {
                let half = (period / 2).max(1);
                if i < half {
                    i as f32 / half as f32
                } else {
                    -((i - half) as f32 / half as f32)
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown waveform {0:?} (expected sine, triangle, square or sawtooth)")]
pub struct ParseWaveformError(pub ArrayString<16>);

impl FromStr for Waveform {
    type Err = ParseWaveformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Waveform::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseWaveformError(truncated(s)))
    }
}

/// An entry of the fixed pitch table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pitch {
    pub label: &'static str,
    pub frequency: f32,
}

const fn pitch(label: &'static str, frequency: f32) -> Pitch {
    Pitch { label, frequency }
}

/// Three chromatic octaves, C3 through B5.
pub const PITCHES: [Pitch; 36] = [
    pitch("C3", 130.81),
    pitch("C#3", 138.59),
    pitch("D3", 146.83),
    pitch("D#3", 155.56),
    pitch("E3", 164.81),
    pitch("F3", 174.61),
    pitch("F#3", 185.00),
    pitch("G3", 196.00),
    pitch("G#3", 207.65),
    pitch("A3", 220.00),
    pitch("A#3", 233.08),
    pitch("B3", 246.94),
    pitch("C4", 261.63),
    pitch("C#4", 277.18),
    pitch("D4", 293.66),
    pitch("D#4", 311.13),
    pitch("E4", 329.63),
    pitch("F4", 349.23),
    pitch("F#4", 369.99),
    pitch("G4", 392.00),
    pitch("G#4", 415.30),
    pitch("A4", 440.00),
    pitch("A#4", 466.16),
    pitch("B4", 493.88),
    pitch("C5", 523.25),
    pitch("C#5", 554.37),
    pitch("D5", 587.33),
    pitch("D#5", 622.25),
    pitch("E5", 659.26),
    pitch("F5", 698.46),
    pitch("F#5", 739.99),
    pitch("G5", 783.99),
    pitch("G#5", 830.61),
    pitch("A5", 880.00),
    pitch("A#5", 932.33),
    pitch("B5", 987.77),
];

/// One pitch rendered as a single period of its waveform.
#[derive(Clone, Debug)]
pub struct Tone {
    pub label: ArrayString<8>,
    pub frequency: f32,
    /// Period in samples; always equals `samples.len()`.
    pub period: usize,
    samples: Vec<f32>,
}

impl Tone {
    /// Render one period of `waveform` for `pitch` at `sample_rate`.
    pub fn render(pitch: &Pitch, waveform: Waveform, sample_rate: u32) -> Result<Self, EngineError> {
        let period = libm::roundf(sample_rate as f32 / pitch.frequency) as usize;
        if period < MIN_PERIOD {
            return Err(EngineError::DegeneratePeriod {
                label: pitch.label,
                period,
                min: MIN_PERIOD,
            });
        }

        let samples = (0..period).map(|i| waveform.sample(i, period)).collect();
        Ok(Self { label: truncated(pitch.label), frequency: pitch.frequency, period, samples })
    }

    /// Amplitude at `cursor`, wrapping at the period.
    #[inline]
    pub fn amplitude(&self, cursor: usize) -> f32 {
        self.samples[cursor % self.period]
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Longest prefix of `s` that fits, cut on a char boundary.
fn truncated<const N: usize>(s: &str) -> ArrayString<N> {
    let mut out = ArrayString::new();
    for c in s.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}

/// Every pitch of the ensemble, rendered once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct ToneTable {
    tones: Vec<Tone>,
    waveform: Waveform,
}

impl ToneTable {
    pub fn build(pitches: &[Pitch], waveform: Waveform, sample_rate: u32) -> Result<Self, EngineError> {
        let tones = pitches
            .iter()
            .map(|p| Tone::render(p, waveform, sample_rate))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tones, waveform })
    }

    pub fn len(&self) -> usize {
        self.tones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tone> {
        self.tones.get(index)
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tone> {
        self.tones.iter()
    }
}

impl core::ops::Index<usize> for ToneTable {
    type Output = Tone;

    fn index(&self, index: usize) -> &Tone {
        &self.tones[index]
    }
}
