//! Output sample representations.

use core::fmt;
use core::str::FromStr;

use crate::mixer::FULL_SCALE;

/// A sample type the mixer can write. `from_mix` receives the mixed value
/// on the nominal `[-FULL_SCALE, FULL_SCALE]` scale.
pub trait OutputSample: Copy + Send + 'static {
    /// Value written for silence.
    const SILENCE: Self;

    fn from_mix(value: f32) -> Self;

    /// The written sample back on the mix scale, after quantization.
    fn to_mix(self) -> f32;
}

/// Signed 8-bit, truncated toward zero.
impl OutputSample for i8 {
    const SILENCE: Self = 0;

    #[inline]
    fn from_mix(value: f32) -> Self {
        (value as i32).clamp(-127, 127) as i8
    }

    #[inline]
    fn to_mix(self) -> f32 {
        f32::from(self)
    }
}

/// Unsigned 8-bit, offset by 127.
impl OutputSample for u8 {
    const SILENCE: Self = 127;

    #[inline]
    fn from_mix(value: f32) -> Self {
        ((value as i32).clamp(-127, 127) + 127) as u8
    }

    #[inline]
    fn to_mix(self) -> f32 {
        f32::from(self) - 127.0
    }
}

/// Normalized float, unquantized.
impl OutputSample for f32 {
    const SILENCE: Self = 0.0;

    #[inline]
    fn from_mix(value: f32) -> Self {
        (value / FULL_SCALE).clamp(-1.0, 1.0)
    }

    #[inline]
    fn to_mix(self) -> f32 {
        self * FULL_SCALE
    }
}

/// 8-bit sample format requested from the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    #[default]
    Unsigned8,
    Signed8,
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::Unsigned8 => f.write_str("u8"),
            SampleFormat::Signed8 => f.write_str("i8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown sample format (expected u8 or i8)")]
pub struct ParseSampleFormatError;

impl FromStr for SampleFormat {
    type Err = ParseSampleFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u8" | "U8" | "unsigned8" => Ok(SampleFormat::Unsigned8),
            "i8" | "I8" | "signed8" | "s8" => Ok(SampleFormat::Signed8),
            _ => Err(ParseSampleFormatError),
        }
    }
}
