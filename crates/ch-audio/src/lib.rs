//! Audio output backends for the chords engine.

mod cpal_backend;
mod traits;

pub use cpal_backend::{CpalOutput, StreamSettings};
pub use traits::{AudioError, AudioOutput};
