//! Per-sample diagnostic side channel.

/// Receives each voice's mixed contribution and the sample actually written,
/// both on the mix scale, for every produced sample. Called on the
/// real-time path, so implementations must not block or allocate.
pub trait DiagnosticSink {
    fn record(&mut self, contributions: &[f32], output: f32);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    #[inline]
    fn record(&mut self, _contributions: &[f32], _output: f32) {}
}
