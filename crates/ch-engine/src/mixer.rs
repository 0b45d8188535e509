//! Main playback engine: the per-sample mixing loop.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::BeatClock;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticSink, NullSink};
use crate::error::EngineError;
use crate::sample::OutputSample;
use crate::scheduler::Scheduler;
use crate::tone::{ToneTable, PITCHES};
use crate::transport::{Transport, TransportState};
use crate::voice::{Voice, VoiceState};

/// Nominal full-scale volume of the mix (8-bit peak).
pub const FULL_SCALE: f32 = 127.0;

/// Outcome of one [`Engine::fill`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillStatus {
    /// The whole buffer was mixed; keep calling.
    Playing,
    /// The terminal beat ended after `produced` samples. The rest of the
    /// buffer is silence and the host should halt.
    Halted { produced: usize },
}

/// The generative engine: tone table, ensemble, beat clock and transport.
pub struct Engine<R = StdRng> {
    tones: ToneTable,
    scheduler: Scheduler,
    clock: BeatClock,
    transport: Arc<Transport>,
    rng: R,
    sample_rate: u32,
    /// Beat position at which the stop was first observed.
    stop_position: Option<u32>,
    // Per-voice scratch, sized once at construction.
    volumes: Vec<f32>,
    amplitudes: Vec<f32>,
    contributions: Vec<f32>,
}

impl Engine<StdRng> {
    /// Engine driven by a seeded `StdRng`.
    pub fn with_seed(config: &EngineConfig, seed: u64) -> Result<Self, EngineError> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Engine<R> {
    /// Validate `config`, render the tone table and open the ensemble.
    pub fn new(config: &EngineConfig, mut rng: R) -> Result<Self, EngineError> {
        config.validate()?;

        let tones = ToneTable::build(&PITCHES, config.waveform, config.sample_rate)?;
        let slots = config.voice_slots();
        let mut scheduler = Scheduler::new(slots, tones.len(), config.mode, config.windows);
        scheduler.open(&mut rng)?;

        Ok(Self {
            tones,
            scheduler,
            clock: BeatClock::new(config.beat_length()),
            transport: Arc::new(Transport::new()),
            rng,
            sample_rate: config.sample_rate,
            stop_position: None,
            volumes: vec![0.0; slots],
            amplitudes: vec![0.0; slots],
            contributions: vec![0.0; slots],
        })
    }

    /// Shared transport handle for whoever may request a stop.
    pub fn transport(&self) -> Arc<Transport> {
        self.transport.clone()
    }

    pub fn request_stop(&self) -> bool {
        self.transport.request_stop()
    }

    pub fn is_halted(&self) -> bool {
        self.transport.is_stopped()
    }

    pub fn tones(&self) -> &ToneTable {
        &self.tones
    }

    pub fn voices(&self) -> &[Voice] {
        self.scheduler.voices()
    }

    pub fn voice_states(&self) -> impl Iterator<Item = VoiceState> + '_ {
        self.scheduler.states()
    }

    pub fn clock(&self) -> &BeatClock {
        &self.clock
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fill `out` with consecutive samples.
    pub fn fill<S: OutputSample>(&mut self, out: &mut [S]) -> Result<FillStatus, EngineError> {
        self.fill_with(out, &mut NullSink)
    }

    /// Fill `out`, reporting every sample to `sink`.
    ///
    /// Never allocates or blocks. Samples are produced strictly in order:
    /// envelope position, cursors and the beat clock all advance per sample.
    pub fn fill_with<S, D>(&mut self, out: &mut [S], sink: &mut D) -> Result<FillStatus, EngineError>
    where
        S: OutputSample,
        D: DiagnosticSink + ?Sized,
    {
        #[cfg(feature = "alloc_check")]
        return assert_no_alloc::assert_no_alloc(|| self.fill_inner(out, sink));

        #[cfg(not(feature = "alloc_check"))]
        self.fill_inner(out, sink)
    }

    fn fill_inner<S, D>(&mut self, out: &mut [S], sink: &mut D) -> Result<FillStatus, EngineError>
    where
        S: OutputSample,
        D: DiagnosticSink + ?Sized,
    {
        for i in 0..out.len() {
            let stopping = match self.transport.state() {
                TransportState::Running => false,
                TransportState::Stopping => true,
                TransportState::Stopped => {
                    out[i..].fill(S::SILENCE);
                    return Ok(FillStatus::Halted { produced: i });
                }
            };
            if stopping && self.stop_position.is_none() {
                self.stop_position = Some(self.clock.position());
            }

            let sample = S::from_mix(self.mix_sample());
            out[i] = sample;
            sink.record(&self.contributions, sample.to_mix());

            if self.clock.advance() {
                if stopping {
                    self.transport.halt();
                    out[i + 1..].fill(S::SILENCE);
                    return Ok(FillStatus::Halted { produced: i + 1 });
                }
                self.scheduler.next_beat();
                self.scheduler.reassign(&mut self.rng)?;
            }
        }
        Ok(FillStatus::Playing)
    }

    /// Stop fade at the current position: 1 where the stop was observed,
    /// 0 at the end of the beat.
    fn stop_fade(&self) -> f32 {
        let Some(from) = self.stop_position else {
            return 1.0;
        };
        let length = self.clock.length();
        if from >= length {
            return 0.0;
        }
        (length - self.clock.position()) as f32 / (length - from) as f32
    }

    /// Mix one sample from every voice and step their cursors.
    fn mix_sample(&mut self) -> f32 {
        let t = self.clock.fraction();
        let stop_fade = self.stop_fade();

        let Self { tones, scheduler, volumes, amplitudes, contributions, .. } = self;
        let voices = scheduler.voices_mut();

        let mut total_volume = 0.0;
        for (i, voice) in voices.iter().enumerate() {
            let (volume, amplitude) = match voice.tone {
                Some(tone) if voice.is_active() => (
                    voice.volume * voice.envelope(t) * stop_fade,
                    tones[tone].amplitude(voice.cursor),
                ),
                _ => (0.0, 0.0),
            };
            volumes[i] = volume;
            amplitudes[i] = amplitude;
            total_volume += volume;
        }

        // Quiet ensembles stay quiet; only loud ones are scaled down.
        let scale = if total_volume > FULL_SCALE { FULL_SCALE / total_volume } else { 1.0 };

        let mut mixed = 0.0;
        for i in 0..voices.len() {
            contributions[i] = volumes[i] * scale * amplitudes[i];
            mixed += contributions[i];
        }

        for voice in voices.iter_mut() {
            if let Some(tone) = voice.tone {
                if voice.is_active() {
                    voice.advance_cursor(tones[tone].period);
                }
            }
        }

        mixed
    }

    /// Render `len` samples into a new buffer. Stops short at the halt.
    pub fn render<S: OutputSample>(&mut self, len: usize) -> Result<Vec<S>, EngineError> {
        let mut out = vec![S::SILENCE; len];
        if let FillStatus::Halted { produced } = self.fill(&mut out)? {
            out.truncate(produced);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositionMode;
    use crate::tone::Waveform;
    use crate::voice::VOICE_VOLUME;

    /// 44100 * 60 / 26460 = exactly 100 samples per beat.
    const FAST_TEMPO: f32 = 26_460.0;

    fn config(voices: usize) -> EngineConfig {
        EngineConfig { voices, tempo_bpm: FAST_TEMPO, ..Default::default() }
    }

    fn engine(voices: usize) -> Engine {
        Engine::with_seed(&config(voices), 99).unwrap()
    }

    /// Hold every voice on A4 (period 100) in sustain with the cursor at the
    /// sine peak.
    fn sustain_at_peak(engine: &mut Engine) {
        for voice in engine.scheduler.voices_mut() {
            voice.assign(21, -1, 10);
            voice.cursor = 25;
        }
    }

    #[derive(Default)]
    struct Capture {
        rows: Vec<(Vec<f32>, f32)>,
    }

    impl DiagnosticSink for Capture {
        fn record(&mut self, contributions: &[f32], output: f32) {
            self.rows.push((contributions.to_vec(), output));
        }
    }

    #[test]
    fn sub_threshold_mix_is_not_boosted() {
        let mut e = engine(2);
        sustain_at_peak(&mut e);
        let out: Vec<f32> = e.render(1).unwrap();
        let expected = 2.0 * VOICE_VOLUME / FULL_SCALE;
        assert!((out[0] - expected).abs() < 1e-4, "{} vs {}", out[0], expected);
    }

    #[test]
    fn loud_mix_is_scaled_to_full_scale() {
        let mut e = engine(5);
        sustain_at_peak(&mut e);
        let out: Vec<f32> = e.render(1).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-4, "{}", out[0]);
    }

    #[test]
    fn contributions_sum_to_output() {
        let mut e = engine(4);
        let mut sink = Capture::default();
        let mut out = [0i8; 500];
        e.fill_with(&mut out, &mut sink).unwrap();
        assert_eq!(sink.rows.len(), 500);
        for ((contributions, output), &written) in sink.rows.iter().zip(out.iter()) {
            assert_eq!(contributions.len(), 4);
            // The logged output is the quantized sample actually written.
            assert_eq!(*output, f32::from(written));
            let sum: f32 = contributions.iter().sum();
            assert!((sum - output).abs() < 1.0, "{} vs {}", sum, output);
        }
    }

    #[test]
    fn beat_rollover_resets_clock_and_counts_down() {
        let mut e = engine(3);
        let before: Vec<(i32, i32)> = e.voices().iter().map(|v| (v.start_beat, v.end_beat)).collect();

        // Positions 0..=100 belong to the first beat.
        let _: Vec<u8> = e.render(100).unwrap();
        assert_eq!(e.clock().position(), 100);
        let _: Vec<u8> = e.render(1).unwrap();
        assert_eq!(e.clock().position(), 0);

        // Opening notes end at beat 1, so nothing is finished yet.
        for (v, (start, end)) in e.voices().iter().zip(before) {
            assert_eq!((v.start_beat, v.end_beat), (start - 1, end - 1));
        }
    }

    #[test]
    fn cursors_advance_only_while_active() {
        let mut e = engine(2);
        e.scheduler.voices_mut()[0].assign(21, -1, 10);
        e.scheduler.voices_mut()[1].assign(21, 5, 10);
        let _: Vec<i8> = e.render(130).unwrap();
        assert_eq!(e.voices()[0].cursor, 30);
        assert_eq!(e.voices()[1].cursor, 0);
    }

    #[test]
    fn stop_at_beat_start_fades_whole_beat_then_halts() {
        let mut e = engine(5);
        assert!(e.request_stop());

        let mut out = [0.0f32; 512];
        let status = e.fill(&mut out).unwrap();
        assert_eq!(status, FillStatus::Halted { produced: 101 });
        assert!(e.is_halted());
        assert!(out[100].abs() < 1e-6);
        assert!(out[101..].iter().all(|&s| s == 0.0));

        let status = e.fill(&mut out).unwrap();
        assert_eq!(status, FillStatus::Halted { produced: 0 });
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stop_mid_beat_fades_from_current_level() {
        let mut e = engine(1);
        sustain_at_peak(&mut e);
        let _: Vec<f32> = e.render(50).unwrap();
        e.request_stop();

        let mut out = [0.0f32; 200];
        let status = e.fill(&mut out).unwrap();
        assert_eq!(status, FillStatus::Halted { produced: 51 });
        // Fade starts at the level the voice already had.
        let peak = VOICE_VOLUME / FULL_SCALE;
        for (k, s) in out.iter().take(51).enumerate() {
            let fade = (50 - k) as f32 / 50.0;
            assert!(s.abs() <= peak * fade + 1e-4, "sample {}: {}", k, s);
        }
        // Cursor 75 sits at the sine trough.
        assert!((out[0] + peak).abs() < 1e-4);
        assert!(out[50].abs() < 1e-6);
    }

    #[test]
    fn same_seed_renders_identically() {
        let mut a = Engine::with_seed(&config(5), 7).unwrap();
        let mut b = Engine::with_seed(&config(5), 7).unwrap();
        let left: Vec<u8> = a.render(20_000).unwrap();
        let right: Vec<u8> = b.render(20_000).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn showcase_plays_single_voice() {
        let config = EngineConfig {
            voices: 5,
            mode: CompositionMode::Showcase,
            waveform: Waveform::Triangle,
            tempo_bpm: FAST_TEMPO,
            ..Default::default()
        };
        let mut e = Engine::with_seed(&config, 1).unwrap();
        assert_eq!(e.voices().len(), 1);
        let _: Vec<u8> = e.render(202).unwrap();
        assert_eq!(e.voices()[0].tone, Some(1));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig { voices: 0, ..Default::default() };
        assert!(matches!(
            Engine::with_seed(&config, 0),
            Err(EngineError::Config(crate::error::ConfigError::NoVoices))
        ));
    }
}
