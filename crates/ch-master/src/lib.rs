//! Headless controller for the chords engine.
//!
//! Owns the configuration, runs the audio device on its own thread and
//! exposes the transport so a signal handler or UI can request a stop.

mod config;
pub mod csv_log;
mod error;

use ch_audio::{AudioOutput, CpalOutput};
use ch_engine::{Engine, EngineError, FillStatus, OutputSample, SampleFormat, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use ch_engine::{TransportState, Waveform};
pub use config::{Config, DEFAULT_BUFFER_SIZE};
pub use error::ControllerError;

#[cfg(feature = "alloc_check")]
pub use assert_no_alloc::AllocDisabler;

use csv_log::RingSink;

/// How often the audio thread checks for the engine's halt.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Headless controller: validates the config and manages one playback.
pub struct Controller {
    config: Config,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    transport: Arc<Transport>,
    finished: Arc<AtomicBool>,
    audio: Option<JoinHandle<Result<(), ControllerError>>>,
    logger: Option<JoinHandle<io::Result<u64>>>,
}

impl Controller {
    /// Rejects a bad config before any device is touched.
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self { config, playback: None })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Real-time playback ---

    /// Open the default device and start the ensemble. Returns once the
    /// stream is running; device errors surface here.
    pub fn play(&mut self) -> Result<Arc<Transport>, ControllerError> {
        if self.is_playing() {
            return Err(ControllerError::AlreadyPlaying);
        }
        if self.playback.is_some() {
            self.wait()?;
        }

        let config = self.config.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let (sink, logger) = if config.log_samples {
            let capacity = config.sample_rate.unwrap_or(ch_engine::config::DEFAULT_SAMPLE_RATE) as usize;
            let (sink, consumer) = csv_log::channel(capacity);
            let logger = csv_log::spawn_writer(consumer, io::stdout(), finished.clone())
                .map_err(|e| ControllerError::Spawn("csv", e))?;
            (Some(sink), Some(logger))
        } else {
            (None, None)
        };

        let done = finished.clone();
        let audio = thread::Builder::new()
            .name("chords-audio".into())
            .spawn(move || {
                let result = audio_thread(&config, sink, ready_tx);
                done.store(true, Ordering::Release);
                result
            })
            .map_err(|e| ControllerError::Spawn("audio", e))?;

        match ready_rx.recv() {
            Ok(transport) => {
                self.playback = Some(PlaybackHandle {
                    transport: transport.clone(),
                    finished,
                    audio: Some(audio),
                    logger,
                });
                Ok(transport)
            }
            // The thread gave up before the stream started.
            Err(_) => {
                finished.store(true, Ordering::Release);
                if let Some(logger) = logger {
                    let _ = logger.join();
                }
                match audio.join() {
                    Ok(Err(e)) => Err(e),
                    Ok(Ok(())) | Err(_) => Err(ControllerError::Panicked("audio")),
                }
            }
        }
    }

    /// Ask the engine to fade out over the current beat. Safe to call
    /// repeatedly. Returns whether this call began the stop.
    pub fn request_stop(&self) -> Result<bool, ControllerError> {
        let pb = self.playback.as_ref().ok_or(ControllerError::NotPlaying)?;
        let changed = pb.transport.request_stop();
        if changed {
            tracing::info!("stop requested");
        }
        Ok(changed)
    }

    pub fn transport(&self) -> Option<Arc<Transport>> {
        self.playback.as_ref().map(|pb| pb.transport.clone())
    }

    /// Block until the engine halts and the device is closed.
    pub fn wait(&mut self) -> Result<(), ControllerError> {
        let mut pb = self.playback.take().ok_or(ControllerError::NotPlaying)?;

        let result = match pb.audio.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(ControllerError::Panicked("audio")),
            None => Ok(()),
        };
        pb.finished.store(true, Ordering::Release);

        if let Some(logger) = pb.logger.take() {
            match logger.join() {
                Ok(Ok(lines)) => tracing::debug!(lines, "sample log flushed"),
                Ok(Err(e)) => tracing::warn!("sample log failed: {}", e),
                Err(_) => tracing::warn!("sample log thread panicked"),
            }
        }
        result
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Acquire))
    }

    // --- Offline rendering ---

    /// Render up to `len` samples without a device, at the configured (or
    /// default) sample rate.
    pub fn render_samples<S: OutputSample>(&self, len: usize) -> Result<Vec<S>, ControllerError> {
        let rate = self.config.sample_rate.unwrap_or(ch_engine::config::DEFAULT_SAMPLE_RATE);
        let mut engine = Engine::new(&self.config.engine_config(rate), rng(self.config.seed))?;
        Ok(engine.render(len)?)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(pb) = &self.playback {
            pb.transport.request_stop();
        }
        if self.playback.is_some() {
            let _ = self.wait();
        }
    }
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Owns the device for the whole performance. Sends the transport back once
/// the stream runs, then polls until the engine halts or the host reports
/// the stream broken.
fn audio_thread(
    config: &Config,
    sink: Option<RingSink>,
    ready: mpsc::Sender<Arc<Transport>>,
) -> Result<(), ControllerError> {
    let mut output = CpalOutput::new(config.stream_settings())?;

    let engine_config = config.engine_config(output.sample_rate());
    let engine = Engine::new(&engine_config, rng(config.seed))?;
    let transport = engine.transport();
    let dropped = sink.as_ref().map(RingSink::dropped);

    match config.format {
        SampleFormat::Unsigned8 => output.open::<u8, _>(fill_fn(engine, sink))?,
        SampleFormat::Signed8 => output.open::<i8, _>(fill_fn(engine, sink))?,
    }
    output.start()?;
    tracing::info!(
        voices = engine_config.voice_slots(),
        tempo = engine_config.tempo_bpm,
        waveform = %engine_config.waveform,
        format = %config.format,
        "playback started"
    );
    let _ = ready.send(transport);

    while !output.is_halted() {
        thread::sleep(POLL_INTERVAL);
    }

    let stream_error = output.take_stream_error();
    match output.pause() {
        Ok(()) => {}
        // A lost device cannot be paused; report why it was lost instead.
        Err(e) if stream_error.is_some() => tracing::debug!("pause after stream error: {}", e),
        Err(e) => return Err(e.into()),
    }
    output.close();

    if let Some(dropped) = dropped {
        let count = dropped.load(Ordering::Relaxed);
        if count > 0 {
            tracing::warn!(count, "sample log dropped records");
        }
    }
    if let Some(e) = stream_error {
        tracing::error!("output stream failed: {}", e);
        return Err(e.into());
    }
    if let Some(e) = output.take_error() {
        tracing::error!("engine failed: {}", e);
        return Err(e.into());
    }
    tracing::info!("playback halted");
    Ok(())
}

fn fill_fn<S: OutputSample>(
    mut engine: Engine,
    mut sink: Option<RingSink>,
) -> impl FnMut(&mut [S]) -> Result<FillStatus, EngineError> + Send + 'static {
    move |out: &mut [S]| match sink.as_mut() {
        Some(sink) => engine.fill_with(out, sink),
        None => engine.fill(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ch_engine::FULL_SCALE;

    fn seeded() -> Config {
        Config { seed: Some(11), ..Default::default() }
    }

    #[test]
    fn bad_config_never_reaches_a_device() {
        let config = Config { tempo_bpm: 0.0, ..Default::default() };
        assert!(matches!(Controller::new(config), Err(ControllerError::Config(_))));
    }

    #[test]
    fn idle_controller_has_nothing_to_stop() {
        let mut controller = Controller::new(seeded()).unwrap();
        assert!(!controller.is_playing());
        assert!(!controller.is_finished());
        assert!(controller.transport().is_none());
        assert!(matches!(controller.request_stop(), Err(ControllerError::NotPlaying)));
        assert!(matches!(controller.wait(), Err(ControllerError::NotPlaying)));
    }

    #[test]
    fn seeded_render_is_repeatable() {
        let controller = Controller::new(seeded()).unwrap();
        let a: Vec<u8> = controller.render_samples(10_000).unwrap();
        let b: Vec<u8> = controller.render_samples(10_000).unwrap();
        assert_eq!(a.len(), 10_000);
        assert_eq!(a, b);
    }

    #[test]
    fn fill_fn_feeds_the_sample_log() {
        let config = seeded().engine_config(44_100);
        let engine = Engine::new(&config, rng(Some(3))).unwrap();
        let (sink, mut consumer) = csv_log::channel(1024);
        let mut fill = fill_fn::<i8>(engine, Some(sink));

        let mut out = [0i8; 256];
        assert_eq!(fill(&mut out).unwrap(), FillStatus::Playing);

        let mut lines = Vec::new();
        assert_eq!(csv_log::drain(&mut consumer, &mut lines).unwrap(), 256);
        let text = String::from_utf8(lines).unwrap();
        for (line, &sample) in text.lines().zip(out.iter()) {
            let fields: Vec<f32> = line.split(',').map(|f| f.parse().unwrap()).collect();
            assert_eq!(fields.len(), 6);
            let output = fields[5];
            assert!(output.abs() <= FULL_SCALE);
            assert_eq!(output, f32::from(sample));
            let sum: f32 = fields[..5].iter().sum();
            assert!((sum - output).abs() < 1.01);
        }
    }
}
