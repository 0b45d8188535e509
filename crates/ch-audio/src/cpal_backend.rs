//! CPAL-based audio output backend.

use ch_engine::{EngineError, FillStatus, OutputSample};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::{AudioError, AudioOutput};

/// Mono samples pulled from the engine per step of the callback.
const CHUNK: usize = 256;

/// Overrides applied on top of the device's default output config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSettings {
    pub sample_rate: Option<u32>,
    /// Host buffer size in frames.
    pub buffer_size: Option<u32>,
}

/// CPAL-based audio output.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    format: SampleFormat,
    stream: Option<Stream>,
    halted: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<EngineError>>>,
    stream_failure: Arc<Mutex<Option<AudioError>>>,
}

impl CpalOutput {
    /// Create a new CPAL output on the default device.
    pub fn new(settings: StreamSettings) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let format = supported.sample_format();

        let mut config: StreamConfig = supported.into();
        if let Some(rate) = settings.sample_rate {
            config.sample_rate = SampleRate(rate);
        }
        if let Some(frames) = settings.buffer_size {
            config.buffer_size = BufferSize::Fixed(frames);
        }

        let name = device.name().unwrap_or_else(|_| String::from("unknown"));
        tracing::info!(
            device = %name,
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = %format,
            "opened output device"
        );

        Ok(Self {
            device,
            config,
            format,
            stream: None,
            halted: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
            stream_failure: Arc::new(Mutex::new(None)),
        })
    }

    /// Build the output stream around `fill`, paused. `fill` is called on the
    /// device thread with mono buffers; once it reports a halt or an error it
    /// is never called again and the device is fed silence.
    pub fn open<S, F>(&mut self, fill: F) -> Result<(), AudioError>
    where
        S: OutputSample + Sample,
        F: FnMut(&mut [S]) -> Result<FillStatus, EngineError> + Send + 'static,
        f32: FromSample<S>,
        i16: FromSample<S>,
        u16: FromSample<S>,
        i8: FromSample<S>,
        u8: FromSample<S>,
    {
        self.close();
        self.halted.store(false, Ordering::Release);
        if let Ok(mut slot) = self.stream_failure.lock() {
            *slot = None;
        }

        let stream = match self.format {
            SampleFormat::F32 => self.build::<f32, S, F>(fill)?,
            SampleFormat::I16 => self.build::<i16, S, F>(fill)?,
            SampleFormat::U16 => self.build::<u16, S, F>(fill)?,
            SampleFormat::I8 => self.build::<i8, S, F>(fill)?,
            SampleFormat::U8 => self.build::<u8, S, F>(fill)?,
            other => return Err(AudioError::UnsupportedFormat(other.to_string())),
        };
        // Some hosts start streams on creation.
        if let Err(e) = stream.pause() {
            tracing::debug!("could not pause new stream: {}", e);
        }
        self.stream = Some(stream);
        Ok(())
    }

    fn build<T, S, F>(&self, mut fill: F) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<S>,
        S: OutputSample,
        F: FnMut(&mut [S]) -> Result<FillStatus, EngineError> + Send + 'static,
    {
        let channels = self.config.channels as usize;
        let halted = self.halted.clone();
        let failure = self.failure.clone();
        let error_halted = self.halted.clone();
        let stream_failure = self.stream_failure.clone();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    write_interleaved(data, channels, &halted, &failure, &mut fill);
                },
                move |err| on_stream_error(err, &error_halted, &stream_failure),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))
    }

    /// Engine error raised inside the callback, if any.
    pub fn take_error(&self) -> Option<EngineError> {
        self.failure.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Host-side stream failure, if any. The stream is halted once one is
    /// reported.
    pub fn take_stream_error(&self) -> Option<AudioError> {
        self.stream_failure.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Error callback. Runs off the real-time path, so it may lock.
fn on_stream_error(err: cpal::StreamError, halted: &AtomicBool, slot: &Mutex<Option<AudioError>>) {
    tracing::error!("audio stream error: {}", err);
    if let Ok(mut slot) = slot.lock() {
        slot.get_or_insert(AudioError::Stream(err.to_string()));
    }
    halted.store(true, Ordering::Release);
}

/// Pull mono samples from `fill` and spread each across `channels`.
fn write_interleaved<T, S, F>(
    data: &mut [T],
    channels: usize,
    halted: &AtomicBool,
    failure: &Mutex<Option<EngineError>>,
    fill: &mut F,
) where
    T: Sample + FromSample<S>,
    S: OutputSample,
    F: FnMut(&mut [S]) -> Result<FillStatus, EngineError>,
{
    let channels = channels.max(1);
    let mut scratch = [S::SILENCE; CHUNK];

    for block in data.chunks_mut(CHUNK * channels) {
        if halted.load(Ordering::Acquire) {
            block.fill(T::EQUILIBRIUM);
            continue;
        }

        let mono = &mut scratch[..block.len().div_ceil(channels)];
        match fill(mono) {
            Ok(FillStatus::Playing) => {}
            Ok(FillStatus::Halted { .. }) => halted.store(true, Ordering::Release),
            Err(err) => {
                // Never block the device thread; the first error wins.
                if let Ok(mut slot) = failure.try_lock() {
                    slot.get_or_insert(err);
                }
                halted.store(true, Ordering::Release);
                mono.fill(S::SILENCE);
            }
        }

        for (frame, &sample) in block.chunks_mut(channels).zip(mono.iter()) {
            frame.fill(T::from_sample(sample));
        }
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotOpen)?;
        stream.play().map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotOpen)?;
        stream.pause().map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("output stream closed");
        }
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}
