//! chords: a generative ambient chord player.
//!
//! A handful of voices drift over a fixed pitch table, each new note picked
//! to avoid clashing with what is already sounding. Ctrl-C fades everything
//! out over the current beat and exits.

use anyhow::{Context, Result};
use ch_master::{Config, Controller, DEFAULT_BUFFER_SIZE};
use ch_engine::{SampleFormat, Waveform};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(feature = "alloc_check")]
#[global_allocator]
static ALLOC: ch_master::AllocDisabler = ch_master::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "chords")]
#[command(about = "Generative ambient chords", long_about = None)]
struct Args {
    /// Number of simultaneous voices
    #[arg(short, long, default_value_t = 5)]
    voices: usize,

    /// Tempo in beats per minute
    #[arg(short, long, default_value_t = 60.0)]
    tempo: f32,

    /// sine, triangle, square or sawtooth
    #[arg(short, long, default_value = "sine")]
    waveform: Waveform,

    /// Engine sample format: u8 or i8
    #[arg(short, long, default_value = "u8")]
    format: SampleFormat,

    /// Walk every pitch in order with a single voice
    #[arg(long)]
    showcase: bool,

    /// Print each voice's contribution and the mix for every sample as CSV
    #[arg(short, long)]
    log: bool,

    /// Seed for a reproducible performance
    #[arg(long)]
    seed: Option<u64>,

    /// Override the device sample rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Host buffer size in frames (0 = device default)
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: u32,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            voices: args.voices,
            tempo_bpm: args.tempo,
            waveform: args.waveform,
            format: args.format,
            showcase: args.showcase,
            log_samples: args.log,
            sample_rate: args.sample_rate,
            buffer_size: args.buffer_size,
            seed: args.seed,
        }
    }
}

fn main() -> Result<()> {
    // stdout carries the sample log, so diagnostics go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chords=info,ch_master=info,ch_audio=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Args::parse();
    let mut controller = Controller::new(args.into()).context("invalid options")?;

    let transport = controller.play().context("failed to start playback")?;
    ctrlc::set_handler(move || {
        transport.request_stop();
    })
    .context("failed to install Ctrl-C handler")?;

    tracing::info!("playing, press Ctrl-C to stop");
    controller.wait().context("playback failed")?;
    Ok(())
}
