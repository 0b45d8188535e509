//! Per-sample CSV log. The mixer pushes records into a lock-free ring
//! buffer; a plain thread drains it to the writer.

use ch_engine::config::MAX_VOICES;
use ch_engine::DiagnosticSink;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// One produced sample: each voice's contribution and the quantized output
/// sample, all on the mix scale (`u8` output is logged without its offset).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRecord {
    contributions: [f32; MAX_VOICES],
    voices: u8,
    output: f32,
}

impl SampleRecord {
    pub fn new(contributions: &[f32], output: f32) -> Self {
        let voices = contributions.len().min(MAX_VOICES);
        let mut record = Self {
            contributions: [0.0; MAX_VOICES],
            voices: voices as u8,
            output,
        };
        record.contributions[..voices].copy_from_slice(&contributions[..voices]);
        record
    }

    pub fn contributions(&self) -> &[f32] {
        &self.contributions[..self.voices as usize]
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    /// `c0,c1,...,output` followed by a newline, where `output` is the
    /// sample the device received rather than the unquantized sum.
    pub fn write_csv<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for c in self.contributions() {
            write!(w, "{:.3},", c)?;
        }
        writeln!(w, "{:.3}", self.output)
    }
}

/// Real-time side of the log. Never blocks: when the ring is full the
/// record is counted and dropped.
pub struct RingSink {
    producer: HeapProd<SampleRecord>,
    dropped: Arc<AtomicU64>,
}

impl RingSink {
    pub fn dropped(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }
}

impl DiagnosticSink for RingSink {
    fn record(&mut self, contributions: &[f32], output: f32) {
        if self.producer.try_push(SampleRecord::new(contributions, output)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Ring buffer holding `capacity` records, split into its two ends.
pub fn channel(capacity: usize) -> (RingSink, HeapCons<SampleRecord>) {
    let (producer, consumer) = HeapRb::<SampleRecord>::new(capacity.max(1)).split();
    let sink = RingSink {
        producer,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, consumer)
}

/// Write every queued record. Returns how many were written.
pub fn drain<W: Write>(consumer: &mut HeapCons<SampleRecord>, w: &mut W) -> io::Result<u64> {
    let mut written = 0;
    while let Some(record) = consumer.try_pop() {
        record.write_csv(w)?;
        written += 1;
    }
    Ok(written)
}

/// Drain `consumer` into `out` until `done` is set and the ring is empty.
pub fn spawn_writer<W>(
    mut consumer: HeapCons<SampleRecord>,
    out: W,
    done: Arc<AtomicBool>,
) -> io::Result<JoinHandle<io::Result<u64>>>
where
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name("chords-csv".into())
        .spawn(move || {
            let mut out = BufWriter::new(out);
            let mut total = 0;
            loop {
                // Checked before draining so records pushed ahead of the
                // flag are never lost.
                let finished = done.load(Ordering::Acquire);
                let written = drain(&mut consumer, &mut out)?;
                total += written;
                if finished {
                    break;
                }
                if written == 0 {
                    out.flush()?;
                    thread::sleep(IDLE_SLEEP);
                }
            }
            out.flush()?;
            Ok(total)
        })
}
