//! Transport: the run/stop state shared with whatever triggers a stop.

use core::sync::atomic::{AtomicU8, Ordering};

/// Global run state of the performance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    #[default]
    Running = 0,
    /// No new notes; every sounding voice fades out over the current beat.
    Stopping = 1,
    /// Last beat rendered; the host should halt and release the device.
    Stopped = 2,
}

impl TransportState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransportState::Running,
            1 => TransportState::Stopping,
            _ => TransportState::Stopped,
        }
    }
}

/// Lock-free transport flag. The mixer reads it once per sample; a signal
/// handler or UI thread may call [`Transport::request_stop`] at any time.
#[derive(Debug, Default)]
pub struct Transport {
    state: AtomicU8,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Ask for a graceful stop. Only moves RUNNING to STOPPING; repeated
    /// calls are no-ops. Returns whether this call changed the state.
    pub fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(
                TransportState::Running as u8,
                TransportState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_stopping(&self) -> bool {
        self.state() == TransportState::Stopping
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == TransportState::Stopped
    }

    /// Terminal beat finished.
    pub(crate) fn halt(&self) {
        self.state.store(TransportState::Stopped as u8, Ordering::Release);
    }
}
