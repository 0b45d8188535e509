//! Voice: one independently scheduled performer.

/// Peak volume of a single voice. Five of them overdrive the 8-bit full
/// scale, which is what the mixer's scaling exists for.
pub const VOICE_VOLUME: f32 = 48.0;

/// Lifecycle state derived from a voice's beat counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// Never assigned a tone.
    #[default]
    Idle,
    /// Assigned, attack beat still in the future.
    Pending,
    /// Sounding at full volume.
    Active,
    /// Sounding through its attack or release beat.
    Fading,
    /// Release beat is over; waiting for reassignment.
    Finished,
}

/// Beat-relative state of one voice. Slots are created once and reused: a
/// finished note is replaced in place, never freed.
#[derive(Clone, Debug, Default)]
pub struct Voice {
    /// Index into the tone table, `None` until first assignment.
    pub tone: Option<usize>,
    /// Sample index into the tone's period.
    pub cursor: usize,
    /// Beats until the attack beat (0 = attack is the current beat).
    pub start_beat: i32,
    /// Beats until the release beat (0 = release is the current beat).
    pub end_beat: i32,
    /// Peak volume.
    pub volume: f32,
    /// Next pitch to play in showcase mode.
    pub showcase_index: usize,
}

impl Voice {
    /// An unassigned slot.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Give the voice a new note spanning `[start_beat, end_beat]`.
    pub fn assign(&mut self, tone: usize, start_beat: i32, end_beat: i32) {
        self.tone = Some(tone);
        self.cursor = 0;
        self.start_beat = start_beat;
        self.end_beat = end_beat;
        self.volume = VOICE_VOLUME;
    }

    /// Sounding this beat: `start_beat <= 0 <= end_beat`.
    pub fn is_active(&self) -> bool {
        self.tone.is_some() && self.start_beat <= 0 && self.end_beat >= 0
    }

    /// Release beat has passed.
    pub fn is_finished(&self) -> bool {
        self.tone.is_some() && self.end_beat < 0
    }

    pub fn state(&self) -> VoiceState {
        if self.tone.is_none() {
            VoiceState::Idle
        } else if self.end_beat < 0 {
            VoiceState::Finished
        } else if self.start_beat > 0 {
            VoiceState::Pending
        } else if self.start_beat == 0 || self.end_beat == 0 {
            VoiceState::Fading
        } else {
            VoiceState::Active
        }
    }

    /// Closed-interval overlap with `[start, end]`.
    pub fn overlaps(&self, start: i32, end: i32) -> bool {
        self.tone.is_some() && self.start_beat <= end && start <= self.end_beat
    }

    /// Move the attack to the current beat, keeping the note's length.
    pub fn start_now(&mut self) {
        self.end_beat -= self.start_beat;
        self.start_beat = 0;
    }

    /// Count down one beat.
    pub fn next_beat(&mut self) {
        self.start_beat -= 1;
        self.end_beat -= 1;
    }

    /// Step the waveform cursor, wrapping at `period`.
    #[inline]
    pub fn advance_cursor(&mut self, period: usize) {
        self.cursor += 1;
        if self.cursor >= period {
            self.cursor = 0;
        }
    }

    /// Envelope level in `[0, 1]` at fraction `t` of the current beat.
    ///
    /// Attack and release beats ramp linearly; a note whose attack and
    /// release share a beat uses the product of both ramps.
    pub fn envelope(&self, t: f32) -> f32 {
        if !self.is_active() {
            return 0.0;
        }
        let mut level = 1.0;
        if self.start_beat == 0 {
            level *= t;
        }
        if self.end_beat == 0 {
            level *= 1.0 - t;
        }
        level
    }
}
