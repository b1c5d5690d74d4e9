//! Frame/millisecond conversion at the effective output rate

/// Rate multiplier applied in double-time mode
pub const DOUBLE_TIME_FACTOR: f64 = 1.5;

/// Converts between decoder frames and wall-clock milliseconds
///
/// Frames are always decoded at the native rate; double-time only changes how
/// fast the device consumes them. The effective rate is derived from the
/// native rate on every call, so toggling double-time cannot accumulate drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    native_rate: u32,
    double_time: bool,
}

impl PlaybackClock {
    /// Create a clock for a decoder running at `native_rate` Hz
    pub fn new(native_rate: u32, double_time: bool) -> Self {
        Self {
            native_rate,
            double_time,
        }
    }

    /// Same native rate, different double-time flag
    pub fn with_double_time(self, double_time: bool) -> Self {
        Self {
            double_time,
            ..self
        }
    }

    /// Native sample rate of the decoded file
    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }

    /// Whether double-time is applied
    pub fn double_time(&self) -> bool {
        self.double_time
    }

    /// Frames consumed per second by the output
    pub fn effective_rate(&self) -> f64 {
        let native = f64::from(self.native_rate);
        if self.double_time {
            native * DOUBLE_TIME_FACTOR
        } else {
            native
        }
    }

    /// Effective rate rounded to whole Hz, for opening device streams
    pub fn output_rate_hz(&self) -> u32 {
        self.effective_rate().round() as u32
    }

    /// Milliseconds elapsed after `frames` frames
    pub fn frames_to_ms(&self, frames: u64) -> f64 {
        let rate = self.effective_rate();
        if rate > 0.0 {
            frames as f64 / rate * 1000.0
        } else {
            0.0
        }
    }

    /// Frame reached after `ms` milliseconds (truncated, never negative)
    pub fn ms_to_frame(&self, ms: f64) -> u64 {
        if ms <= 0.0 || !ms.is_finite() {
            return 0;
        }
        (ms / 1000.0 * self.effective_rate()) as u64
    }
}
