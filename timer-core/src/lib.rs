//! Pure timing logic library with no platform dependencies.
//! All time arguments are monotonic milliseconds supplied by the caller,
//! so everything here is testable on host without a clock.

use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerState {
    Stopped,
    Running,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LapError {
    #[error("cannot record a lap while the stopwatch is stopped")]
    NotRunning,
}

/// One recorded interval, in stopwatch time (elapsed ms, not wall clock).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Lap {
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
}

impl Lap {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            duration_ms: end_ms.saturating_sub(start_ms),
        }
    }
}

/// Elapsed-time source. Counts only while running and keeps the list of
/// completed laps; the interval since the last boundary is the pending lap.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    pub state: TimerState,
    accumulated_ms: u64,
    segment_start_ms: u64,
    slice_start_ms: u64,
    completed: Vec<Lap>,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            state: TimerState::Stopped,
            accumulated_ms: 0,
            segment_start_ms: 0,
            slice_start_ms: 0,
            completed: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Starts or resumes counting and opens a new lap at the current
    /// elapsed time. No-op when already running.
    pub fn start(&mut self, now_ms: u64) {
        if self.state == TimerState::Running {
            return;
        }
        self.segment_start_ms = now_ms;
        self.slice_start_ms = self.accumulated_ms;
        self.state = TimerState::Running;
    }

    /// Stops counting and closes the pending lap. Returns the closed lap,
    /// or `None` if the stopwatch was already stopped.
    pub fn stop(&mut self, now_ms: u64) -> Option<Lap> {
        if self.state != TimerState::Running {
            return None;
        }
        self.accumulated_ms += now_ms.saturating_sub(self.segment_start_ms);
        self.state = TimerState::Stopped;
        let lap = Lap::new(self.slice_start_ms, self.accumulated_ms);
        self.completed.push(lap);
        self.slice_start_ms = self.accumulated_ms;
        Some(lap)
    }

    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
        self.segment_start_ms = 0;
        self.slice_start_ms = 0;
        self.completed.clear();
        self.state = TimerState::Stopped;
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.state {
            TimerState::Running => {
                self.accumulated_ms + now_ms.saturating_sub(self.segment_start_ms)
            }
            TimerState::Stopped => self.accumulated_ms,
        }
    }

    /// Closes the pending lap at the current elapsed time and opens the
    /// next one.
    pub fn slice(&mut self, now_ms: u64) -> Result<Lap, LapError> {
        if self.state != TimerState::Running {
            return Err(LapError::NotRunning);
        }
        let end = self.elapsed_ms(now_ms);
        let lap = Lap::new(self.slice_start_ms, end);
        self.completed.push(lap);
        self.slice_start_ms = end;
        Ok(lap)
    }

    pub fn completed_slices(&self) -> &[Lap] {
        &self.completed
    }

    /// The open interval since the last boundary; only exists while running.
    pub fn pending_slice(&self, now_ms: u64) -> Option<Lap> {
        match self.state {
            TimerState::Running => Some(Lap::new(self.slice_start_ms, self.elapsed_ms(now_ms))),
            TimerState::Stopped => None,
        }
    }

    pub fn completed_and_pending_slices(&self, now_ms: u64) -> Vec<Lap> {
        let mut laps = self.completed.clone();
        laps.extend(self.pending_slice(now_ms));
        laps
    }
}

/// Left-pads `num` with zeros to at least `width` digits. Wider numbers
/// are returned whole.
pub fn pad(num: u64, width: usize) -> String {
    format!("{:0width$}", num, width = width)
}

/// Format milliseconds as "HH:MM:SS:mmm". Hours never wrap, they widen.
pub fn format_hms_millis(ms: u64) -> String {
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{}:{}:{}:{}", pad(h, 2), pad(m, 2), pad(s, 2), pad(millis, 3))
}
