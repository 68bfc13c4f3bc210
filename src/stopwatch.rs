use timer_core::{Lap, Stopwatch};

/// What the owner of the refresh pump has to do after a transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Effect {
    None,
    StartRefresh,
    StopRefresh,
}

/// Immutable snapshot handed to the view.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DisplayState {
    pub running: bool,
    pub elapsed_ms: u64,
    pub laps: Vec<Lap>,
}

pub struct StopwatchState {
    pub timer: Stopwatch,
    pub lap_scroll_offset: usize,
}

impl StopwatchState {
    pub fn new() -> Self {
        Self {
            timer: Stopwatch::new(),
            lap_scroll_offset: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn toggle(&mut self, now_ms: u64) -> Effect {
        if self.timer.is_running() {
            self.stop(now_ms)
        } else {
            self.timer.start(now_ms);
            log::debug!("stopwatch started at {} ms", self.timer.elapsed_ms(now_ms));
            Effect::StartRefresh
        }
    }

    pub fn stop(&mut self, now_ms: u64) -> Effect {
        match self.timer.stop(now_ms) {
            Some(lap) => {
                log::debug!("stopwatch stopped, closed lap {:?}", lap);
                Effect::StopRefresh
            }
            None => Effect::None,
        }
    }

    pub fn reset(&mut self) -> Effect {
        self.timer.reset();
        self.lap_scroll_offset = 0;
        log::debug!("stopwatch reset");
        Effect::StopRefresh
    }

    /// A rejected lap is logged and otherwise ignored.
    pub fn record_lap(&mut self, now_ms: u64) -> Effect {
        match self.timer.slice(now_ms) {
            Ok(lap) => {
                log::debug!("lap recorded {:?}", lap);
                // keep the newest lap in view
                self.lap_scroll_offset = 0;
            }
            Err(e) => log::warn!("error recording lap: {}", e),
        }
        Effect::None
    }

    pub fn scroll_up(&mut self) {
        self.lap_scroll_offset = self.lap_scroll_offset.saturating_sub(1);
    }

    pub fn scroll_down(&mut self, now_ms: u64) {
        let count = self.lap_count(now_ms);
        if self.lap_scroll_offset + 1 < count {
            self.lap_scroll_offset += 1;
        }
    }

    pub fn lap_count(&self, now_ms: u64) -> usize {
        let pending = usize::from(self.timer.pending_slice(now_ms).is_some());
        self.timer.completed_slices().len() + pending
    }

    pub fn snapshot(&self, now_ms: u64) -> DisplayState {
        DisplayState {
            running: self.timer.is_running(),
            elapsed_ms: self.timer.elapsed_ms(now_ms),
            laps: self.timer.completed_and_pending_slices(now_ms),
        }
    }
}
