use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};

use crate::AppEvent;

/// Owned display-refresh pump. While alive, a thread sends
/// `AppEvent::Pump(generation)` every `period`; dropping the handle stops
/// and joins that thread, so no tick is sent after the drop returns.
pub struct RefreshHandle {
    generation: u64,
    stop_tx: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn start(events: Sender<AppEvent>, period: Duration, generation: u64) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let join_handle = thread::Builder::new()
            .name(format!("refresh-pump-{}", generation))
            .spawn(move || pump_thread(stop_rx, events, period, generation))
            .context("can't spawn refresh pump")?;
        log::debug!("refresh pump {} started, period {:?}", generation, period);
        Ok(Self {
            generation,
            stop_tx,
            join_handle: Some(join_handle),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        // The pump may already be gone if the event receiver was dropped.
        let _ = self.stop_tx.try_send(());
        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                log::error!("refresh pump {} panicked", self.generation);
            }
        }
        log::debug!("refresh pump {} stopped", self.generation);
    }
}

fn pump_thread(stop_rx: Receiver<()>, events: Sender<AppEvent>, period: Duration, generation: u64) {
    let ticker = tick(period);
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if events.send(AppEvent::Pump(generation)).is_err() {
                    // Event loop is gone, nothing left to refresh.
                    break;
                }
            }
        }
    }
}
