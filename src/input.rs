use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use crossterm::event::{self, Event};

use crate::AppEvent;

const INPUT_POLL: Duration = Duration::from_millis(50);

/// Terminal input reader. Forwards keys, focus changes and resizes to the
/// event loop until dropped.
pub struct InputHandle {
    stop_tx: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl InputHandle {
    pub fn start(events: Sender<AppEvent>) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let join_handle = thread::Builder::new()
            .name("input".into())
            .spawn(move || input_thread(stop_rx, events))
            .context("can't spawn input thread")?;
        Ok(Self {
            stop_tx,
            join_handle: Some(join_handle),
        })
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(jh) = self.join_handle.take() {
            let _ = jh.join();
        }
    }
}

fn translate(ev: Event) -> Option<AppEvent> {
    match ev {
        Event::Key(key) => Some(AppEvent::Key(key)),
        Event::FocusGained => Some(AppEvent::FocusGained),
        Event::FocusLost => Some(AppEvent::FocusLost),
        Event::Resize(_, _) => Some(AppEvent::Resize),
        _ => None,
    }
}

fn input_thread(stop_rx: Receiver<()>, events: Sender<AppEvent>) {
    loop {
        if stop_rx.try_recv() != Err(TryRecvError::Empty) {
            break;
        }
        let ev = match event::poll(INPUT_POLL) {
            Ok(false) => continue,
            Ok(true) => match event::read() {
                Ok(ev) => match translate(ev) {
                    Some(ev) => ev,
                    None => continue,
                },
                Err(e) => {
                    log::error!("can't read terminal event: {}", e);
                    AppEvent::Quit
                }
            },
            Err(e) => {
                log::error!("can't poll terminal: {}", e);
                AppEvent::Quit
            }
        };
        let quit = matches!(ev, AppEvent::Quit);
        if events.send(ev).is_err() || quit {
            break;
        }
    }
}
