mod clock;
mod config;
mod input;
mod pump;
mod stopwatch;
mod ui;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{Args, Config};
use crate::input::InputHandle;
use crate::pump::RefreshHandle;
use crate::stopwatch::{Effect, StopwatchState};

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    FocusGained,
    FocusLost,
    Resize,
    Pump(u64),
    Quit,
}

struct LapTimerApp<B: Backend, C: Clock> {
    terminal: Terminal<B>,
    clock: C,
    events: Sender<AppEvent>,
    config: Config,

    stopwatch: StopwatchState,

    pump: Option<RefreshHandle>,
    pump_generation: u64,
    allow_redraw: bool,
    frames_drawn: u64,
    help_visible: bool,
    confirm_exit: bool,
    quit: bool,
}

impl<B: Backend, C: Clock> LapTimerApp<B, C> {
    fn new(terminal: Terminal<B>, clock: C, events: Sender<AppEvent>, config: Config) -> Self {
        Self {
            terminal,
            clock,
            events,
            config,
            stopwatch: StopwatchState::new(),
            pump: None,
            pump_generation: 0,
            allow_redraw: true,
            frames_drawn: 0,
            help_visible: false,
            confirm_exit: false,
            quit: false,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn should_quit(&self) -> bool {
        self.quit
    }

    fn redraw(&mut self) -> Result<()> {
        if !self.allow_redraw {
            return Ok(());
        }
        let state = self.stopwatch.snapshot(self.now_ms());
        let offset = self.stopwatch.lap_scroll_offset;
        let help_visible = self.help_visible;
        let confirm_exit = self.confirm_exit;
        self.terminal
            .draw(|f| {
                ui::draw_stopwatch(f, &state, offset);
                if confirm_exit {
                    ui::draw_confirm_exit(f);
                } else if help_visible {
                    ui::draw_help(f);
                }
            })
            .context("can't draw")?;
        self.frames_drawn += 1;
        Ok(())
    }

    fn start_pump(&mut self) -> Result<()> {
        // Unfocused: FocusGained restarts it if still running.
        if !self.allow_redraw {
            return Ok(());
        }
        if self.pump.is_none() {
            self.pump_generation += 1;
            self.pump = Some(RefreshHandle::start(
                self.events.clone(),
                self.config.refresh_period,
                self.pump_generation,
            )?);
        }
        Ok(())
    }

    fn stop_pump(&mut self) {
        // Dropping the handle joins the pump thread.
        self.pump = None;
    }

    fn apply(&mut self, effect: Effect) -> Result<()> {
        match effect {
            Effect::StartRefresh => self.start_pump()?,
            Effect::StopRefresh => self.stop_pump(),
            Effect::None => {}
        }
        self.redraw()
    }

    fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::FocusLost => {
                log::debug!("focus lost");
                self.allow_redraw = false;
                self.stop_pump();
                Ok(())
            }
            AppEvent::FocusGained => {
                log::debug!("focus gained");
                self.allow_redraw = true;
                if self.stopwatch.is_running() {
                    self.start_pump()?;
                }
                self.redraw()
            }
            AppEvent::Resize => self.redraw(),
            AppEvent::Pump(generation) => self.handle_pump(generation),
            AppEvent::Quit => {
                self.quit = true;
                Ok(())
            }
        }
    }

    fn handle_pump(&mut self, generation: u64) -> Result<()> {
        let current = self.pump.as_ref().map(|p| p.generation());
        if current != Some(generation) {
            log::trace!("dropping stale tick from pump {}", generation);
            return Ok(());
        }
        self.redraw()
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.shutdown();
            return Ok(());
        }

        // If help screen is showing, any key dismisses it
        if self.help_visible {
            self.help_visible = false;
            return self.redraw();
        }

        if self.confirm_exit {
            match key.code {
                KeyCode::Char('y') => self.shutdown(),
                KeyCode::Char('n') | KeyCode::Esc | KeyCode::F(4) => {
                    self.confirm_exit = false;
                    self.redraw()?;
                }
                _ => {}
            }
            return Ok(());
        }

        let now = self.now_ms();
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('s') | KeyCode::F(2) => {
                let effect = self.stopwatch.toggle(now);
                self.apply(effect)?;
            }
            KeyCode::Char('r') | KeyCode::F(3) => {
                let effect = self.stopwatch.reset();
                self.apply(effect)?;
            }
            KeyCode::Char('l') | KeyCode::F(5) => {
                let effect = self.stopwatch.record_lap(now);
                self.apply(effect)?;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.stopwatch.scroll_up();
                self.redraw()?;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.stopwatch.scroll_down(now);
                self.redraw()?;
            }
            KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => {
                self.help_visible = true;
                self.redraw()?;
            }
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::F(4) => {
                if self.stopwatch.is_running() {
                    self.confirm_exit = true;
                    self.redraw()?;
                } else {
                    self.shutdown();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        let now = self.now_ms();
        self.stopwatch.stop(now);
        self.stop_pump();
        self.confirm_exit = false;
        self.quit = true;
    }
}

fn run<B: Backend, C: Clock>(app: &mut LapTimerApp<B, C>, events: &Receiver<AppEvent>) -> Result<()> {
    app.redraw()?;
    while !app.should_quit() {
        let event = events.recv().context("event channel closed")?;
        app.handle_event(event)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::from(Args::parse());
    config::init_logging(&config)?;
    log::info!("laptimer PID is {}", std::process::id());
    log::info!("refresh period {:?}", config.refresh_period);

    let (tx, rx) = unbounded();

    // Declared first so it restores the terminal last.
    let guard = ui::TerminalGuard::enter()?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout())).context("can't set up terminal")?;
    let input = InputHandle::start(tx.clone())?;
    let mut app = LapTimerApp::new(terminal, MonotonicClock::new(), tx, config);

    let result = run(&mut app, &rx);
    app.shutdown();
    log::info!("exiting after {} frames", app.frames_drawn);

    drop(app);
    drop(input);
    drop(guard);
    if let Err(e) = &result {
        log::error!("laptimer failed: {:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crossbeam_channel::TryRecvError;
    use ratatui::backend::TestBackend;
    use std::time::Duration;
    use timer_core::Lap;

    fn test_config() -> Config {
        Config {
            refresh_period: Duration::from_millis(2),
            log_file: std::env::temp_dir().join("laptimer-test.log"),
            log_level: "off".into(),
        }
    }

    fn new_app() -> (LapTimerApp<TestBackend, ManualClock>, ManualClock, Receiver<AppEvent>) {
        let (tx, rx) = unbounded();
        let clock = ManualClock::default();
        let terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let app = LapTimerApp::new(terminal, clock.clone(), tx, test_config());
        (app, clock, rx)
    }

    fn press(app: &mut LapTimerApp<TestBackend, ManualClock>, code: KeyCode) {
        app.handle_event(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
            .unwrap();
    }

    fn wait_for_tick(rx: &Receiver<AppEvent>) -> u64 {
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            AppEvent::Pump(generation) => generation,
            other => panic!("unexpected event {:?}", other),
        }
    }

    fn assert_no_more_ticks(rx: &Receiver<AppEvent>) {
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn test_toggle_starts_and_stops_refresh() {
        let (mut app, clock, rx) = new_app();
        press(&mut app, KeyCode::Char(' '));
        assert!(app.stopwatch.is_running());
        assert!(app.pump.is_some());
        let generation = wait_for_tick(&rx);

        let before = app.frames_drawn;
        app.handle_event(AppEvent::Pump(generation)).unwrap();
        assert_eq!(app.frames_drawn, before + 1);

        clock.set(1500);
        press(&mut app, KeyCode::Char(' '));
        assert!(!app.stopwatch.is_running());
        assert!(app.pump.is_none());
        assert_no_more_ticks(&rx);

        let state = app.stopwatch.snapshot(clock.now_ms());
        assert_eq!(state.elapsed_ms, 1500);
        assert_eq!(state.laps, vec![Lap::new(0, 1500)]);
    }

    #[test]
    fn test_stale_tick_is_ignored() {
        let (mut app, _clock, rx) = new_app();
        press(&mut app, KeyCode::Enter);
        let generation = wait_for_tick(&rx);
        press(&mut app, KeyCode::Enter);

        let before = app.frames_drawn;
        app.handle_event(AppEvent::Pump(generation)).unwrap();
        assert_eq!(app.frames_drawn, before);

        // A restarted pump gets a new generation.
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.pump.as_ref().unwrap().generation(), generation + 1);
        app.handle_event(AppEvent::Pump(generation)).unwrap();
        assert_eq!(app.frames_drawn, before + 1);
    }

    #[test]
    fn test_reset_while_running_cancels_refresh() {
        let (mut app, clock, rx) = new_app();
        press(&mut app, KeyCode::F(2));
        clock.set(300);
        press(&mut app, KeyCode::Char('l'));
        press(&mut app, KeyCode::Char('r'));
        assert!(app.pump.is_none());
        assert!(!app.stopwatch.is_running());
        let state = app.stopwatch.snapshot(clock.now_ms());
        assert_eq!(state.elapsed_ms, 0);
        assert!(state.laps.is_empty());
        assert_no_more_ticks(&rx);
    }

    #[test]
    fn test_teardown_while_running_stops_ticks() {
        let (mut app, _clock, rx) = new_app();
        press(&mut app, KeyCode::Char('s'));
        wait_for_tick(&rx);
        drop(app);
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(30));
        // Every sender went away with the app.
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[test]
    fn test_lap_while_stopped_does_not_fail() {
        let (mut app, _clock, _rx) = new_app();
        press(&mut app, KeyCode::Char('l'));
        assert!(app.stopwatch.snapshot(0).laps.is_empty());
        assert!(!app.should_quit());
    }

    #[test]
    fn test_quit_while_running_asks_first() {
        let (mut app, clock, rx) = new_app();
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('q'));
        assert!(app.confirm_exit);
        assert!(!app.should_quit());

        // Other keys are swallowed by the dialog.
        press(&mut app, KeyCode::Char('l'));
        press(&mut app, KeyCode::Char('n'));
        assert!(!app.confirm_exit);
        assert!(app.stopwatch.is_running());

        press(&mut app, KeyCode::Esc);
        clock.set(800);
        press(&mut app, KeyCode::Char('y'));
        assert!(app.should_quit());
        assert!(app.pump.is_none());
        assert!(!app.stopwatch.is_running());
        assert_eq!(app.stopwatch.snapshot(800).laps, vec![Lap::new(0, 800)]);
        assert_no_more_ticks(&rx);
    }

    #[test]
    fn test_quit_when_stopped_is_immediate() {
        let (mut app, _clock, _rx) = new_app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit());
    }

    #[test]
    fn test_ctrl_c_quits_while_running() {
        let (mut app, _clock, _rx) = new_app();
        press(&mut app, KeyCode::Char(' '));
        app.handle_event(AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)))
            .unwrap();
        assert!(app.should_quit());
        assert!(app.pump.is_none());
    }

    #[test]
    fn test_help_closes_on_any_key() {
        let (mut app, _clock, _rx) = new_app();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.help_visible);
        press(&mut app, KeyCode::Char(' '));
        assert!(!app.help_visible);
        assert!(!app.stopwatch.is_running());
    }

    #[test]
    fn test_focus_loss_pauses_refresh_not_timing() {
        let (mut app, clock, rx) = new_app();
        press(&mut app, KeyCode::Char(' '));
        app.handle_event(AppEvent::FocusLost).unwrap();
        assert!(app.pump.is_none());
        assert_no_more_ticks(&rx);

        let before = app.frames_drawn;
        app.handle_event(AppEvent::Resize).unwrap();
        assert_eq!(app.frames_drawn, before);

        clock.set(5000);
        app.handle_event(AppEvent::FocusGained).unwrap();
        assert!(app.pump.is_some());
        assert_eq!(app.frames_drawn, before + 1);
        assert_eq!(app.stopwatch.snapshot(clock.now_ms()).elapsed_ms, 5000);
    }

    #[test]
    fn test_start_while_unfocused_defers_refresh() {
        let (mut app, clock, rx) = new_app();
        app.handle_event(AppEvent::FocusLost).unwrap();
        press(&mut app, KeyCode::Char(' '));
        assert!(app.stopwatch.is_running());
        assert!(app.pump.is_none());
        assert_no_more_ticks(&rx);

        clock.set(700);
        app.handle_event(AppEvent::FocusGained).unwrap();
        assert!(app.pump.is_some());
        assert_eq!(app.stopwatch.snapshot(clock.now_ms()).elapsed_ms, 700);
    }

    #[test]
    fn test_focus_gained_when_stopped_keeps_pump_off() {
        let (mut app, _clock, _rx) = new_app();
        app.handle_event(AppEvent::FocusLost).unwrap();
        app.handle_event(AppEvent::FocusGained).unwrap();
        assert!(app.pump.is_none());
    }

    #[test]
    fn test_run_exits_on_quit_event() {
        let (mut app, _clock, rx) = new_app();
        app.events.send(AppEvent::Quit).unwrap();
        run(&mut app, &rx).unwrap();
        assert!(app.should_quit());
    }
}
