use std::io;

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

use crate::stopwatch::DisplayState;
use timer_core::format_hms_millis;

const LAP_WIDTHS: [Constraint; 4] = [
    Constraint::Length(4),
    Constraint::Length(14),
    Constraint::Length(14),
    Constraint::Length(16),
];

const FOOTER: &str = "space=start/stop  r=reset  l=lap  \u{2191}\u{2193}=scroll  ?=help  q=quit";

const HELP_TEXT: &str = "STOPWATCH HELP\n\n\
     space  Start/Stop (also Enter, s, F2)\n\
     r      Reset (also F3)\n\
     l      Record lap (also F5)\n\
     \u{2191} \u{2193}    Scroll laps (also k, j)\n\
     ?      This help (also h, F1)\n\
     q      Quit (also Esc, F4)";

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("can't enable raw mode")?;
        // From here on Drop undoes whatever got set up.
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, EnableFocusChange, Hide)
            .context("can't enter alternate screen")?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen, Show);
        let _ = disable_raw_mode();
    }
}

/// One rendered row of the lap table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LapRow {
    pub number: usize,
    pub start: String,
    pub end: String,
    pub duration: String,
    pub pending: bool,
}

/// Laps most recent first, skipping `scroll_offset` rows and formatting at
/// most `max_rows`. While running, the last lap is the open one.
pub fn lap_rows(state: &DisplayState, scroll_offset: usize, max_rows: usize) -> Vec<LapRow> {
    let last = state.laps.len().saturating_sub(1);
    state
        .laps
        .iter()
        .enumerate()
        .rev()
        .skip(scroll_offset)
        .take(max_rows)
        .map(|(i, lap)| LapRow {
            number: i + 1,
            start: format_hms_millis(lap.start_ms),
            end: format_hms_millis(lap.end_ms),
            duration: format_hms_millis(lap.duration_ms),
            pending: state.running && i == last,
        })
        .collect()
}

pub fn draw_stopwatch<B: Backend>(f: &mut Frame<B>, state: &DisplayState, lap_scroll_offset: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(f.size());

    // Header
    let (status, status_color) = if state.running {
        ("RUNNING", Color::Green)
    } else {
        ("STOPPED", Color::Gray)
    };
    let title = Paragraph::new(format!("STOPWATCH  [{}]", status))
        .style(Style::default().fg(status_color).add_modifier(Modifier::BOLD));
    f.render_widget(title, chunks[0]);

    // Time display
    let time = Paragraph::new(format_hms_millis(state.elapsed_ms))
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().title("Time Elapsed").borders(Borders::ALL));
    f.render_widget(time, chunks[1]);

    // Lap table
    let laps_block = Block::default()
        .title(format!("Laps ({})", state.laps.len()))
        .borders(Borders::ALL);
    if state.laps.is_empty() {
        let empty = Paragraph::new("No laps recorded")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(laps_block);
        f.render_widget(empty, chunks[2]);
    } else {
        // borders, header and its margin
        let visible = chunks[2].height.saturating_sub(4) as usize;
        let rows = lap_rows(state, lap_scroll_offset, visible).into_iter().map(|row| {
            let style = if row.pending {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            Row::new(vec![
                format!("{:>3}", row.number),
                row.start,
                row.end,
                row.duration,
            ])
            .style(style)
        });
        let header = Row::new(vec!["#", "Start Time", "End Time", "Total Duration"])
            .style(Style::default().add_modifier(Modifier::BOLD))
            .bottom_margin(1);
        let table = Table::new(rows)
            .header(header)
            .block(laps_block)
            .widths(&LAP_WIDTHS)
            .column_spacing(2);
        f.render_widget(table, chunks[2]);
    }

    // Footer
    let footer = Paragraph::new(FOOTER).style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, chunks[3]);
}

pub fn draw_help<B: Backend>(f: &mut Frame<B>) {
    let area = centered_rect(f.size(), 48, 10);
    f.render_widget(Clear, area);
    let help = Paragraph::new(HELP_TEXT)
        .block(Block::default().title("Press any key to close").borders(Borders::ALL));
    f.render_widget(help, area);
}

pub fn draw_confirm_exit<B: Backend>(f: &mut Frame<B>) {
    let area = centered_rect(f.size(), 36, 6);
    f.render_widget(Clear, area);
    let msg = Paragraph::new("The stopwatch is still running.\nExit anyway?\n  y = Stop & exit   n = Cancel")
        .block(
            Block::default()
                .title("Timer Running")
                .borders(Borders::ALL)
                .style(Style::default().add_modifier(Modifier::BOLD)),
        );
    f.render_widget(msg, area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
