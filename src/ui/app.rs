use crate::poller::StateHandle;
use crate::ui::components::{render_iops_panel, render_lun_table};
use crate::ui::state::AppState;
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Live view over every controller's poll state. Quitting raises `stop`.
pub fn run_tui(handles: Vec<StateHandle>, average_span: f64, stop: Arc<AtomicBool>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = AppState::new(average_span);
    let result = run_app(&mut terminal, &handles, &mut state, &stop);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    stop.store(true, Ordering::SeqCst);
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    handles: &[StateHandle],
    state: &mut AppState,
    stop: &AtomicBool,
) -> Result<()> {
    loop {
        let terminal_size = terminal.size()?;
        state.set_terminal_width(terminal_size.width);
        state.refresh(handles);

        let panel_height = state.controllers.len() as u16 + 2;
        let view: &AppState = state;
        terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),            // Header
                    Constraint::Length(panel_height), // Per-controller IOPS
                    Constraint::Min(8),               // LUN table
                    Constraint::Length(3),            // Footer
                ])
                .split(frame.size());

            render_header(frame, chunks[0], view);
            render_iops_panel(frame, chunks[1], &view.controllers, &view.iops_history);
            render_lun_table(frame, chunks[2], &view.controllers);
            render_footer(frame, chunks[3], view);
        })?;

        // Handle input with timeout to allow for periodic updates
        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if handle_key_event(key, state) {
                    break;
                }
            }
        }

        // Pollers stopped on their own (signal or fatal error)
        if state.should_quit || stop.load(Ordering::SeqCst) {
            break;
        }
    }

    Ok(())
}

fn render_header(frame: &mut ratatui::Frame, area: ratatui::layout::Rect, state: &AppState) {
    let ready = state.controllers.iter().filter(|c| c.ready).count();
    let header_text = Line::from(vec![
        Span::styled(
            "SFAPOLL",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" - Storage Controller LUN Monitor  "),
        Span::styled(
            format!(
                "{}/{} controllers polling, {:.0}s averages",
                ready,
                state.controllers.len(),
                state.average_span
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(header_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

    frame.render_widget(header, area);
}

fn render_footer(frame: &mut ratatui::Frame, area: ratatui::layout::Rect, state: &AppState) {
    let footer_text = Line::from(vec![
        Span::raw("[Q]uit / [Esc]  "),
        Span::styled(
            format!("{} LUNs", state.lun_count()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let footer = Paragraph::new(footer_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

    frame.render_widget(footer, area);
}

fn handle_key_event(key: KeyEvent, state: &mut AppState) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
            state.quit();
            true
        }
        _ => false,
    }
}
