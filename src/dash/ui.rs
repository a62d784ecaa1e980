//! Dashboard rendering.
//!
//! Terminal setup/restore and the ratatui widget tree: a service table on the
//! left, the selected unit's log stream on the right, and a status/help bar.

use std::io::{self, Stdout};

use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Terminal;

use super::app::{Columns, DashApp};

pub type DashTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Enables raw mode and enters the alternate screen.
pub fn init_terminal() -> io::Result<DashTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the terminal to its original state.
pub fn restore_terminal(mut terminal: DashTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws the current dashboard state.
pub fn draw(app: &mut DashApp, terminal: &mut DashTerminal) -> io::Result<()> {
    execute!(terminal.backend_mut(), SetTitle(window_title(app)))?;
    terminal.draw(|frame| {
        let area = frame.size();
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(area);
        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
            .split(vertical[0]);

        let border_style = Style::default().fg(Color::DarkGray);

        let header = match app.columns {
            Columns::Minimal => Row::new(vec!["St", "Service", "PID"]),
            Columns::Full => Row::new(vec!["St", "Service", "PID", "Unit", "Project"]),
        }
        .style(Style::default().add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = app
            .services
            .iter()
            .map(|service| {
                let pid = if service.pid == 0 {
                    "-".to_string()
                } else {
                    service.pid.to_string()
                };
                let status = Span::styled(
                    state_char(&service.state).to_string(),
                    state_style(&service.state),
                );
                let cells: Vec<ratatui::widgets::Cell> = match app.columns {
                    Columns::Minimal => vec![
                        status.into(),
                        service.friendly.clone().into(),
                        pid.into(),
                    ],
                    Columns::Full => vec![
                        status.into(),
                        service.friendly.clone().into(),
                        pid.into(),
                        service.unit.clone().into(),
                        service.project.clone().unwrap_or_default().into(),
                    ],
                };
                Row::new(cells)
            })
            .collect();

        let widths: &[Constraint] = match app.columns {
            Columns::Minimal => &[
                Constraint::Length(2),
                Constraint::Min(12),
                Constraint::Length(8),
            ],
            Columns::Full => &[
                Constraint::Length(2),
                Constraint::Min(12),
                Constraint::Length(8),
                Constraint::Min(18),
                Constraint::Min(8),
            ],
        };

        let table = Table::new(rows, widths.iter().copied())
            .header(header)
            .block(
                Block::default()
                    .title("Services")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan))
            .highlight_symbol("▶ ");
        let mut state = TableState::default();
        if !app.services.is_empty() {
            state.select(Some(app.selected.min(app.services.len() - 1)));
        }
        frame.render_stateful_widget(table, main[0], &mut state);

        let log_block = Block::default()
            .title(log_title(app))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border_style);
        let log_area = log_block.inner(main[1]);
        let height = log_area.height as usize;
        let start = app.logs.len().saturating_sub(height);
        let lines: Vec<Line> = app
            .logs
            .iter()
            .skip(start)
            .map(|line| Line::from(Span::raw(sanitize(line))))
            .collect();
        let empty = lines.is_empty();
        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(log_block)
                .wrap(Wrap { trim: false }),
            main[1],
        );
        if empty {
            let placeholder = Paragraph::new("select a service to follow its logs")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(placeholder, log_area);
        }

        let help =
            "↑/↓ select | Enter/f follow | u restart | d stop | x rm | t terminal | R refresh | ? help | q quit";
        let footer = Paragraph::new(Line::from(Span::styled(
            app.status_message.as_deref().unwrap_or(help),
            Style::default().fg(Color::DarkGray),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style),
        );
        frame.render_widget(footer, vertical[1]);

        if app.show_help {
            let popup = centered_rect(50, 60, area);
            let text = [
                "Navigation:",
                "  Up/Down    Select service (re-follows logs)",
                "  Enter / f  Follow selected unit's journal",
                "",
                "Actions:",
                "  u          Restart (starts if stopped)",
                "  d          Stop",
                "  x          Stop and remove",
                "  t          Open terminal in service workdir",
                "  R          Refresh now",
                "",
                "General:",
                "  ?          Toggle this help",
                "  q          Quit",
            ]
            .join("\n");
            let help_block = Paragraph::new(text)
                .block(
                    Block::default()
                        .title("Help")
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded),
                )
                .style(Style::default().bg(Color::DarkGray).fg(Color::White));
            frame.render_widget(Clear, popup);
            frame.render_widget(help_block, popup);
        }
    })?;
    Ok(())
}

fn sanitize(line: &str) -> String {
    let stripped = strip_ansi_escapes::strip(line);
    String::from_utf8_lossy(&stripped).to_string()
}

fn window_title(app: &DashApp) -> String {
    match app.selected_service() {
        Some(service) => format!("ww dash · {}", service.friendly),
        None => "ww dash".to_string(),
    }
}

fn log_title(app: &DashApp) -> String {
    match app.selected_service() {
        Some(service) => format!(
            "Logs - {} ({}/{})",
            service.friendly, service.state, service.sub_state
        ),
        None => "Logs".to_string(),
    }
}

fn state_char(state: &str) -> char {
    match state {
        "active" => '▲',
        "activating" | "deactivating" => '↻',
        "failed" => '■',
        _ => '·',
    }
}

fn state_style(state: &str) -> Style {
    match state {
        "active" => Style::default().fg(Color::Green),
        "activating" | "deactivating" => Style::default().fg(Color::Yellow),
        "failed" => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::DarkGray),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: ratatui::layout::Rect) -> ratatui::layout::Rect {
    let popup = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup[1])[1]
}
