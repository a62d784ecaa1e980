//! Dashboard state and key handling.
//!
//! The dashboard holds a point-in-time table of managed services plus a ring
//! buffer of log lines for the selected one. Every refresh replaces the whole
//! table; nothing is cached beyond the current view.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// One row of the service table.
#[derive(Debug, Clone)]
pub struct ServiceRow {
    pub unit: String,
    pub friendly: String,
    pub state: String,
    pub sub_state: String,
    pub pid: u32,
    pub workdir: Option<PathBuf>,
    /// First path component of the workdir relative to a configured root.
    pub project: Option<String>,
}

/// Column sets for the service table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Columns {
    #[default]
    Minimal,
    Full,
}

/// Actions the event loop performs in response to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashAction {
    None,
    Quit,
    /// Re-attach the log follow stream to the currently selected unit.
    FollowSelected,
    Restart(String),
    Stop(String),
    Remove(String),
    Refresh,
    /// Open the terminal backend in the selected service's workdir.
    OpenTerminal,
}

/// The dashboard state container.
pub struct DashApp {
    pub services: Vec<ServiceRow>,
    pub selected: usize,
    pub logs: VecDeque<String>,
    pub max_lines: usize,
    pub columns: Columns,
    pub status_message: Option<String>,
    pub show_help: bool,
    pub should_quit: bool,
}

impl DashApp {
    pub fn new(columns: Columns, max_lines: usize) -> Self {
        Self {
            services: Vec::new(),
            selected: 0,
            logs: VecDeque::new(),
            max_lines,
            columns,
            status_message: None,
            show_help: false,
            should_quit: false,
        }
    }

    pub fn selected_service(&self) -> Option<&ServiceRow> {
        self.services.get(self.selected)
    }

    /// Replaces the service table, keeping the selection pinned to the same
    /// unit when it survives the refresh.
    pub fn set_services(&mut self, mut rows: Vec<ServiceRow>) {
        rows.sort_by(|a, b| {
            (a.friendly.to_lowercase(), &a.workdir).cmp(&(b.friendly.to_lowercase(), &b.workdir))
        });
        let previous = self.selected_service().map(|s| s.unit.clone());
        self.services = rows;
        self.selected = previous
            .and_then(|unit| self.services.iter().position(|s| s.unit == unit))
            .unwrap_or(0);
        if self.selected >= self.services.len() {
            self.selected = self.services.len().saturating_sub(1);
        }
    }

    /// Applies a single status probe without waiting for the next full refresh.
    pub fn apply_probe(&mut self, unit: &str, state: String, pid: u32) {
        if let Some(row) = self.services.iter_mut().find(|s| s.unit == unit) {
            row.state = state;
            row.pid = pid;
        }
    }

    pub fn push_log(&mut self, line: String) {
        self.logs.push_back(line);
        while self.logs.len() > self.max_lines {
            self.logs.pop_front();
        }
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> DashAction {
        if self.show_help {
            self.show_help = false;
            return DashAction::None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                DashAction::Quit
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                DashAction::Quit
            }
            KeyCode::Up | KeyCode::BackTab => self.select_offset(-1),
            KeyCode::Down | KeyCode::Tab => self.select_offset(1),
            KeyCode::Enter | KeyCode::Char('f') => DashAction::FollowSelected,
            KeyCode::Char('u') | KeyCode::Char('r') => self
                .selected_service()
                .map(|s| DashAction::Restart(s.unit.clone()))
                .unwrap_or(DashAction::None),
            KeyCode::Char('d') | KeyCode::Char('s') => self
                .selected_service()
                .map(|s| DashAction::Stop(s.unit.clone()))
                .unwrap_or(DashAction::None),
            KeyCode::Char('x') => self
                .selected_service()
                .map(|s| DashAction::Remove(s.unit.clone()))
                .unwrap_or(DashAction::None),
            KeyCode::Char('t') => DashAction::OpenTerminal,
            KeyCode::Char('R') => DashAction::Refresh,
            KeyCode::Char('?') => {
                self.show_help = true;
                DashAction::None
            }
            _ => DashAction::None,
        }
    }

    fn select_offset(&mut self, delta: isize) -> DashAction {
        if self.services.is_empty() {
            return DashAction::None;
        }
        let len = self.services.len() as isize;
        let next = (self.selected as isize + delta).rem_euclid(len) as usize;
        if next != self.selected {
            self.selected = next;
            return DashAction::FollowSelected;
        }
        DashAction::None
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }
}

/// Labels a service with the first path component of its workdir under one of
/// the configured roots.
pub fn infer_project(workdir: &Path, roots: &[PathBuf]) -> Option<String> {
    for root in roots {
        let Ok(rel) = workdir.strip_prefix(root) else {
            continue;
        };
        return match rel.components().next() {
            Some(first) => Some(first.as_os_str().to_string_lossy().into_owned()),
            None => root.file_name().map(|n| n.to_string_lossy().into_owned()),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    fn row(unit: &str, friendly: &str) -> ServiceRow {
        ServiceRow {
            unit: unit.to_string(),
            friendly: friendly.to_string(),
            state: "active".to_string(),
            sub_state: "running".to_string(),
            pid: 1,
            workdir: None,
            project: None,
        }
    }

    #[test]
    fn refresh_keeps_selection_on_same_unit() {
        let mut app = DashApp::new(Columns::Minimal, 100);
        app.set_services(vec![row("ww-b.service", "b"), row("ww-a.service", "a")]);
        // Sorted: a first.
        assert_eq!(app.services[0].friendly, "a");

        app.selected = 1; // "b"
        app.set_services(vec![
            row("ww-c.service", "c"),
            row("ww-b.service", "b"),
            row("ww-a.service", "a"),
        ]);
        assert_eq!(app.selected_service().unwrap().unit, "ww-b.service");
    }

    #[test]
    fn selection_wraps_and_triggers_refollow() {
        let mut app = DashApp::new(Columns::Minimal, 100);
        app.set_services(vec![row("ww-a.service", "a"), row("ww-b.service", "b")]);
        assert_eq!(
            app.handle_key(KeyEvent::from(KeyCode::Down)),
            DashAction::FollowSelected
        );
        assert_eq!(app.selected, 1);
        assert_eq!(
            app.handle_key(KeyEvent::from(KeyCode::Down)),
            DashAction::FollowSelected
        );
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn log_buffer_is_bounded() {
        let mut app = DashApp::new(Columns::Minimal, 3);
        for i in 0..5 {
            app.push_log(format!("line {i}"));
        }
        assert_eq!(app.logs.len(), 3);
        assert_eq!(app.logs.front().unwrap(), "line 2");
    }

    #[test]
    fn project_inference_uses_first_component() {
        let roots = vec![PathBuf::from("/home/me/code")];
        assert_eq!(
            infer_project(Path::new("/home/me/code/myapp/src"), &roots),
            Some("myapp".to_string())
        );
        assert_eq!(infer_project(Path::new("/tmp/elsewhere"), &roots), None);
    }
}
