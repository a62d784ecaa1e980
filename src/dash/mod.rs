//! Interactive service dashboard.
//!
//! A single event loop drives everything: one channel carries key presses
//! from a blocking input thread, refresh results, journal follow lines, and
//! terminal-backend output. Registry calls run in spawned tasks so the UI
//! never blocks on a subprocess; status probes are capped at four in flight.

pub mod app;
pub mod term;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event as TermEvent, KeyEvent, KeyEventKind};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::warn;

use crate::journal;
use crate::registry::{Registry, Systemctl};
use crate::slug::friendly_name;

use app::{Columns, DashAction, DashApp, ServiceRow};
use term::{select_backend, BackendChoice, TermSession};

/// Everything that can wake the event loop.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize,
    /// Periodic refresh trigger, also sent after actions that change the
    /// unit set.
    Tick,
    /// A completed full refresh.
    Services(Vec<ServiceRow>),
    /// A single-unit status update after an action.
    Probe { unit: String, state: String, pid: u32 },
    LogLine(String),
}

/// Resolved dashboard settings, config defaults already merged with flags.
#[derive(Debug, Clone)]
pub struct DashOptions {
    pub roots: Vec<PathBuf>,
    pub columns: Columns,
    pub terminal_backend: BackendChoice,
    pub refresh_ms: u64,
    /// History lines requested when a follow starts.
    pub last: u32,
}

impl Default for DashOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            columns: Columns::Minimal,
            terminal_backend: BackendChoice::Auto,
            refresh_ms: 2000,
            last: 50,
        }
    }
}

pub async fn run(opts: DashOptions) -> Result<()> {
    let registry = Systemctl::new();
    let (tx, mut rx) = mpsc::channel::<Event>(256);

    spawn_input_thread(tx.clone());
    spawn_ticker(tx.clone(), opts.refresh_ms);

    let mut terminal = ui::init_terminal().context("failed to initialize terminal")?;
    let mut app = DashApp::new(opts.columns, 2000);
    let mut backend = select_backend(opts.terminal_backend, tx.clone());
    let probe_permits = Arc::new(Semaphore::new(4));
    let mut followed_unit: Option<String> = None;

    // First refresh before the first frame has anything to show.
    spawn_refresh(
        registry.clone(),
        tx.clone(),
        opts.roots.clone(),
        probe_permits.clone(),
    );

    let result = loop {
        if let Err(err) = ui::draw(&mut app, &mut terminal) {
            break Err(err.into());
        }
        let Some(event) = rx.recv().await else {
            break Ok(());
        };
        match event {
            Event::Key(key) => {
                let action = app.handle_key(key);
                handle_action(
                    action,
                    &mut app,
                    &registry,
                    &tx,
                    &opts,
                    &probe_permits,
                    &mut *backend,
                    &mut followed_unit,
                );
                if app.should_quit {
                    break Ok(());
                }
            }
            Event::Resize => {}
            Event::Tick => {
                spawn_refresh(
                    registry.clone(),
                    tx.clone(),
                    opts.roots.clone(),
                    probe_permits.clone(),
                );
            }
            Event::Services(rows) => {
                app.set_services(rows);
                // The followed unit may have moved or vanished.
                let selected = app.selected_service().map(|s| s.unit.clone());
                if followed_unit.is_some() && selected != followed_unit {
                    start_follow(&mut app, &opts, &mut *backend, &mut followed_unit);
                }
            }
            Event::Probe { unit, state, pid } => {
                app.apply_probe(&unit, state, pid);
            }
            Event::LogLine(line) => {
                app.push_log(line);
            }
        }
    };

    // Dropping the backend kills any native follow child.
    drop(backend);
    ui::restore_terminal(terminal).context("failed to restore terminal")?;
    result
}

#[allow(clippy::too_many_arguments)]
fn handle_action(
    action: DashAction,
    app: &mut DashApp,
    registry: &Systemctl,
    tx: &mpsc::Sender<Event>,
    opts: &DashOptions,
    probe_permits: &Arc<Semaphore>,
    backend: &mut dyn TermSession,
    followed_unit: &mut Option<String>,
) {
    match action {
        DashAction::None | DashAction::Quit => {}
        DashAction::FollowSelected => {
            start_follow(app, opts, backend, followed_unit);
        }
        DashAction::Restart(unit) => {
            app.set_status(format!("restarting {}", friendly_name(&unit)));
            spawn_unit_op(registry.clone(), tx.clone(), unit, UnitOp::Restart);
        }
        DashAction::Stop(unit) => {
            app.set_status(format!("stopping {}", friendly_name(&unit)));
            spawn_unit_op(registry.clone(), tx.clone(), unit, UnitOp::Stop);
        }
        DashAction::Remove(unit) => {
            app.set_status(format!("removing {}", friendly_name(&unit)));
            spawn_unit_op(registry.clone(), tx.clone(), unit, UnitOp::Remove);
        }
        DashAction::Refresh => {
            spawn_refresh(
                registry.clone(),
                tx.clone(),
                opts.roots.clone(),
                probe_permits.clone(),
            );
        }
        DashAction::OpenTerminal => {
            let workdir = app.selected_service().and_then(|s| s.workdir.clone());
            match backend.open_session(workdir.as_deref()) {
                Ok(()) => app.set_status(match &workdir {
                    Some(dir) => format!("terminal session in {}", dir.display()),
                    None => "terminal session opened".to_string(),
                }),
                Err(err) => app.set_status(format!("terminal: {err}")),
            }
        }
    }
}

/// Restarts the journal follow stream on the currently selected unit,
/// running it through the terminal backend: the native pane streams into the
/// log view and kills the previous stream on replacement, the tmux mirror
/// interrupts its window and re-types the command there.
fn start_follow(
    app: &mut DashApp,
    opts: &DashOptions,
    backend: &mut dyn TermSession,
    followed_unit: &mut Option<String>,
) {
    *followed_unit = None;
    app.clear_logs();
    let Some(unit) = app.selected_service().map(|s| s.unit.clone()) else {
        return;
    };
    let argv = journal::follow_argv(&unit, opts.last);
    match backend.run_command(&argv, None) {
        Ok(()) => *followed_unit = Some(unit),
        Err(err) => app.set_status(format!("logs: {err}")),
    }
}

#[derive(Debug, Clone, Copy)]
enum UnitOp {
    Restart,
    Stop,
    Remove,
}

/// Runs one lifecycle action off the UI thread, then reports back either a
/// fresh probe or (for removals) a full-refresh trigger.
fn spawn_unit_op(registry: Systemctl, tx: mpsc::Sender<Event>, unit: String, op: UnitOp) {
    tokio::spawn(async move {
        let outcome = match op {
            UnitOp::Restart => registry.restart_unit(&unit).await,
            UnitOp::Stop => registry.stop_unit(&unit).await,
            UnitOp::Remove => match registry.stop_unit(&unit).await {
                Ok(()) => registry.reset_failed(&unit).await,
                Err(err) => Err(err),
            },
        };
        if let Err(err) = outcome {
            let _ = tx.send(Event::LogLine(format!("{unit}: {err}"))).await;
            return;
        }
        match op {
            UnitOp::Remove => {
                let _ = tx.send(Event::Tick).await;
            }
            UnitOp::Restart | UnitOp::Stop => match registry.unit_status(&unit).await {
                Ok(status) => {
                    let _ = tx
                        .send(Event::Probe {
                            unit,
                            state: status.active_state,
                            pid: status.main_pid,
                        })
                        .await;
                }
                Err(_) => {
                    let _ = tx.send(Event::Tick).await;
                }
            },
        }
    });
}

/// Lists managed units and probes each one's status, at most four probes in
/// flight, then delivers the complete table in one event.
fn spawn_refresh(
    registry: Systemctl,
    tx: mpsc::Sender<Event>,
    roots: Vec<PathBuf>,
    permits: Arc<Semaphore>,
) {
    tokio::spawn(async move {
        let listings = match registry.list_units().await {
            Ok(listings) => listings,
            Err(err) => {
                warn!(%err, "refresh failed");
                let _ = tx.send(Event::LogLine(format!("refresh: {err}"))).await;
                return;
            }
        };
        let mut probes = JoinSet::new();
        for listing in listings {
            let registry = registry.clone();
            let permits = permits.clone();
            let roots = roots.clone();
            probes.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                let status = registry.unit_status(&listing.name).await.unwrap_or_default();
                let project = status
                    .working_directory
                    .as_deref()
                    .and_then(|dir| app::infer_project(dir, &roots));
                Some(ServiceRow {
                    friendly: friendly_name(&listing.name),
                    unit: listing.name,
                    state: if status.active_state.is_empty() {
                        listing.active_state
                    } else {
                        status.active_state
                    },
                    sub_state: if status.sub_state.is_empty() {
                        listing.sub_state
                    } else {
                        status.sub_state
                    },
                    pid: status.main_pid,
                    workdir: status.working_directory,
                    project,
                })
            });
        }
        let mut rows = Vec::new();
        while let Some(joined) = probes.join_next().await {
            if let Ok(Some(row)) = joined {
                rows.push(row);
            }
        }
        let _ = tx.send(Event::Services(rows)).await;
    });
}

/// Reads terminal input on a dedicated thread; crossterm's event reads block.
fn spawn_input_thread(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        match crossterm::event::poll(Duration::from_millis(200)) {
            Ok(true) => match crossterm::event::read() {
                Ok(TermEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    if tx.blocking_send(Event::Key(key)).is_err() {
                        return;
                    }
                }
                Ok(TermEvent::Resize(_, _)) => {
                    if tx.blocking_send(Event::Resize).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(_) => return,
            },
            Ok(false) => {
                if tx.is_closed() {
                    return;
                }
            }
            Err(_) => return,
        }
    });
}

fn spawn_ticker(tx: mpsc::Sender<Event>, refresh_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(refresh_ms.max(200)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // interval fires immediately; the caller already did the first refresh.
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.send(Event::Tick).await.is_err() {
                return;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingSession {
        commands: Vec<(Vec<String>, Option<PathBuf>)>,
    }

    impl TermSession for RecordingSession {
        fn open_session(&mut self, _cwd: Option<&Path>) -> Result<()> {
            Ok(())
        }

        fn send_text(&mut self, _text: &str) -> Result<()> {
            Ok(())
        }

        fn run_command(&mut self, argv: &[String], cwd: Option<&Path>) -> Result<()> {
            self.commands.push((argv.to_vec(), cwd.map(Path::to_path_buf)));
            Ok(())
        }
    }

    fn service(unit: &str, friendly: &str) -> ServiceRow {
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
    fn follow_runs_journal_stream_through_backend() {
        let mut app = DashApp::new(Columns::Minimal, 100);
        app.set_services(vec![service("ww-api.service", "api")]);
        let opts = DashOptions {
            last: 25,
            ..DashOptions::default()
        };
        let mut backend = RecordingSession::default();
        let mut followed = None;

        start_follow(&mut app, &opts, &mut backend, &mut followed);

        assert_eq!(followed.as_deref(), Some("ww-api.service"));
        let (argv, cwd) = &backend.commands[0];
        assert_eq!(argv[0], "journalctl");
        assert!(argv.contains(&"-f".to_string()));
        assert!(argv.contains(&"ww-api.service".to_string()));
        assert!(argv.contains(&"25".to_string()));
        assert!(cwd.is_none());
    }

    #[test]
    fn follow_without_selection_clears_state_and_runs_nothing() {
        let mut app = DashApp::new(Columns::Minimal, 100);
        app.push_log("stale".to_string());
        let opts = DashOptions::default();
        let mut backend = RecordingSession::default();
        let mut followed = Some("ww-gone.service".to_string());

        start_follow(&mut app, &opts, &mut backend, &mut followed);

        assert!(followed.is_none());
        assert!(backend.commands.is_empty());
        assert!(app.logs.is_empty());
    }
}
