//! Terminal backends for running commands out of the dashboard.
//!
//! One capability interface, three variants: the native pane (commands run as
//! children and stream into the dashboard's log view), a tmux mirror
//! (commands are typed into a dedicated tmux window), and a placeholder when
//! neither is usable. The backend is selected once at startup by fixed
//! preference and never re-probed per call.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::Event;

/// Operator-selectable backend preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendChoice {
    /// Native pane when supported, else tmux, else placeholder.
    #[default]
    Auto,
    Native,
    Tmux,
}

/// Capability interface over whichever backend was selected.
pub trait TermSession {
    /// Makes sure the session exists, positioned in `cwd` when given.
    fn open_session(&mut self, cwd: Option<&Path>) -> Result<()>;
    /// Sends raw text (with a trailing newline) into the session.
    fn send_text(&mut self, text: &str) -> Result<()>;
    /// Runs an argv in the session.
    fn run_command(&mut self, argv: &[String], cwd: Option<&Path>) -> Result<()>;
}

/// Selects the backend once, by fixed preference order.
pub fn select_backend(choice: BackendChoice, tx: mpsc::Sender<Event>) -> Box<dyn TermSession> {
    match choice {
        BackendChoice::Native => Box::new(NativePane::new(tx)),
        BackendChoice::Tmux => {
            if tmux_available() {
                Box::new(TmuxMirror::new("wwdash"))
            } else {
                Box::new(Placeholder::new(tx, "tmux binary not found"))
            }
        }
        // The native pane needs nothing beyond the dashboard itself, so auto
        // always lands there.
        BackendChoice::Auto => Box::new(NativePane::new(tx)),
    }
}

fn tmux_available() -> bool {
    std::process::Command::new("tmux")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Runs commands as children of the dashboard and streams their output into
/// the log pane.
pub struct NativePane {
    tx: mpsc::Sender<Event>,
    child: Option<tokio::process::Child>,
}

impl NativePane {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx, child: None }
    }
}

impl TermSession for NativePane {
    fn open_session(&mut self, _cwd: Option<&Path>) -> Result<()> {
        Ok(())
    }

    fn send_text(&mut self, _text: &str) -> Result<()> {
        // The native pane is output-only; input goes through key bindings.
        Ok(())
    }

    fn run_command(&mut self, argv: &[String], cwd: Option<&Path>) -> Result<()> {
        let (program, args) = argv.split_first().context("empty command")?;
        // Dropping the previous child kills it; kill_on_drop reaps it.
        drop(self.child.take());
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(stream_lines(stdout, self.tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(stream_lines(stderr, self.tx.clone()));
        }
        self.child = Some(child);
        Ok(())
    }
}

async fn stream_lines<R>(reader: R, tx: mpsc::Sender<Event>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(Event::LogLine(line)).await.is_err() {
            break;
        }
    }
}

/// Mirrors commands into a window of a dedicated tmux session.
pub struct TmuxMirror {
    session: String,
    window: Option<String>,
}

impl TmuxMirror {
    pub fn new(session: &str) -> Self {
        Self {
            session: session.to_string(),
            window: None,
        }
    }

    fn tmux(&self, args: &[&str]) -> Result<()> {
        let status = std::process::Command::new("tmux")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("failed to run tmux")?;
        anyhow::ensure!(status.success(), "tmux {:?} failed", args.first());
        Ok(())
    }

    fn target(&self) -> String {
        match &self.window {
            Some(window) => format!("{}:{}", self.session, window),
            None => self.session.clone(),
        }
    }
}

impl TermSession for TmuxMirror {
    fn open_session(&mut self, cwd: Option<&Path>) -> Result<()> {
        // new-session is a no-op when it already exists thanks to -A.
        let mut args = vec!["new-session", "-A", "-d", "-s", self.session.as_str()];
        let cwd_str;
        if let Some(cwd) = cwd {
            cwd_str = cwd.to_string_lossy().into_owned();
            args.extend_from_slice(&["-c", &cwd_str]);
        }
        self.tmux(&args)?;
        // A dedicated window keeps mirrored commands out of the operator's
        // own panes. Failure here just means it already exists.
        let _ = self.tmux(&["new-window", "-t", &self.session, "-n", "ww"]);
        self.window = Some("ww".to_string());
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let target = self.target();
        self.tmux(&["send-keys", "-t", &target, text, "Enter"])
    }

    fn run_command(&mut self, argv: &[String], cwd: Option<&Path>) -> Result<()> {
        if self.window.is_none() {
            self.open_session(cwd)?;
        }
        // A foreground command may still be running (e.g. a follow stream);
        // interrupt it before typing the next one.
        let target = self.target();
        let _ = self.tmux(&["send-keys", "-t", &target, "C-c"]);
        let mut line = String::new();
        if let Some(cwd) = cwd {
            line.push_str(&format!("cd {} && ", shell_words::quote(&cwd.to_string_lossy())));
        }
        line.push_str(&shell_words::join(argv));
        self.send_text(&line)
    }
}

/// Backend of last resort: reports that no terminal is available.
pub struct Placeholder {
    tx: mpsc::Sender<Event>,
    reason: String,
}

impl Placeholder {
    pub fn new(tx: mpsc::Sender<Event>, reason: &str) -> Self {
        Self {
            tx,
            reason: reason.to_string(),
        }
    }

    fn report(&self) {
        let _ = self.tx.try_send(Event::LogLine(format!(
            "terminal backend unavailable: {}",
            self.reason
        )));
    }
}

impl TermSession for Placeholder {
    fn open_session(&mut self, _cwd: Option<&Path>) -> Result<()> {
        self.report();
        Ok(())
    }

    fn send_text(&mut self, _text: &str) -> Result<()> {
        self.report();
        Ok(())
    }

    fn run_command(&mut self, _argv: &[String], _cwd: Option<&Path>) -> Result<()> {
        self.report();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn native_pane_streams_command_output_into_events() {
        rt().block_on(async {
            let (tx, mut rx) = mpsc::channel(16);
            let mut pane = NativePane::new(tx);
            pane.run_command(&["echo".to_string(), "hello".to_string()], None)
                .unwrap();

            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for output")
                .expect("channel closed");
            match event {
                Event::LogLine(line) => assert_eq!(line, "hello"),
                other => panic!("unexpected event {other:?}"),
            }
        });
    }

    #[test]
    fn native_pane_replaces_previous_command() {
        rt().block_on(async {
            let (tx, mut rx) = mpsc::channel(64);
            let mut pane = NativePane::new(tx);
            // Long-lived first command gets dropped (and killed) on replace.
            pane.run_command(&["sleep".to_string(), "30".to_string()], None)
                .unwrap();
            pane.run_command(&["echo".to_string(), "second".to_string()], None)
                .unwrap();

            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for output")
                .expect("channel closed");
            match event {
                Event::LogLine(line) => assert_eq!(line, "second"),
                other => panic!("unexpected event {other:?}"),
            }
        });
    }

    #[test]
    fn placeholder_reports_instead_of_failing() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut placeholder = Placeholder::new(tx, "no usable terminal");
        placeholder
            .run_command(&["true".to_string()], None)
            .unwrap();
        match rx.try_recv() {
            Ok(Event::LogLine(line)) => assert!(line.contains("no usable terminal")),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
