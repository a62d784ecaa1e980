//! Log retrieval through the external journal daemon CLI.
//!
//! Log storage belongs to journald; we only build and run `journalctl --user`
//! invocations. By default the view is scoped to the unit's last activation
//! so reload churn from earlier runs stays out of the way.

use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Parameters for one journal query.
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub unit: String,
    /// Show the last N entries.
    pub lines: u32,
    /// Keep streaming until interrupted.
    pub follow: bool,
    /// Unix-seconds lower bound; `None` shows the full history.
    pub since: Option<u64>,
}

impl LogRequest {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            lines: 100,
            follow: false,
            since: None,
        }
    }
}

/// Builds the journalctl argument list for a request.
pub fn journalctl_args(req: &LogRequest) -> Vec<String> {
    let mut args = vec![
        "--user".to_string(),
        "-u".to_string(),
        req.unit.clone(),
        "-n".to_string(),
        req.lines.to_string(),
    ];
    if let Some(since) = req.since {
        args.push(format!("--since=@{since}"));
    }
    if req.follow {
        args.push("-f".to_string());
    }
    args
}

/// Runs journalctl with the operator's terminal attached. Follow mode blocks
/// until the operator interrupts; a non-zero journalctl exit is not an error
/// of ours.
pub async fn run_journalctl(req: &LogRequest) -> Result<()> {
    let mut child = Command::new("journalctl")
        .args(journalctl_args(req))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::ToolMissing("journalctl".to_string()),
            _ => Error::Io(err),
        })?;
    let _ = child.wait().await?;
    Ok(())
}

/// Full follow-mode argv, binary included, for running a journal stream
/// through the dashboard's terminal backend.
pub fn follow_argv(unit: &str, lines: u32) -> Vec<String> {
    let mut req = LogRequest::new(unit);
    req.lines = lines;
    req.follow = true;
    let mut argv = vec!["journalctl".to_string()];
    argv.extend(journalctl_args(&req));
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_for_history_and_follow() {
        let mut req = LogRequest::new("ww-foo.service");
        req.lines = 50;
        assert_eq!(
            journalctl_args(&req),
            vec!["--user", "-u", "ww-foo.service", "-n", "50"]
        );

        req.follow = true;
        req.since = Some(1_700_000_000);
        let args = journalctl_args(&req);
        assert!(args.contains(&"--since=@1700000000".to_string()));
        assert_eq!(args.last().unwrap(), "-f");
    }

    #[test]
    fn follow_argv_names_the_binary() {
        let argv = follow_argv("ww-foo.service", 20);
        assert_eq!(argv[0], "journalctl");
        assert!(argv.contains(&"-f".to_string()));
        assert!(argv.contains(&"ww-foo.service".to_string()));
        assert!(argv.contains(&"20".to_string()));
    }
}
