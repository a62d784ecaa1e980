//! Access to the external service manager's live registry.
//!
//! The registry contract is seven operations: create a transient unit, probe
//! a unit by name, list units, fetch a property snapshot, stop, restart, and
//! reset a failed unit. Any transport with these semantics is interchangeable;
//! the concrete implementation here shells out to `systemd-run --user` and
//! `systemctl --user`. Snapshots are never cached across invocations.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::slug::is_managed_unit;

/// Point-in-time property snapshot for one unit.
#[derive(Debug, Clone, Default)]
pub struct UnitStatus {
    /// Free-text activity state, e.g. "active", "failed", "activating".
    pub active_state: String,
    pub sub_state: String,
    /// 0 when not running.
    pub main_pid: u32,
    pub n_restarts: u32,
    pub result: String,
    pub working_directory: Option<PathBuf>,
    /// Unix seconds of the last activation, when known.
    pub active_enter_ts: Option<u64>,
}

/// One row from the registry listing.
#[derive(Debug, Clone)]
pub struct UnitListing {
    pub name: String,
    pub active_state: String,
    pub sub_state: String,
}

/// The seven-operation registry contract.
#[allow(async_fn_in_trait)]
pub trait Registry {
    /// Creates and starts a transient unit running `exec` in `workdir`.
    async fn start_transient(
        &self,
        unit: &str,
        workdir: &Path,
        env: &[String],
        exec: &[String],
    ) -> Result<()>;
    /// True if a unit with this exact name is currently registered.
    async fn unit_exists(&self, unit: &str) -> Result<bool>;
    /// All currently-registered managed units, in the registry's own order.
    async fn list_units(&self) -> Result<Vec<UnitListing>>;
    /// Property snapshot for one unit.
    async fn unit_status(&self, unit: &str) -> Result<UnitStatus>;
    async fn stop_unit(&self, unit: &str) -> Result<()>;
    async fn restart_unit(&self, unit: &str) -> Result<()>;
    /// Clears a unit's failed state so a transient unit disappears.
    async fn reset_failed(&self, unit: &str) -> Result<()>;
}

/// Registry implementation backed by the systemd user instance.
#[derive(Debug, Clone, Default)]
pub struct Systemctl;

impl Systemctl {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!(program, ?args, "registry call");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => Error::ToolMissing(program.to_string()),
                _ => Error::Io(err),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Rpc(format!(
                "{program} {} failed: {}",
                args.first().copied().unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn systemctl(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["--user"];
        full.extend_from_slice(args);
        self.run("systemctl", &full).await
    }
}

impl Registry for Systemctl {
    async fn start_transient(
        &self,
        unit: &str,
        workdir: &Path,
        env: &[String],
        exec: &[String],
    ) -> Result<()> {
        let workdir = workdir.to_string_lossy().into_owned();
        let description = format!("ww:{unit}");
        let mut args: Vec<String> = vec![
            "--user".into(),
            "--quiet".into(),
            format!("--unit={unit}"),
            format!("--description={description}"),
            format!("--working-directory={workdir}"),
            "--property=Restart=on-failure".into(),
            "--property=RestartSec=3".into(),
            "--property=KillMode=control-group".into(),
            "--property=StandardOutput=journal".into(),
            "--property=StandardError=journal".into(),
        ];
        for entry in env {
            args.push(format!("--setenv={entry}"));
        }
        args.push("--".into());
        args.extend_from_slice(exec);
        let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run("systemd-run", &borrowed).await?;
        Ok(())
    }

    async fn unit_exists(&self, unit: &str) -> Result<bool> {
        let out = self
            .systemctl(&["show", unit, "-p", "LoadState", "--value"])
            .await?;
        let state = out.trim();
        Ok(!state.is_empty() && state != "not-found")
    }

    async fn list_units(&self) -> Result<Vec<UnitListing>> {
        let out = self
            .systemctl(&[
                "list-units",
                "ww-*",
                "--all",
                "--plain",
                "--no-legend",
                "--no-pager",
            ])
            .await?;
        let mut units = Vec::new();
        for line in out.lines() {
            // Columns: UNIT LOAD ACTIVE SUB DESCRIPTION
            let mut fields = line.split_whitespace();
            let (Some(name), Some(_load), Some(active), Some(sub)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if !is_managed_unit(name) {
                continue;
            }
            units.push(UnitListing {
                name: name.to_string(),
                active_state: active.to_string(),
                sub_state: sub.to_string(),
            });
        }
        Ok(units)
    }

    async fn unit_status(&self, unit: &str) -> Result<UnitStatus> {
        let out = self
            .systemctl(&[
                "show",
                unit,
                "--timestamp=unix",
                "--no-pager",
                "-p",
                "ActiveState,SubState,MainPID,NRestarts,Result,WorkingDirectory,ActiveEnterTimestamp",
            ])
            .await?;
        let mut status = UnitStatus::default();
        for line in out.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "ActiveState" => status.active_state = value.to_string(),
                "SubState" => status.sub_state = value.to_string(),
                "MainPID" => status.main_pid = value.trim().parse().unwrap_or(0),
                "NRestarts" => status.n_restarts = value.trim().parse().unwrap_or(0),
                "Result" => status.result = value.to_string(),
                "WorkingDirectory" if !value.is_empty() => {
                    status.working_directory = Some(PathBuf::from(value));
                }
                // With --timestamp=unix the value reads "@1712345678".
                "ActiveEnterTimestamp" => {
                    status.active_enter_ts =
                        value.trim().strip_prefix('@').and_then(|s| s.parse().ok());
                }
                _ => {}
            }
        }
        if status.active_state.is_empty() {
            status.active_state = "unknown".to_string();
        }
        if status.sub_state.is_empty() {
            status.sub_state = "unknown".to_string();
        }
        Ok(status)
    }

    async fn stop_unit(&self, unit: &str) -> Result<()> {
        self.systemctl(&["stop", unit]).await?;
        Ok(())
    }

    async fn restart_unit(&self, unit: &str) -> Result<()> {
        self.systemctl(&["restart", unit]).await?;
        Ok(())
    }

    async fn reset_failed(&self, unit: &str) -> Result<()> {
        // Inactive transient units have nothing to reset; that is not an error.
        let _ = self.systemctl(&["reset-failed", unit]).await;
        Ok(())
    }
}

#[cfg(test)]
pub mod testutil {
    //! In-memory registry double for router/resolver/command tests.

    use std::path::Path;
    use std::sync::Mutex;

    use super::{Registry, UnitListing, UnitStatus};
    use crate::error::{Error, Result};

    #[derive(Debug, Default)]
    pub struct MemoryRegistry {
        units: Mutex<Vec<(String, UnitStatus)>>,
        pub ops: Mutex<Vec<String>>,
        /// Unit names whose lifecycle calls should fail.
        pub poisoned: Mutex<Vec<String>>,
    }

    impl MemoryRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, unit: &str, status: UnitStatus) {
            self.units
                .lock()
                .unwrap()
                .push((unit.to_string(), status));
        }

        pub fn insert_with_pid(&self, unit: &str, pid: u32) {
            self.insert(
                unit,
                UnitStatus {
                    active_state: "active".into(),
                    sub_state: "running".into(),
                    main_pid: pid,
                    ..UnitStatus::default()
                },
            );
        }

        pub fn recorded_ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn record(&self, op: &str, unit: &str) -> Result<()> {
            if self.poisoned.lock().unwrap().iter().any(|u| u == unit) {
                return Err(Error::Rpc(format!("{op} {unit} refused")));
            }
            self.ops.lock().unwrap().push(format!("{op} {unit}"));
            Ok(())
        }

    }

    impl Registry for MemoryRegistry {
        async fn start_transient(
            &self,
            unit: &str,
            _workdir: &Path,
            _env: &[String],
            _exec: &[String],
        ) -> Result<()> {
            self.record("start", unit)?;
            let next_pid = 1000 + self.units.lock().unwrap().len() as u32;
            self.insert_with_pid(unit, next_pid);
            Ok(())
        }

        async fn unit_exists(&self, unit: &str) -> Result<bool> {
            Ok(self.units.lock().unwrap().iter().any(|(n, _)| n == unit))
        }

        async fn list_units(&self) -> Result<Vec<UnitListing>> {
            Ok(self
                .units
                .lock()
                .unwrap()
                .iter()
                .map(|(name, st)| UnitListing {
                    name: name.clone(),
                    active_state: st.active_state.clone(),
                    sub_state: st.sub_state.clone(),
                })
                .collect())
        }

        async fn unit_status(&self, unit: &str) -> Result<UnitStatus> {
            self.units
                .lock()
                .unwrap()
                .iter()
                .find(|(n, _)| n == unit)
                .map(|(_, st)| st.clone())
                .ok_or_else(|| Error::UnitNotFound(unit.to_string()))
        }

        async fn stop_unit(&self, unit: &str) -> Result<()> {
            self.record("stop", unit)
        }

        async fn restart_unit(&self, unit: &str) -> Result<()> {
            self.record("restart", unit)
        }

        async fn reset_failed(&self, unit: &str) -> Result<()> {
            self.record("reset-failed", unit)
        }
    }
}
