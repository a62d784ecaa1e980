//! Subcommand implementations.
//!
//! Every invocation is one logical operation: a few sequential registry
//! calls, at most one external log/subprocess run, then exit. Nothing is
//! cached between invocations. Bulk operations fan out best-effort and keep
//! going past per-unit failures.

use std::io::IsTerminal;

use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ident::{allocate_unit_name, resolve_identifier};
use crate::journal::{run_journalctl, LogRequest};
use crate::registry::Registry;
use crate::slug::friendly_name;
use crate::target::resolve_target;
use crate::watchtool;

/// Starts `path` as a new supervised transient unit with live reload.
pub async fn start<R: Registry>(path: &str, registry: &R) -> Result<()> {
    if !watchtool::tool_available(&watchtool::resolve_uvx_bin()) {
        eprintln!(
            "uvx not found. Install uv (Astral) or set {} to an absolute path.",
            watchtool::ENV_UV_BIN
        );
    }

    let spec = resolve_target(std::path::Path::new(path))?;
    let unit = allocate_unit_name(&spec.base_name, registry).await?;
    let exec = watchtool::build_watch_exec(&spec.argv, &spec.watch_paths);
    let extra_ignores = std::env::var(watchtool::ENV_IGNORE).ok();
    let env = watchtool::env_list(extra_ignores.as_deref());
    debug!(
        unit = %unit,
        mode = ?spec.mode,
        workdir = %spec.workdir.display(),
        "starting transient unit"
    );
    registry
        .start_transient(&unit, &spec.workdir, &env, &exec)
        .await?;

    // Best-effort report; the unit may still be activating.
    let (pid, state) = match registry.unit_status(&unit).await {
        Ok(status) => (status.main_pid, status.active_state),
        Err(_) => (0, "unknown".to_string()),
    };
    let hint = format!("ww logs {unit} -f");
    println!("name: {unit}");
    println!("pid: {pid}");
    println!("state: {state}");
    println!("log: {hint}");
    if !std::io::stdout().is_terminal() {
        let line = json!({
            "name": unit,
            "pid": pid,
            "state": state,
            "log_hint": hint,
        });
        println!("{line}");
    }
    Ok(())
}

/// Lists managed units: friendly name, pid, derived state, full unit name.
pub async fn ps<R: Registry>(registry: &R) -> Result<()> {
    for row in ps_rows(registry).await? {
        println!("{}\t{}\t{}\t{}", row.friendly, row.pid, row.state, row.unit);
    }
    Ok(())
}

/// One `ps` output row.
#[derive(Debug, Clone)]
pub struct PsRow {
    pub friendly: String,
    pub pid: u32,
    pub state: String,
    pub unit: String,
}

pub async fn ps_rows<R: Registry>(registry: &R) -> Result<Vec<PsRow>> {
    let mut rows = Vec::new();
    for listing in registry.list_units().await? {
        let (mut state, pid) = match registry.unit_status(&listing.name).await {
            Ok(status) => (status.active_state, status.main_pid),
            Err(_) => (listing.active_state.clone(), 0),
        };
        // A unit mid-reload reports "activating" while its process is already
        // up; show it as active.
        if state == "activating" && pid > 0 {
            state = "active".to_string();
        }
        rows.push(PsRow {
            friendly: friendly_name(&listing.name),
            pid,
            state,
            unit: listing.name,
        });
    }
    Ok(rows)
}

/// Prints the detailed status block for one identifier.
pub async fn status<R: Registry>(id: &str, registry: &R) -> Result<()> {
    let unit = resolve_identifier(id, registry).await?;
    let st = registry.unit_status(&unit).await?;
    println!("name: {unit}");
    println!("state: {} ({})", st.active_state, st.sub_state);
    println!("pid: {}", st.main_pid);
    println!("restarts: {}", st.n_restarts);
    if !st.result.is_empty() {
        println!("result: {}", st.result);
    }
    if let Some(dir) = &st.working_directory {
        println!("workdir: {}", dir.display());
    }
    println!("log: ww logs {unit} -f");
    Ok(())
}

/// Prints the bare main PID for one identifier.
pub async fn pid<R: Registry>(id: &str, registry: &R) -> Result<()> {
    let unit = resolve_identifier(id, registry).await?;
    let st = registry.unit_status(&unit).await?;
    println!("{}", st.main_pid);
    Ok(())
}

/// Shows or follows journal output for one identifier.
///
/// Scoped to the last activation unless `all` is set, so reload churn from
/// earlier runs stays out of the default view.
pub async fn logs<R: Registry>(
    id: &str,
    lines: u32,
    follow: bool,
    all: bool,
    registry: &R,
) -> Result<()> {
    let unit = resolve_identifier(id, registry).await?;
    let since = if all {
        None
    } else {
        registry
            .unit_status(&unit)
            .await
            .ok()
            .and_then(|st| st.active_enter_ts)
    };
    run_journalctl(&LogRequest {
        unit,
        lines,
        follow,
        since,
    })
    .await
}

/// Single-unit lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Restart,
    Stop,
    /// Stop and reset failed state; the transient unit disappears.
    Remove,
}

impl Lifecycle {
    fn past_tense(self) -> &'static str {
        match self {
            Lifecycle::Restart => "restarted",
            Lifecycle::Stop => "stopped",
            Lifecycle::Remove => "removed",
        }
    }

    async fn apply<R: Registry>(self, unit: &str, registry: &R) -> Result<()> {
        match self {
            Lifecycle::Restart => registry.restart_unit(unit).await,
            Lifecycle::Stop => registry.stop_unit(unit).await,
            Lifecycle::Remove => {
                registry.stop_unit(unit).await?;
                registry.reset_failed(unit).await
            }
        }
    }
}

/// Applies a lifecycle operation to one resolved identifier.
pub async fn lifecycle<R: Registry>(id: &str, op: Lifecycle, registry: &R) -> Result<()> {
    let unit = resolve_identifier(id, registry).await?;
    op.apply(&unit, registry).await?;
    println!("{} {unit}", op.past_tense());
    Ok(())
}

/// Outcome of a bulk fan-out.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub applied: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

/// Fans a lifecycle operation out to every managed unit, sequentially in the
/// registry's listing order. A per-unit failure is collected, not fatal.
pub async fn bulk_apply<R: Registry>(op: Lifecycle, registry: &R) -> Result<BulkReport> {
    let mut report = BulkReport::default();
    for listing in registry.list_units().await? {
        match op.apply(&listing.name, registry).await {
            Ok(()) => report.applied.push(listing.name),
            Err(err) => report.failed.push((listing.name, err)),
        }
    }
    Ok(report)
}

/// Bulk entry point with operator-facing output.
pub async fn bulk<R: Registry>(op: Lifecycle, registry: &R) -> Result<()> {
    let report = bulk_apply(op, registry).await?;
    debug!(applied = report.applied.len(), failed = report.failed.len(), "bulk done");
    for (unit, err) in &report.failed {
        eprintln!("{unit}: {err}");
    }
    println!("{} all ww-* units", op.past_tense());
    Ok(())
}

/// Best-effort connectivity and capability diagnostics. Reports, never fails.
pub async fn doctor<R: Registry>(registry: &R) -> Result<()> {
    let bus_ok = registry.list_units().await.is_ok();
    println!("user bus: {}", ok(bus_ok));

    let journal_ok = probe(&["journalctl", "--user", "-n", "1"]).await;
    println!("journalctl --user: {}", ok(journal_ok));

    let uvx_bin = watchtool::resolve_uvx_bin();
    let uvx_ok = probe(&[&uvx_bin, "--version"]).await;
    println!("uvx: {}", ok(uvx_ok));

    let wf_ok = if uvx_ok {
        let spec = watchtool::watchfiles_spec();
        probe_with_timeout(
            &[&uvx_bin, "--from", &spec, "python", "-m", "watchfiles", "--help"],
            std::time::Duration::from_secs(15),
        )
        .await
    } else {
        false
    };
    println!("watchfiles via uvx: {}", ok(wf_ok));

    match linger_hint().await {
        Some(hint) => println!("linger: off (enable via: {hint})"),
        None => println!("linger: ok or unknown"),
    }
    Ok(())
}

fn ok(flag: bool) -> &'static str {
    if flag {
        "ok"
    } else {
        "FAIL"
    }
}

async fn probe(argv: &[&str]) -> bool {
    probe_with_timeout(argv, std::time::Duration::from_secs(10)).await
}

async fn probe_with_timeout(argv: &[&str], timeout: std::time::Duration) -> bool {
    let Some((program, args)) = argv.split_first() else {
        return false;
    };
    let fut = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(status)) => status.success(),
        _ => false,
    }
}

// Suggest `loginctl enable-linger` when user services die at logout.
async fn linger_hint() -> Option<String> {
    let user = std::env::var("USER").ok()?;
    let output = tokio::process::Command::new("loginctl")
        .args(["show-user", &user, "-p", "Linger"])
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    if text.contains("Linger=no") {
        Some("loginctl enable-linger $USER".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testutil::MemoryRegistry;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    #[test]
    fn bulk_continues_past_failures() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-a.service", 10);
        registry.insert_with_pid("ww-b.service", 11);
        registry.insert_with_pid("ww-c.service", 12);
        registry
            .poisoned
            .lock()
            .unwrap()
            .push("ww-b.service".to_string());

        let report = rt()
            .block_on(bulk_apply(Lifecycle::Stop, &registry))
            .unwrap();
        assert_eq!(report.applied, vec!["ww-a.service", "ww-c.service"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "ww-b.service");
        assert_eq!(
            registry.recorded_ops(),
            vec!["stop ww-a.service", "stop ww-c.service"]
        );
    }

    #[test]
    fn bulk_remove_stops_then_resets() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-a.service", 10);
        rt().block_on(bulk_apply(Lifecycle::Remove, &registry))
            .unwrap();
        assert_eq!(
            registry.recorded_ops(),
            vec!["stop ww-a.service", "reset-failed ww-a.service"]
        );
    }

    #[test]
    fn ps_rows_derive_friendly_names_and_states() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-api.service", 42);
        registry.insert(
            "ww-worker.service",
            crate::registry::UnitStatus {
                active_state: "activating".into(),
                sub_state: "auto-restart".into(),
                main_pid: 77,
                ..Default::default()
            },
        );

        let rows = rt().block_on(ps_rows(&registry)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].friendly, "api");
        assert_eq!(rows[0].pid, 42);
        assert_eq!(rows[0].unit, "ww-api.service");
        // Activating with a live pid shows as active.
        assert_eq!(rows[1].state, "active");
    }

    #[test]
    fn lifecycle_resolves_identifier_first() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-api.service", 42);
        rt().block_on(lifecycle("api", Lifecycle::Restart, &registry))
            .unwrap();
        assert_eq!(registry.recorded_ops(), vec!["restart ww-api.service"]);

        let err = rt()
            .block_on(lifecycle("nope", Lifecycle::Restart, &registry))
            .unwrap_err();
        assert!(matches!(err, Error::NoMatch(_)));
    }
}
