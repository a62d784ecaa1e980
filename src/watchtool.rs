//! Construction of the external watch-tool invocation.
//!
//! Each managed unit runs `watchfiles` (via `uvx`) wrapping the resolved
//! interpreter command, so reload-on-change is entirely the watch tool's
//! business. Environment overrides: `WW_UV_BIN` picks the uvx binary,
//! `WW_WF_VERSION` pins the watchfiles version, `WW_IGNORE` appends
//! comma-separated ignore fragments to the built-in list.

use std::path::{Path, PathBuf};

/// Ignore fragments always passed to the watch tool.
pub const BUILTIN_IGNORES: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "env",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
    "node_modules",
    "dist",
    "build",
    ".idea",
    ".vscode",
];

/// Env var overriding the uvx binary path.
pub const ENV_UV_BIN: &str = "WW_UV_BIN";
/// Env var pinning the watchfiles version.
pub const ENV_WF_VERSION: &str = "WW_WF_VERSION";
/// Env var with extra comma-separated ignore fragments.
pub const ENV_IGNORE: &str = "WW_IGNORE";

/// Resolves the uvx binary: `WW_UV_BIN` verbatim when it carries a path
/// separator, otherwise a PATH lookup falling back to the bare name.
pub fn resolve_uvx_bin() -> String {
    let prefer = std::env::var(ENV_UV_BIN)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "uvx".to_string());
    if prefer.contains(std::path::MAIN_SEPARATOR) {
        return prefer;
    }
    find_in_path(&prefer).unwrap_or(prefer)
}

fn find_in_path(name: &str) -> Option<String> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate.to_string_lossy().into_owned());
        }
    }
    None
}

/// The `watchfiles` spec passed to `uvx --from`, honoring the pin override.
pub fn watchfiles_spec() -> String {
    match std::env::var(ENV_WF_VERSION) {
        Ok(version) if !version.trim().is_empty() => {
            format!("watchfiles=={}", version.trim())
        }
        _ => "watchfiles".to_string(),
    }
}

/// Builds the full exec argv for a unit: uvx running `python -m watchfiles`
/// around the quoted inner command, with the merged ignore list and the
/// watch scope appended.
pub fn build_watch_exec(inner_argv: &[String], watch_paths: &[PathBuf]) -> Vec<String> {
    let target = shell_words::join(inner_argv);
    let mut argv = vec![
        resolve_uvx_bin(),
        "--from".to_string(),
        watchfiles_spec(),
        "python".to_string(),
        "-m".to_string(),
        "watchfiles".to_string(),
        "--filter".to_string(),
        "python".to_string(),
        "--target-type".to_string(),
        "command".to_string(),
        target,
    ];

    let extra = std::env::var(ENV_IGNORE).ok();
    let ignores = merged_ignores(extra.as_deref());
    if !ignores.is_empty() {
        argv.push("--ignore-paths".to_string());
        argv.push(ignores.join(","));
    }

    for path in watch_paths {
        argv.push(path.to_string_lossy().into_owned());
    }
    argv
}

/// Built-in ignore fragments plus any comma-separated extras, trailing
/// slashes trimmed, order-preserving de-dupe.
pub fn merged_ignores(extra: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let extras = extra
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty());
    for fragment in BUILTIN_IGNORES.iter().copied().chain(extras) {
        let fragment = fragment.trim_end_matches('/');
        if !out.iter().any(|seen| seen == fragment) {
            out.push(fragment.to_string());
        }
    }
    out
}

/// Environment entries installed on a new unit: PATH/HOME so the unit can
/// resolve tools and caches, plus pass-through of the WW_* overrides.
pub fn env_list(extra_ignores: Option<&str>) -> Vec<String> {
    let mut env = Vec::new();
    if let Some(extra) = extra_ignores.filter(|v| !v.is_empty()) {
        env.push(format!("{ENV_IGNORE}={extra}"));
    }
    for key in ["PATH", "HOME", ENV_UV_BIN, ENV_WF_VERSION] {
        if let Ok(value) = std::env::var(key) {
            if !value.is_empty() {
                env.push(format!("{key}={value}"));
            }
        }
    }
    env
}

/// True when `path` resolves to an executable-looking file, used by doctor.
pub fn tool_available(name: &str) -> bool {
    let p = Path::new(name);
    if p.components().count() > 1 {
        return p.is_file();
    }
    find_in_path(name).is_some()
}
