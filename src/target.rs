//! Resolution of a user-supplied path into a launch specification.
//!
//! A target is either a single script file or a directory following one of
//! three entrypoint conventions. Resolution decides the working directory,
//! the interpreter argv, the slug-eligible base name, and the watch scope.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::slug::slugify;

/// Interpreter used to launch resolved targets.
pub const INTERPRETER: &str = "python";

/// How the target directory or file is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// A single script file.
    File,
    /// Directory with `__main__.py`, run as `python -m <dir>` from its parent.
    Package,
    /// Directory with `main.py`, run in place.
    DirMain,
    /// Directory with `app.py`, run in place.
    DirApp,
}

/// Fully resolved launch specification for one target.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub mode: TargetMode,
    /// Absolute working directory; exists at resolution time.
    pub workdir: PathBuf,
    /// Interpreter argv; never empty.
    pub argv: Vec<String>,
    /// Slug-eligible base name, without any service suffix.
    pub base_name: String,
    /// Paths handed to the watch tool. Always exactly the resolved target.
    pub watch_paths: Vec<PathBuf>,
}

/// Resolves `path` into a [`LaunchSpec`].
///
/// Directory conventions are checked in strict priority order: package marker,
/// then `main.py`, then `app.py`. The watch scope is always the named file or
/// directory itself, never expanded.
pub fn resolve_target(path: &Path) -> Result<LaunchSpec> {
    let p = path
        .canonicalize()
        .map_err(|_| Error::NotFound(path.to_path_buf()))?;

    if p.is_file() {
        let workdir = p
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::NotFound(p.clone()))?;
        let file_name = base_name_of(&p);
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        return Ok(LaunchSpec {
            mode: TargetMode::File,
            workdir,
            argv: vec![INTERPRETER.to_string(), file_name.clone()],
            base_name: non_empty_slug(&stem, &file_name),
            watch_paths: vec![p],
        });
    }

    if p.is_dir() {
        let dir_name = base_name_of(&p);
        if p.join("__main__.py").is_file() {
            let workdir = p
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::NoEntrypoint(p.clone()))?;
            return Ok(LaunchSpec {
                mode: TargetMode::Package,
                workdir,
                argv: vec![
                    INTERPRETER.to_string(),
                    "-m".to_string(),
                    dir_name.clone(),
                ],
                base_name: non_empty_slug(&dir_name, &dir_name),
                watch_paths: vec![p],
            });
        }
        for (entry, mode) in [("main.py", TargetMode::DirMain), ("app.py", TargetMode::DirApp)] {
            if p.join(entry).is_file() {
                return Ok(LaunchSpec {
                    mode,
                    workdir: p.clone(),
                    argv: vec![INTERPRETER.to_string(), entry.to_string()],
                    base_name: non_empty_slug(&dir_name, &dir_name),
                    watch_paths: vec![p],
                });
            }
        }
        return Err(Error::NoEntrypoint(p));
    }

    Err(Error::NotFound(p))
}

fn base_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

// The slug of an odd stem (e.g. all punctuation) can come out empty; fall
// back to the full base name, which is non-empty on a resolved path, and
// finally to a fixed label.
fn non_empty_slug(primary: &str, fallback: &str) -> String {
    let slug = slugify(primary);
    if !slug.is_empty() {
        return slug;
    }
    let slug = slugify(fallback);
    if !slug.is_empty() {
        return slug;
    }
    "job".to_string()
}
