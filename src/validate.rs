//! Directory validation and home-directory confinement.
//!
//! Every root and destination directory passes through here before the walk
//! touches a single entry.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::PreflightError;
use crate::fs_ops::create_directory;
use crate::output::OutputFormatter;

/// Checks that `path` names an existing directory under `home`.
///
/// The checks run in order: non-empty, length within `max_len` bytes,
/// stat-able, a directory, and confined to `home`. Confinement compares the
/// canonical forms of both paths component by component, so `..` segments and
/// symlinks cannot escape the home directory.
///
/// Returns the canonical path of the directory on success.
pub fn check_directory(
    path: &Path,
    home: &Path,
    max_len: usize,
) -> Result<PathBuf, PreflightError> {
    check_length(path, max_len)?;

    let metadata = fs::metadata(path).map_err(|source| PreflightError::Inaccessible {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(PreflightError::NotADirectory(path.to_path_buf()));
    }

    let canonical = canonicalize(path)?;
    check_confinement(&canonical, home)?;
    Ok(canonical)
}

/// Boolean form of [`check_directory`]: emits a diagnostic on stderr and
/// returns false instead of an error.
///
/// # Examples
///
/// ```no_run
/// use treewalk::validate::validate_directory;
/// use std::path::Path;
///
/// if !validate_directory(Path::new("/etc"), Path::new("/home/user"), 4096) {
///     std::process::exit(1);
/// }
/// ```
pub fn validate_directory(path: &Path, home: &Path, max_len: usize) -> bool {
    match check_directory(path, home, max_len) {
        Ok(_) => true,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            false
        }
    }
}

/// Prepares a copy/move destination for the walk of `root`.
///
/// A missing destination is created (with its missing ancestors) only after
/// its confinement and its separation from `root` have been established from
/// the nearest existing ancestor; an existing non-directory is rejected. The
/// result is then validated like any root directory and returned canonical.
pub fn prepare_destination(
    path: &Path,
    root: &Path,
    home: &Path,
    max_len: usize,
) -> Result<PathBuf, PreflightError> {
    check_length(path, max_len)?;

    let target = match fs::metadata(path) {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(PreflightError::DestinationNotDirectory(path.to_path_buf()));
        }
        Ok(_) => path.to_path_buf(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let projected = project_missing(path).ok_or_else(|| PreflightError::Inaccessible {
                path: path.to_path_buf(),
                source: e,
            })?;
            check_confinement(&projected, home)?;
            check_disjoint(root, &projected)?;
            tracing::info!(destination = %projected.display(), "creating destination directory");
            create_directory(&projected)?;
            projected
        }
        Err(source) => {
            return Err(PreflightError::Inaccessible {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let canonical = check_directory(&target, home, max_len)?;
    check_disjoint(root, &canonical)?;
    Ok(canonical)
}

/// Rejects a root and destination that are the same directory or nested in
/// one another. Both paths must already be canonical.
pub fn check_disjoint(root: &Path, destination: &Path) -> Result<(), PreflightError> {
    if root.starts_with(destination) || destination.starts_with(root) {
        return Err(PreflightError::OverlappingPaths {
            root: root.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(())
}

fn check_length(path: &Path, max_len: usize) -> Result<(), PreflightError> {
    let len = path.as_os_str().len();
    if len == 0 {
        return Err(PreflightError::EmptyPath);
    }
    if len > max_len {
        return Err(PreflightError::PathTooLong {
            path: path.to_path_buf(),
            max: max_len,
        });
    }
    Ok(())
}

fn check_confinement(canonical: &Path, home: &Path) -> Result<(), PreflightError> {
    let outside = || PreflightError::OutsideHome {
        path: canonical.to_path_buf(),
        home: home.to_path_buf(),
    };
    // An unresolvable home confines nothing.
    let home = fs::canonicalize(home).map_err(|_| outside())?;
    if canonical.starts_with(&home) {
        Ok(())
    } else {
        Err(outside())
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, PreflightError> {
    fs::canonicalize(path).map_err(|source| PreflightError::Inaccessible {
        path: path.to_path_buf(),
        source,
    })
}

/// Canonical form of a path that does not exist yet: the canonical nearest
/// existing ancestor with the missing components applied to it. `..` in the
/// missing part is resolved here, the way the kernel resolves it once the
/// intermediate directories exist.
fn project_missing(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let anchor = absolute.ancestors().skip(1).find(|ancestor| ancestor.exists())?;
    let missing = absolute.strip_prefix(anchor).ok()?;

    let mut projected = fs::canonicalize(anchor).ok()?;
    for component in missing.components() {
        match component {
            Component::Normal(name) => projected.push(name),
            Component::ParentDir => {
                projected.pop();
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(projected)
}
