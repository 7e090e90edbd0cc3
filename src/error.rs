//! Error types for the pre-flight checks, the filesystem primitives and the
//! per-entry handlers of the tree walk.

use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors raised by the low-level filesystem operations (directory creation,
/// file copy and source removal).
#[derive(Debug, thiserror::Error)]
pub enum FsOpError {
    #[error("Error creating directory '{}': {source}", .path.display())]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("Error opening source file '{}': {source}", .path.display())]
    OpenSource { path: PathBuf, source: io::Error },

    #[error("Error opening destination file '{}': {source}", .path.display())]
    OpenDestination { path: PathBuf, source: io::Error },

    #[error("Error reading from '{}': {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Error writing to '{}': {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Error removing '{}': {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },

    #[error("Error traversing '{}': {source}", .path.display())]
    Traverse { path: PathBuf, source: walkdir::Error },
}

/// Fatal errors detected before the walk starts. Any of these aborts the run
/// with exit status 1 and no entry is touched.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("Directory path is empty")]
    EmptyPath,

    #[error("Path exceeds maximum length of {max} bytes: '{}'", .path.display())]
    PathTooLong { path: PathBuf, max: usize },

    #[error("Cannot access '{}': {source}", .path.display())]
    Inaccessible { path: PathBuf, source: io::Error },

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("'{}' exists but is not a directory", .0.display())]
    DestinationNotDirectory(PathBuf),

    #[error("Path must be under home directory '{}': '{}'", .home.display(), .path.display())]
    OutsideHome { path: PathBuf, home: PathBuf },

    #[error("HOME is not set; cannot confine paths to the home directory")]
    HomeUnset,

    #[error("Invalid file extension '{0}'")]
    InvalidExtension(String),

    #[error("File extension required for {0}")]
    MissingExtension(&'static str),

    #[error("Destination directory required for {0}")]
    MissingDestination(&'static str),

    #[error("Source '{}' and destination '{}' overlap", .root.display(), .destination.display())]
    OverlappingPaths { root: PathBuf, destination: PathBuf },

    #[error(transparent)]
    Filesystem(#[from] FsOpError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A recoverable failure on a single entry. The walk records it, sets the
/// sticky error flag and moves on to the next entry.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("Cannot read directory '{}': {source}", .path.display())]
    UnreadableDirectory { path: PathBuf, source: walkdir::Error },

    #[error("Cannot stat '{}': {source}", .path.display())]
    Unstatable { path: PathBuf, source: walkdir::Error },

    #[error("Invalid file size for '{}'", .0.display())]
    InvalidSize(PathBuf),

    #[error("Destination path too long for '{}'", .0.display())]
    DestinationTooLong(PathBuf),

    #[error("Error deleting '{}': {source}", .path.display())]
    Delete { path: PathBuf, source: io::Error },

    #[error("Error writing output for '{}': {source}", .path.display())]
    Output { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Filesystem(#[from] FsOpError),
}
