//! treewalk - A single-pass directory tree processor
//!
//! This library walks a directory tree once, without following symbolic
//! links, and performs one of eight commands on every entry: listing,
//! filtering by extension, counting files or directories, summing sizes,
//! copying, moving, or deleting by extension. Roots and destinations are
//! confined to the user's home directory, and a failure on one entry never
//! stops the walk.

pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod fs_ops;
pub mod output;
pub mod validate;
pub mod walker;

pub use config::{ConfigError, ToolConfig};
pub use error::{EntryError, FsOpError, PreflightError};
pub use extension::{Extension, has_extension};
pub use walker::{
    AggregateResult, Command, EntryFailure, TraversalContext, TreeWalker, VisitedEntry, WalkReport,
};

pub use cli::{Cli, Settings, TreeCommand, run_cli};
