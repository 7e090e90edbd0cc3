//! Command-line interface module for treewalk.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing (clap)
//! - Pre-flight validation of roots, destinations and extensions
//! - Building the traversal context and running the walk
//! - Printing the aggregate line of the counting commands

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ToolConfig;
use crate::error::{EntryError, PreflightError};
use crate::extension::Extension;
use crate::output::OutputFormatter;
use crate::validate::{check_directory, prepare_destination};
use crate::walker::{Command, TraversalContext, TreeWalker, WalkReport};

#[derive(Debug, Parser)]
#[command(
    name = "treewalk",
    version,
    about = "Walk a directory tree once and act on every entry",
    long_about = "Walks a directory under your home directory without following symbolic links \
                  and lists, counts, sizes, copies, moves or deletes its entries."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: TreeCommand,

    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log progress of the walk
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log every decision of the walk
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RootArgs {
    /// Directory to walk
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Directory to walk
    pub root_dir: PathBuf,
    /// File extension including the dot, e.g. .txt
    pub ext: String,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum TreeCommand {
    /// Print every file and directory
    #[command(visible_alias = "ls")]
    ListAll(RootArgs),

    /// Print files with the given extension
    #[command(visible_alias = "ext")]
    ListByExtension(FilterArgs),

    /// Count regular files
    #[command(visible_alias = "fc")]
    CountFiles(RootArgs),

    /// Count directories, the root included
    #[command(visible_alias = "dc")]
    CountDirs(RootArgs),

    /// Sum the sizes of regular files
    #[command(visible_alias = "fs")]
    SumSize(RootArgs),

    /// Copy the tree into a destination, optionally excluding one extension
    #[command(visible_alias = "cp")]
    Copy {
        /// Directory to copy from
        root_dir: PathBuf,
        /// Directory to copy into, created if missing
        dest_dir: PathBuf,
        /// Files with this extension are not copied
        ext: Option<String>,
    },

    /// Move the tree into a destination and remove the source
    #[command(visible_alias = "mv")]
    Move {
        /// Directory to move from
        root_dir: PathBuf,
        /// Directory to move into, created if missing
        dest_dir: PathBuf,
    },

    /// Delete files with the given extension
    #[command(visible_alias = "del")]
    DeleteByExtension(FilterArgs),
}

impl TreeCommand {
    pub fn command(&self) -> Command {
        match self {
            TreeCommand::ListAll(_) => Command::ListAll,
            TreeCommand::ListByExtension(_) => Command::ListByExtension,
            TreeCommand::CountFiles(_) => Command::CountFiles,
            TreeCommand::CountDirs(_) => Command::CountDirs,
            TreeCommand::SumSize(_) => Command::SumSize,
            TreeCommand::Copy { .. } => Command::Copy,
            TreeCommand::Move { .. } => Command::Move,
            TreeCommand::DeleteByExtension(_) => Command::DeleteByExtension,
        }
    }

    fn root_dir(&self) -> &Path {
        match self {
            TreeCommand::ListAll(args)
            | TreeCommand::CountFiles(args)
            | TreeCommand::CountDirs(args)
            | TreeCommand::SumSize(args) => args.root_dir.as_path(),
            TreeCommand::ListByExtension(args) | TreeCommand::DeleteByExtension(args) => {
                args.root_dir.as_path()
            }
            TreeCommand::Copy { root_dir, .. } | TreeCommand::Move { root_dir, .. } => {
                root_dir.as_path()
            }
        }
    }

    fn dest_dir(&self) -> Option<&Path> {
        match self {
            TreeCommand::Copy { dest_dir, .. } | TreeCommand::Move { dest_dir, .. } => {
                Some(dest_dir.as_path())
            }
            _ => None,
        }
    }

    fn ext(&self) -> Option<&str> {
        match self {
            TreeCommand::ListByExtension(args) | TreeCommand::DeleteByExtension(args) => {
                Some(args.ext.as_str())
            }
            TreeCommand::Copy { ext, .. } => ext.as_deref(),
            _ => None,
        }
    }
}

/// Inputs the core consumes but does not own: the confinement root and the
/// loaded configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: PathBuf,
    pub config: ToolConfig,
}

impl Settings {
    /// Reads `HOME` from the environment and loads configuration.
    pub fn from_env(config_path: Option<&Path>) -> Result<Self, PreflightError> {
        let home = std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .ok_or(PreflightError::HomeUnset)?;
        let config = ToolConfig::load(config_path, Some(&home))?;
        Ok(Self { home, config })
    }
}

/// Validates the invocation and builds the traversal context.
///
/// Order of checks: root directory, extension, destination (created on
/// demand), then root/destination overlap. Nothing on disk is modified unless
/// the root and extension are valid.
pub fn preflight(
    command: &TreeCommand,
    settings: &Settings,
) -> Result<TraversalContext, PreflightError> {
    let max_len = settings.config.paths.max_length;
    let root = check_directory(command.root_dir(), &settings.home, max_len)?;

    let extension = command
        .ext()
        .map(|raw| Extension::parse(raw, &settings.config.extensions.allowed))
        .transpose()?;

    let destination = match command.dest_dir() {
        Some(dest) => Some(prepare_destination(dest, &root, &settings.home, max_len)?),
        None => None,
    };

    Ok(
        TraversalContext::new(command.command(), root, destination, extension)?
            .with_buffer_size(settings.config.copy.buffer_size)
            .with_max_path_len(max_len),
    )
}

/// Runs one command end to end.
///
/// Per-entry output and the aggregate line are written to `out`; diagnostics
/// go to stderr. Per-entry failures are part of the returned report, only
/// pre-flight failures are returned as errors.
///
/// # Examples
///
/// ```no_run
/// use treewalk::cli::{Settings, TreeCommand, RootArgs, run_cli};
/// use std::path::PathBuf;
///
/// let settings = Settings::from_env(None).unwrap();
/// let command = TreeCommand::CountFiles(RootArgs {
///     root_dir: PathBuf::from("/home/user/projects"),
/// });
/// let report = run_cli(&command, &settings, &mut std::io::stdout()).unwrap();
/// assert!(report.succeeded());
/// ```
pub fn run_cli<W: Write>(
    command: &TreeCommand,
    settings: &Settings,
    out: &mut W,
) -> Result<WalkReport, PreflightError> {
    let ctx = preflight(command, settings)?;
    let mut report = TreeWalker::new(&ctx).run(out);

    if let Some(line) = report.summary_line(ctx.command())
        && let Err(source) = OutputFormatter::summary(out, &line)
    {
        report.record_failure(EntryError::Output {
            path: ctx.root().to_path_buf(),
            source,
        });
    }

    if !report.failures.is_empty() {
        OutputFormatter::error(&format!(
            "{} entr{} could not be processed",
            report.failures.len(),
            if report.failures.len() == 1 { "y" } else { "ies" }
        ));
    }
    Ok(report)
}
