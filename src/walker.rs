//! The tree-walk engine.
//!
//! A single physical (non link-following) traversal of the root directory,
//! dispatching one handler per entry according to the active [`Command`].
//! The walk is a fold over the entry stream: every handler returns either a
//! [`Tally`] that is absorbed into the [`AggregateResult`], or an
//! [`EntryError`] that is recorded as an [`EntryFailure`] and sets the sticky
//! error flag. No single entry can abort the walk.

use std::fs;
use std::io::{self, Write};
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use walkdir::{DirEntry, WalkDir};

use crate::config::{DEFAULT_COPY_BUFFER_SIZE, DEFAULT_MAX_PATH_LENGTH};
use crate::error::{EntryError, FsOpError, PreflightError};
use crate::extension::{Extension, has_extension};
use crate::fs_ops::{copy_file, create_directory, mirrored_path, remove_tree};
use crate::output::OutputFormatter;

/// The eight operations the walker knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ListAll,
    ListByExtension,
    CountFiles,
    CountDirs,
    SumSize,
    Copy,
    Move,
    DeleteByExtension,
}

impl Command {
    /// The command-line name of this command.
    pub fn name(self) -> &'static str {
        match self {
            Command::ListAll => "list-all",
            Command::ListByExtension => "list-by-extension",
            Command::CountFiles => "count-files",
            Command::CountDirs => "count-dirs",
            Command::SumSize => "sum-size",
            Command::Copy => "copy",
            Command::Move => "move",
            Command::DeleteByExtension => "delete-by-extension",
        }
    }

    fn needs_destination(self) -> bool {
        matches!(self, Command::Copy | Command::Move)
    }

    fn needs_extension(self) -> bool {
        matches!(self, Command::ListByExtension | Command::DeleteByExtension)
    }
}

/// Immutable configuration of one run, built once before the walk.
#[derive(Debug, Clone)]
pub struct TraversalContext {
    command: Command,
    root: PathBuf,
    destination: Option<PathBuf>,
    extension: Option<Extension>,
    buffer_size: usize,
    max_path_len: usize,
}

impl TraversalContext {
    /// Builds a context, checking that `command` got the arguments it needs.
    ///
    /// The paths are taken as given; validating and confining them is the
    /// caller's job (see [`crate::validate`]).
    ///
    /// # Errors
    ///
    /// `copy` and `move` require a destination, `list-by-extension` and
    /// `delete-by-extension` require an extension.
    pub fn new(
        command: Command,
        root: PathBuf,
        destination: Option<PathBuf>,
        extension: Option<Extension>,
    ) -> Result<Self, PreflightError> {
        if command.needs_destination() && destination.is_none() {
            return Err(PreflightError::MissingDestination(command.name()));
        }
        if command.needs_extension() && extension.is_none() {
            return Err(PreflightError::MissingExtension(command.name()));
        }
        Ok(Self {
            command,
            root,
            destination,
            extension,
            buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            max_path_len: DEFAULT_MAX_PATH_LENGTH,
        })
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn extension(&self) -> Option<&Extension> {
        self.extension.as_ref()
    }
}

/// Kind of a visited entry, as reported by `lstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symbolic links, devices, sockets, fifos.
    Other,
}

/// One step of the traversal. Lives for a single handler invocation.
#[derive(Debug, Clone)]
pub struct VisitedEntry {
    pub path: PathBuf,
    pub depth: usize,
    pub kind: EntryKind,
    /// Byte size, regular files only.
    pub size: Option<u64>,
}

impl VisitedEntry {
    /// Turns a walkdir item into an entry, or into the failure it represents.
    ///
    /// Unreadable directories never reach this point (see [`listing_error`]),
    /// so every error left is an entry that cannot be stat-ed.
    fn classify(item: walkdir::Result<DirEntry>) -> Result<Self, EntryError> {
        let entry = item.map_err(|source| EntryError::Unstatable {
            path: source.path().map(Path::to_path_buf).unwrap_or_default(),
            source,
        })?;

        let file_type = entry.file_type();
        let (kind, size) = if file_type.is_file() {
            let metadata = entry.metadata().map_err(|source| EntryError::Unstatable {
                path: entry.path().to_path_buf(),
                source,
            })?;
            (EntryKind::File, Some(metadata.len()))
        } else if file_type.is_dir() {
            (EntryKind::Directory, None)
        } else {
            (EntryKind::Other, None)
        };

        Ok(Self {
            depth: entry.depth(),
            path: entry.into_path(),
            kind,
            size,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What a single handler contributed to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Nothing,
    File,
    Directory,
    Bytes(u64),
    Skipped,
}

/// Counters plus the sticky error flag.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub files: u64,
    pub directories: u64,
    pub total_size: u64,
    error: bool,
}

impl AggregateResult {
    /// True once any entry has failed. Never cleared.
    pub fn has_error(&self) -> bool {
        self.error
    }

    fn set_error(&mut self) {
        self.error = true;
    }
}

/// A failure on one entry, kept for the caller after the walk.
#[derive(Debug)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub error: EntryError,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct WalkReport {
    pub aggregate: AggregateResult,
    pub failures: Vec<EntryFailure>,
    /// Special entries passed over without processing.
    pub skipped: usize,
}

impl WalkReport {
    pub fn succeeded(&self) -> bool {
        !self.aggregate.has_error()
    }

    /// `SUCCESS` only if no entry failed.
    pub fn exit_code(&self) -> ExitCode {
        if self.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    /// The single aggregate line printed by the counting commands.
    pub fn summary_line(&self, command: Command) -> Option<String> {
        match command {
            Command::CountFiles => Some(format!("Total files: {}", self.aggregate.files)),
            Command::CountDirs => Some(format!(
                "Total directories: {}",
                self.aggregate.directories
            )),
            Command::SumSize => Some(format!("Total size: {} bytes", self.aggregate.total_size)),
            _ => None,
        }
    }

    fn absorb(&mut self, path: &Path, tally: Tally) {
        let aggregate = &mut self.aggregate;
        match tally {
            Tally::Nothing => {}
            Tally::File => aggregate.files += 1,
            Tally::Directory => aggregate.directories += 1,
            Tally::Bytes(size) => match aggregate.total_size.checked_add(size) {
                Some(total) => aggregate.total_size = total,
                None => self.record_failure(EntryError::InvalidSize(path.to_path_buf())),
            },
            Tally::Skipped => self.skipped += 1,
        }
    }

    pub(crate) fn record_failure(&mut self, error: EntryError) {
        OutputFormatter::warning(&error.to_string());
        let path = failure_path(&error);
        self.aggregate.set_error();
        self.failures.push(EntryFailure { path, error });
    }
}

fn failure_path(error: &EntryError) -> PathBuf {
    match error {
        EntryError::UnreadableDirectory { path, .. }
        | EntryError::Unstatable { path, .. }
        | EntryError::Delete { path, .. }
        | EntryError::Output { path, .. }
        | EntryError::InvalidSize(path)
        | EntryError::DestinationTooLong(path) => path.clone(),
        EntryError::Filesystem(fs_error) => match fs_error {
            FsOpError::CreateDirectory { path, .. }
            | FsOpError::OpenSource { path, .. }
            | FsOpError::OpenDestination { path, .. }
            | FsOpError::Read { path, .. }
            | FsOpError::Write { path, .. }
            | FsOpError::Remove { path, .. }
            | FsOpError::Traverse { path, .. } => path.clone(),
        },
    }
}

/// Drives one traversal of a [`TraversalContext`].
///
/// # Examples
///
/// ```no_run
/// use treewalk::walker::{Command, TraversalContext, TreeWalker};
/// use std::path::PathBuf;
///
/// let ctx = TraversalContext::new(
///     Command::CountFiles,
///     PathBuf::from("/home/user/projects"),
///     None,
///     None,
/// )
/// .unwrap();
/// let report = TreeWalker::new(&ctx).run(&mut std::io::stdout());
/// println!("{} files", report.aggregate.files);
/// ```
pub struct TreeWalker<'a> {
    ctx: &'a TraversalContext,
}

impl<'a> TreeWalker<'a> {
    pub fn new(ctx: &'a TraversalContext) -> Self {
        Self { ctx }
    }

    /// Walks the tree, then runs the move finalization phase.
    pub fn run<W: Write>(&self, out: &mut W) -> WalkReport {
        let mut report = self.walk(out);
        self.finalize(&mut report);
        report
    }

    /// Visits every entry under the root exactly once, pre-order, siblings in
    /// file-name order. Symbolic links are reported as entries, never followed.
    pub fn walk<W: Write>(&self, out: &mut W) -> WalkReport {
        let root = self.ctx.root();
        tracing::info!(command = self.ctx.command().name(), root = %root.display(), "starting walk");

        let mut entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .peekable();
        let mut report = WalkReport::default();

        while let Some(item) = entries.next() {
            let outcome = match listing_error(&item, &mut entries) {
                Some(source) => {
                    let path = source.path().map(Path::to_path_buf).unwrap_or_default();
                    Err(EntryError::UnreadableDirectory { path, source })
                }
                None => VisitedEntry::classify(item)
                    .and_then(|entry| self.visit(&entry, out).map(|tally| (entry, tally))),
            };
            match outcome {
                Ok((entry, tally)) => report.absorb(&entry.path, tally),
                Err(error) => report.record_failure(error),
            }
        }

        tracing::info!(
            failures = report.failures.len(),
            skipped = report.skipped,
            "walk finished"
        );
        report
    }

    /// Removes the emptied source tree after a clean move.
    ///
    /// Does nothing for other commands. If any entry failed during the walk
    /// the source is left in place for inspection.
    pub fn finalize(&self, report: &mut WalkReport) {
        if self.ctx.command() != Command::Move {
            return;
        }
        let root = self.ctx.root();
        if report.aggregate.has_error() {
            OutputFormatter::warning(&format!(
                "Errors occurred during move; source '{}' left in place",
                root.display()
            ));
            return;
        }
        match remove_tree(root) {
            Ok(removed) => tracing::info!(removed, root = %root.display(), "removed moved source"),
            Err(e) => report.record_failure(EntryError::Filesystem(e)),
        }
    }

    fn visit<W: Write>(&self, entry: &VisitedEntry, out: &mut W) -> Result<Tally, EntryError> {
        let ext = self.ctx.extension().map(Extension::as_str);

        match entry.kind {
            EntryKind::Other => {
                OutputFormatter::warning(&format!(
                    "Skipping special file '{}'",
                    entry.path.display()
                ));
                return Ok(Tally::Skipped);
            }
            EntryKind::Directory => {
                return match self.ctx.command() {
                    Command::ListAll => self.print(entry, out),
                    Command::CountDirs => Ok(Tally::Directory),
                    Command::Copy => self.mirror_directory(entry),
                    Command::Move if entry.depth > 0 => self.mirror_directory(entry),
                    _ => Ok(Tally::Nothing),
                };
            }
            EntryKind::File => {}
        }

        match self.ctx.command() {
            Command::ListAll => self.print(entry, out),
            Command::ListByExtension if has_extension(&entry.file_name(), ext) => {
                self.print(entry, out)
            }
            Command::CountFiles => Ok(Tally::File),
            Command::SumSize => entry
                .size
                .map(Tally::Bytes)
                .ok_or_else(|| EntryError::InvalidSize(entry.path.clone())),
            Command::Copy => {
                if ext.is_some() && has_extension(&entry.file_name(), ext) {
                    tracing::debug!(path = %entry.path.display(), "excluded from copy");
                    return Ok(Tally::Nothing);
                }
                let dest = self.destination_for(entry)?;
                copy_file(&entry.path, &dest, self.ctx.buffer_size)?;
                Ok(Tally::Nothing)
            }
            Command::Move => self.move_file(entry),
            Command::DeleteByExtension if has_extension(&entry.file_name(), ext) => {
                fs::remove_file(&entry.path).map_err(|source| EntryError::Delete {
                    path: entry.path.clone(),
                    source,
                })?;
                Ok(Tally::Nothing)
            }
            _ => Ok(Tally::Nothing),
        }
    }

    fn print<W: Write>(&self, entry: &VisitedEntry, out: &mut W) -> Result<Tally, EntryError> {
        OutputFormatter::entry(out, &entry.path).map_err(|source| EntryError::Output {
            path: entry.path.clone(),
            source,
        })?;
        Ok(Tally::Nothing)
    }

    fn mirror_directory(&self, entry: &VisitedEntry) -> Result<Tally, EntryError> {
        let dest = self.destination_for(entry)?;
        create_directory(&dest)?;
        Ok(Tally::Nothing)
    }

    /// Places a file at its mirrored destination.
    ///
    /// This is a hard link rather than a rename: the source must stay
    /// complete until finalization, which only removes it after a walk
    /// without failures.
    fn move_file(&self, entry: &VisitedEntry) -> Result<Tally, EntryError> {
        let dest = self.destination_for(entry)?;
        link_or_copy(&entry.path, &dest, self.ctx.buffer_size, |src, dst| {
            fs::hard_link(src, dst)
        })?;
        Ok(Tally::Nothing)
    }

    /// Root-relative mirror of `entry` under the destination.
    fn destination_for(&self, entry: &VisitedEntry) -> Result<PathBuf, EntryError> {
        let too_long = || EntryError::DestinationTooLong(entry.path.clone());
        let destination = self.ctx.destination().ok_or_else(too_long)?;
        let dest = mirrored_path(self.ctx.root(), &entry.path, destination).ok_or_else(too_long)?;
        if dest.as_os_str().len() > self.ctx.max_path_len {
            return Err(too_long());
        }
        Ok(dest)
    }
}

/// Takes the listing error of a directory out of the entry stream.
///
/// walkdir yields a directory before it opens it; when the directory cannot be
/// listed, the next item is an error carrying the directory's own path. Such a
/// directory is unreadable and is not dispatched as a directory at all.
fn listing_error(
    item: &walkdir::Result<DirEntry>,
    rest: &mut Peekable<walkdir::IntoIter>,
) -> Option<walkdir::Error> {
    let dir = match item {
        Ok(entry) if entry.file_type().is_dir() => entry.path(),
        _ => return None,
    };
    match rest.next_if(|next| matches!(next, Err(e) if e.path() == Some(dir))) {
        Some(Err(e)) => Some(e),
        _ => None,
    }
}

/// Links `source` at `dest`, falling back to a streamed copy when linking
/// fails (different filesystems, no link support).
fn link_or_copy(
    source: &Path,
    dest: &Path,
    buffer_size: usize,
    link: impl Fn(&Path, &Path) -> io::Result<()>,
) -> Result<(), FsOpError> {
    if let Err(e) = link(source, dest) {
        tracing::debug!(
            path = %source.display(),
            error = %e,
            "link into destination failed, falling back to copy"
        );
        copy_file(source, dest, buffer_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// root/
    ///   a.txt
    ///   b.c
    ///   sub/
    ///     c.txt
    ///     deep/
    ///       d.pdf
    fn sample_tree() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("root");
        fs::create_dir_all(root.join("sub").join("deep")).unwrap();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("b.c"), "int main(void) { return 0; }\n").unwrap();
        fs::write(root.join("sub").join("c.txt"), "gamma").unwrap();
        fs::write(root.join("sub/deep/d.pdf"), b"%PDF-1.4\n\xE2\xE3").unwrap();
        (temp_dir, root)
    }

    fn ext(raw: &str) -> Extension {
        let allowed = vec![".c".to_string(), ".txt".to_string(), ".pdf".to_string()];
        Extension::parse(raw, &allowed).unwrap()
    }

    fn run(ctx: &TraversalContext) -> (WalkReport, String) {
        let mut out = Vec::new();
        let report = TreeWalker::new(ctx).run(&mut out);
        (report, String::from_utf8(out).unwrap())
    }

    fn context(command: Command, root: &Path) -> TraversalContext {
        TraversalContext::new(command, root.to_path_buf(), None, None).unwrap()
    }

    fn assert_same_bytes(a: &Path, b: &Path) {
        assert_eq!(
            fs::read(a).unwrap(),
            fs::read(b).unwrap(),
            "{} and {} differ",
            a.display(),
            b.display()
        );
    }

    #[test]
    fn test_list_all_prints_every_entry_in_order() {
        let (_guard, root) = sample_tree();
        let (report, out) = run(&context(Command::ListAll, &root));

        let expected: Vec<String> = ["", "a.txt", "b.c", "sub", "sub/c.txt", "sub/deep", "sub/deep/d.pdf"]
            .iter()
            .map(|rel| {
                if rel.is_empty() {
                    root.display().to_string()
                } else {
                    root.join(rel).display().to_string()
                }
            })
            .collect();
        assert_eq!(out.lines().collect::<Vec<_>>(), expected);
        assert!(report.succeeded());
    }

    #[test]
    fn test_list_by_extension_prints_matching_files_only() {
        let (_guard, root) = sample_tree();
        let ctx = TraversalContext::new(
            Command::ListByExtension,
            root.clone(),
            None,
            Some(ext(".txt")),
        )
        .unwrap();

        let (report, out) = run(&ctx);

        assert_eq!(
            out.lines().collect::<Vec<_>>(),
            vec![
                root.join("a.txt").display().to_string(),
                root.join("sub/c.txt").display().to_string()
            ]
        );
        assert!(report.succeeded());
    }

    #[test]
    fn test_list_by_extension_on_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = TraversalContext::new(
            Command::ListByExtension,
            temp_dir.path().to_path_buf(),
            None,
            Some(ext(".c")),
        )
        .unwrap();

        let (report, out) = run(&ctx);

        assert!(out.is_empty());
        assert!(report.succeeded());
    }

    #[test]
    fn test_counts_and_size() {
        let (_guard, root) = sample_tree();

        let (files, _) = run(&context(Command::CountFiles, &root));
        let (dirs, _) = run(&context(Command::CountDirs, &root));
        let (size, _) = run(&context(Command::SumSize, &root));

        assert_eq!(files.aggregate.files, 4);
        assert_eq!(dirs.aggregate.directories, 3);
        let expected: u64 = ["a.txt", "b.c", "sub/c.txt", "sub/deep/d.pdf"]
            .iter()
            .map(|rel| fs::metadata(root.join(rel)).unwrap().len())
            .sum();
        assert_eq!(size.aggregate.total_size, expected);

        assert_eq!(
            files.summary_line(Command::CountFiles).as_deref(),
            Some("Total files: 4")
        );
        assert_eq!(
            dirs.summary_line(Command::CountDirs).as_deref(),
            Some("Total directories: 3")
        );
        assert_eq!(
            size.summary_line(Command::SumSize),
            Some(format!("Total size: {} bytes", expected))
        );
        assert_eq!(files.summary_line(Command::Copy), None);
    }

    #[test]
    fn test_file_and_dir_counts_cover_listed_entries() {
        let (_guard, root) = sample_tree();

        let (files, _) = run(&context(Command::CountFiles, &root));
        let (dirs, _) = run(&context(Command::CountDirs, &root));
        let (_, listing) = run(&context(Command::ListAll, &root));

        assert_eq!(
            (files.aggregate.files + dirs.aggregate.directories) as usize,
            listing.lines().count()
        );
    }

    #[test]
    fn test_copy_mirrors_tree_byte_for_byte() {
        let (guard, root) = sample_tree();
        let dest = guard.path().join("backup");
        fs::create_dir(&dest).unwrap();
        let ctx = TraversalContext::new(Command::Copy, root.clone(), Some(dest.clone()), None)
            .unwrap()
            .with_buffer_size(3);

        let (report, out) = run(&ctx);

        assert!(report.succeeded(), "{:?}", report.failures);
        assert!(out.is_empty());
        for rel in ["a.txt", "b.c", "sub/c.txt", "sub/deep/d.pdf"] {
            assert_same_bytes(&root.join(rel), &dest.join(rel));
        }
        assert!(root.join("a.txt").exists(), "Copy must keep the source");
    }

    #[test]
    fn test_copy_excludes_extension() {
        let (guard, root) = sample_tree();
        let dest = guard.path().join("backup");
        fs::create_dir(&dest).unwrap();
        let ctx = TraversalContext::new(
            Command::Copy,
            root.clone(),
            Some(dest.clone()),
            Some(ext(".txt")),
        )
        .unwrap();

        let (report, _) = run(&ctx);

        assert!(report.succeeded());
        assert!(!dest.join("a.txt").exists());
        assert!(!dest.join("sub/c.txt").exists());
        assert!(dest.join("sub").is_dir());
        assert_same_bytes(&root.join("b.c"), &dest.join("b.c"));
        assert_same_bytes(&root.join("sub/deep/d.pdf"), &dest.join("sub/deep/d.pdf"));
    }

    #[test]
    fn test_copy_path_too_long_fails_only_that_entry() {
        let (guard, root) = sample_tree();
        let dest = guard.path().join("backup");
        fs::create_dir(&dest).unwrap();
        // Room for "/a.txt", "/b.c" and "/sub" but not "/sub/c.txt".
        let limit = dest.as_os_str().len() + "/a.txt".len();
        let ctx = TraversalContext::new(Command::Copy, root.clone(), Some(dest.clone()), None)
            .unwrap()
            .with_max_path_len(limit);

        let (report, _) = run(&ctx);

        assert!(!report.succeeded());
        assert!(dest.join("a.txt").is_file());
        assert!(dest.join("b.c").is_file());
        assert!(!dest.join("sub/c.txt").exists());
        assert!(
            report
                .failures
                .iter()
                .any(|f| matches!(f.error, EntryError::DestinationTooLong(_)))
        );
        assert!(report.failures.iter().any(|f| f.path == root.join("sub/c.txt")));
    }

    #[test]
    fn test_move_relocates_tree_and_removes_source() {
        let (guard, root) = sample_tree();
        let dest = guard.path().join("moved");
        fs::create_dir(&dest).unwrap();
        let originals: Vec<(&str, Vec<u8>)> = ["a.txt", "b.c", "sub/c.txt", "sub/deep/d.pdf"]
            .into_iter()
            .map(|rel| (rel, fs::read(root.join(rel)).unwrap()))
            .collect();
        let ctx =
            TraversalContext::new(Command::Move, root.clone(), Some(dest.clone()), None).unwrap();

        let (report, _) = run(&ctx);

        assert!(report.succeeded(), "{:?}", report.failures);
        assert!(!root.exists(), "Source root should be gone");
        for (rel, content) in originals {
            assert_eq!(fs::read(dest.join(rel)).unwrap(), content);
        }
    }

    #[test]
    fn test_move_with_failure_keeps_source_in_full() {
        let (guard, root) = sample_tree();
        let dest = guard.path().join("moved");
        // A directory where b.c should land blocks that one entry.
        fs::create_dir_all(dest.join("b.c")).unwrap();
        let ctx =
            TraversalContext::new(Command::Move, root.clone(), Some(dest.clone()), None).unwrap();

        let (report, _) = run(&ctx);

        assert!(!report.succeeded());
        assert_eq!(report.failures.len(), 1);
        for rel in ["a.txt", "b.c", "sub/c.txt", "sub/deep/d.pdf"] {
            assert!(root.join(rel).is_file(), "{} should remain", rel);
        }
        // The walk went on past the failure.
        assert!(dest.join("sub/deep/d.pdf").is_file());
    }

    #[test]
    fn test_delete_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.c"), "b").unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        let ctx = TraversalContext::new(
            Command::DeleteByExtension,
            root.to_path_buf(),
            None,
            Some(ext(".txt")),
        )
        .unwrap();

        let (report, _) = run(&ctx);

        assert!(report.succeeded());
        assert!(!root.join("a.txt").exists());
        assert!(!root.join("sub/c.txt").exists());
        assert!(root.join("b.c").exists());
        let (count, _) = run(&context(Command::CountFiles, root));
        assert_eq!(count.aggregate.files, 1);
    }

    #[test]
    fn test_missing_root_is_recorded_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("vanished");

        let (report, out) = run(&context(Command::ListAll, &root));

        assert!(out.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            EntryError::Unstatable { .. }
        ));
        assert!(report.aggregate.has_error());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped_not_followed() {
        let (guard, root) = sample_tree();
        let outside = guard.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "do not touch").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let (listing, out) = run(&context(Command::ListAll, &root));
        let (files, _) = run(&context(Command::CountFiles, &root));

        assert!(listing.succeeded());
        assert_eq!(listing.skipped, 1);
        assert!(!out.lines().any(|line| line.ends_with("/link")));
        assert!(!out.contains("secret.txt"));
        assert_eq!(files.aggregate.files, 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_reported_not_visited() {
        use std::os::unix::fs::PermissionsExt;

        let (guard, root) = sample_tree();
        let locked = root.join("sub").join("deep");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Privileged users list it regardless.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let (listing, out) = run(&context(Command::ListAll, &root));
        let (dirs, _) = run(&context(Command::CountDirs, &root));
        let dest = guard.path().join("moved");
        let ctx =
            TraversalContext::new(Command::Move, root.clone(), Some(dest.clone()), None).unwrap();
        let (moved, _) = run(&ctx);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!out.lines().any(|line| line.ends_with("deep")));
        assert_eq!(listing.failures.len(), 1);
        assert_eq!(listing.failures[0].path, locked);
        assert!(matches!(
            listing.failures[0].error,
            EntryError::UnreadableDirectory { .. }
        ));
        assert_eq!(dirs.aggregate.directories, 2);
        assert!(dirs.aggregate.has_error());
        assert!(!moved.succeeded());
        assert!(!dest.join("sub/deep").exists());
        assert!(root.join("sub/deep/d.pdf").is_file());
    }

    #[test]
    fn test_entry_removed_before_stat_is_unstatable() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("gone.txt");
        fs::write(&file, "x").unwrap();
        let item = WalkDir::new(&file).into_iter().next().unwrap();
        fs::remove_file(&file).unwrap();

        assert!(matches!(
            VisitedEntry::classify(item),
            Err(EntryError::Unstatable { .. })
        ));
    }

    #[test]
    fn test_move_falls_back_to_copy_when_link_fails() {
        let (guard, root) = sample_tree();
        let source = root.join("sub/deep/d.pdf");
        let dest = guard.path().join("d.pdf");

        link_or_copy(&source, &dest, 3, |_, _| Err(io::Error::other("cross-device link")))
            .unwrap();

        assert_same_bytes(&source, &dest);
        assert!(source.is_file());
    }

    #[test]
    fn test_exit_code_follows_sticky_error() {
        let (_guard, root) = sample_tree();
        let success = format!("{:?}", ExitCode::SUCCESS);
        let failure = format!("{:?}", ExitCode::FAILURE);

        let (clean, _) = run(&context(Command::CountFiles, &root));
        assert_eq!(format!("{:?}", clean.exit_code()), success);

        let (mut failed, _) = run(&context(Command::CountFiles, &root.join("vanished")));
        assert_eq!(format!("{:?}", failed.exit_code()), failure);
        // Later successes never clear the flag.
        failed.absorb(&root, Tally::File);
        assert_eq!(failed.aggregate.files, 1);
        assert_eq!(format!("{:?}", failed.exit_code()), failure);
    }

    #[test]
    fn test_context_requires_command_arguments() {
        let root = PathBuf::from("/home/user");
        assert!(matches!(
            TraversalContext::new(Command::Copy, root.clone(), None, None),
            Err(PreflightError::MissingDestination("copy"))
        ));
        assert!(matches!(
            TraversalContext::new(Command::DeleteByExtension, root.clone(), None, None),
            Err(PreflightError::MissingExtension("delete-by-extension"))
        ));
        assert!(TraversalContext::new(Command::SumSize, root, None, None).is_ok());
    }

    #[test]
    fn test_size_overflow_sets_error() {
        let mut report = WalkReport::default();
        report.aggregate.total_size = u64::MAX - 1;

        report.absorb(Path::new("/big"), Tally::Bytes(10));

        assert_eq!(report.aggregate.total_size, u64::MAX - 1);
        assert!(report.aggregate.has_error());
        assert!(matches!(report.failures[0].error, EntryError::InvalidSize(_)));
    }
}
