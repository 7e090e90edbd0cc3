/// Filesystem primitives used by the tree walker.
///
/// This module provides the three mutating operations the walker performs
/// outside of plain `rename`/`unlink`: creating a directory chain, copying a
/// single file without ever leaving a truncated destination behind, and
/// removing a whole tree bottom-up once a move has completed.
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::FsOpError;

/// Ensures `path` and all of its missing ancestors exist as directories.
///
/// Missing ancestors are collected bottom-to-top by following the parent
/// chain, then created top-to-bottom. A directory that already exists (or is
/// created concurrently) counts as success, so calling this twice is a no-op
/// the second time.
///
/// # Errors
///
/// Returns [`FsOpError::CreateDirectory`] naming the first path that could not
/// be created, e.g. because of missing permissions or because an ancestor is
/// a regular file.
///
/// # Examples
///
/// ```no_run
/// use treewalk::fs_ops::create_directory;
/// use std::path::Path;
///
/// create_directory(Path::new("/home/user/backup/2024/src")).unwrap();
/// ```
pub fn create_directory(path: &Path) -> Result<(), FsOpError> {
    let mut missing: Vec<&Path> = Vec::new();
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() || ancestor.is_dir() {
            break;
        }
        missing.push(ancestor);
    }

    for dir in missing.into_iter().rev() {
        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(source) => {
                return Err(FsOpError::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(())
}

/// Copies the bytes of `source_path` to `dest_path` in chunks of
/// `buffer_size` bytes.
///
/// The destination is created or truncated. On any failure after it was
/// opened, both handles are closed and the destination is removed, so the
/// destination is either a byte-exact copy or absent. Permissions and
/// timestamps are not carried over.
///
/// Returns the number of bytes copied.
pub fn copy_file(
    source_path: &Path,
    dest_path: &Path,
    buffer_size: usize,
) -> Result<u64, FsOpError> {
    let source = File::open(source_path).map_err(|source| FsOpError::OpenSource {
        path: source_path.to_path_buf(),
        source,
    })?;
    write_new_file(source, source_path, dest_path, buffer_size)
}

/// Streams `reader` into a freshly created `dest_path`, removing the
/// destination if anything goes wrong. `source_path` only labels read errors.
pub fn write_new_file<R: Read>(
    mut reader: R,
    source_path: &Path,
    dest_path: &Path,
    buffer_size: usize,
) -> Result<u64, FsOpError> {
    let mut dest = File::create(dest_path).map_err(|source| FsOpError::OpenDestination {
        path: dest_path.to_path_buf(),
        source,
    })?;

    let result = stream(&mut reader, &mut dest, source_path, dest_path, buffer_size);
    drop(dest);
    drop(reader);

    if result.is_err()
        && let Err(e) = fs::remove_file(dest_path)
    {
        tracing::warn!(path = %dest_path.display(), error = %e, "could not remove partial copy");
    }
    result
}

fn stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    source_path: &Path,
    dest_path: &Path,
    buffer_size: usize,
) -> Result<u64, FsOpError> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FsOpError::Read {
                    path: source_path.to_path_buf(),
                    source,
                });
            }
        };
        // write_all turns a short write into WriteZero.
        writer
            .write_all(&buffer[..read])
            .map_err(|source| FsOpError::Write {
                path: dest_path.to_path_buf(),
                source,
            })?;
        total += read as u64;
    }

    writer.flush().map_err(|source| FsOpError::Write {
        path: dest_path.to_path_buf(),
        source,
    })?;
    Ok(total)
}

/// Removes `root` and everything beneath it, children before parents.
///
/// The traversal is physical: symbolic links are removed, never followed.
/// Stops at the first entry that cannot be removed.
pub fn remove_tree(root: &Path) -> Result<usize, FsOpError> {
    let mut removed = 0;
    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|source| FsOpError::Traverse {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;

        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|source| FsOpError::Remove {
            path: path.to_path_buf(),
            source,
        })?;
        removed += 1;
    }
    Ok(removed)
}

/// Mirrors `entry` under `destination` by stripping the `root` prefix.
///
/// Returns `None` when `entry` does not lie under `root`.
pub fn mirrored_path(root: &Path, entry: &Path, destination: &Path) -> Option<PathBuf> {
    let relative = entry.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        Some(destination.to_path_buf())
    } else {
        Some(destination.join(relative))
    }
}
