use std::io::Write;
use std::path::Path;

use crate::error::{JournalError, Result};

/// True if anything (including a dangling symlink) occupies `path`.
pub fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Move a file, refusing to replace an existing destination.
///
/// Renaming a path onto itself is a no-op once the source is known to
/// exist. The existence check and the rename are two calls; nothing else is
/// expected to write into the journal's paths while it runs.
pub fn rename_file(src: &Path, dst: &Path) -> Result<()> {
    if src == dst {
        std::fs::symlink_metadata(src).map_err(|e| JournalError::io(src, e))?;
        return Ok(());
    }
    if exists(dst) {
        return Err(JournalError::DestinationExists {
            path: dst.to_path_buf(),
        });
    }
    std::fs::rename(src, dst).map_err(|e| JournalError::io(src, e))?;
    sync_dir(parent_dir(dst))?;
    Ok(())
}

/// Return `haystack` with every occurrence of `needle` replaced, or `None`
/// when there is nothing to replace.
pub fn replace_bytes(haystack: &[u8], needle: &[u8], with: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut found = false;
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        found = true;
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(with);
        rest = &rest[pos + needle.len()..];
    }
    if !found {
        return None;
    }
    out.extend_from_slice(rest);
    Some(out)
}

/// Substitute `from` with `to` inside the file at `path`.
///
/// The new contents go to a temp file next to `path` which then replaces it
/// with a single rename, so the original is never left half-written.
/// Returns `false` and leaves the file untouched when `from` does not occur.
pub fn replace_in_file(path: &Path, from: &str, to: &str) -> Result<bool> {
    let contents = std::fs::read(path).map_err(|e| JournalError::io(path, e))?;
    match replace_bytes(&contents, from.as_bytes(), to.as_bytes()) {
        Some(rewritten) => {
            write_atomic(path, &rewritten)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Replace `path` with `contents` via temp file, fsync and rename.
///
/// Permissions of an existing file at `path` are carried over.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".opjournal")
        .tempfile_in(dir)
        .map_err(|e| JournalError::io(dir, e))?;

    tmp.write_all(contents)
        .map_err(|e| JournalError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| JournalError::io(tmp.path(), e))?;

    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| JournalError::io(tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| JournalError::io(path, e.error))?;
    sync_dir(dir)
}

/// Flush a directory entry change to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let handle = std::fs::File::open(dir).map_err(|e| JournalError::io(dir, e))?;
    handle.sync_all().map_err(|e| JournalError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
