//! fsync helpers for the snapshot file.
//!
//! A rename is only durable once the containing directory has been synced, so
//! snapshot writes sync both the temp file and its parent directory.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Flushes a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Flushes a directory's entries (creations, renames) to disk.
///
/// Callers should only pass directories.
pub fn fsync_dir(dir: &Path) -> io::Result<()> {
    OpenOptions::new().read(true).open(dir)?.sync_all()
}
