//! Config file replacement.
//!
//! The closed config is staged in a hidden file next to its destination and
//! renamed over it, so readers see either the old file or the new one. A
//! staged file that never gets renamed is removed when it is dropped.

use stagecrypt_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

const STAGING_PREFIX: &str = ".stagecrypt-";
const STAGING_SUFFIX: &str = ".tmp";

/// Replace `path` with `content`, creating missing parent directories
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let staged = stage(destination_dir(path), content)?;

    staged
        .persist(path)
        .map_err(|e| Error::file_system(path, "replace", e.error))?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Replaced file");
    Ok(())
}

/// [`write_atomic`] for text
pub fn write_atomic_string(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

// `config.yml` has the parent "", which means the working directory.
fn destination_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn stage(dir: &Path, content: &[u8]) -> Result<NamedTempFile> {
    fs::create_dir_all(dir).map_err(|e| Error::file_system(dir, "create directory", e))?;

    let mut staged = Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| Error::file_system(dir, "create staging file", e))?;

    if let Err(e) = staged.write_all(content) {
        return Err(Error::file_system(staged.path(), "write staging file", e));
    }
    if let Err(e) = staged.as_file().sync_all() {
        return Err(Error::file_system(staged.path(), "sync staging file", e));
    }
    Ok(staged)
}
