use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory {path:?} is unusable: {message}")]
    StateDir { path: PathBuf, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

fn state_dir_error(path: &Path, message: impl ToString) -> PersistError {
    PersistError::StateDir {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Ensure the state directory exists and is writable; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(state_dir_error(dir, "not a directory")),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| state_dir_error(dir, e))?;
        }
        Err(err) => return Err(state_dir_error(dir, err)),
    }
    // Writability probe; the temp file is removed on drop.
    NamedTempFile::new_in(dir).map_err(|e| state_dir_error(dir, e))?;
    Ok(())
}

/// Removes everything previously persisted under `dir` and leaves it empty.
///
/// Returns the number of entries removed.
pub fn reset_state_dir(dir: &Path) -> Result<usize, PersistError> {
    ensure_state_dir(dir)?;
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Replaces `{dir}/{filename}` with `content` via a synced temp file and rename,
/// so readers see either the old or the new file.
pub fn write_state_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
    ensure_state_dir(dir)?;
    let target = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
    Ok(target)
}

/// Reads `{dir}/{filename}`; a missing file is `Ok(None)`.
pub fn read_state_file(dir: &Path, filename: &str) -> Result<Option<String>, PersistError> {
    match fs::read_to_string(dir.join(filename)) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
