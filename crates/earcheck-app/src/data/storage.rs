//! Storage layer for JSON persistence
//!
//! Path-based load/save/delete used by the progress store and settings,
//! plus thin wrappers against the application config directory. A missing
//! or empty file reads as `None`.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::app::NAME;
use crate::error::{AppError, Result};

/// Per-user directory holding settings and saved progress
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| AppError::Config("no per-user config directory on this system".to_string()))?;
    Ok(base.join(NAME))
}

/// `filename` inside [`config_dir`]
pub fn data_path(filename: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(filename))
}

/// Turn an I/O failure into a config error naming the action and the path
fn io_error(action: &str, path: &Path, e: io::Error) -> AppError {
    let msg = match e.kind() {
        ErrorKind::PermissionDenied => format!("Permission denied: cannot {} {:?}", action, path),
        ErrorKind::NotFound => format!("Cannot {} {:?}: parent path does not exist", action, path),
        ErrorKind::ReadOnlyFilesystem => {
            format!("Cannot {} {:?}: filesystem is read-only", action, path)
        }
        _ => format!("Failed to {} {:?}: {}", action, path, e),
    };
    AppError::Config(msg)
}

fn create_dir_if_needed(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| io_error("create directory", path, e))
}

// --- Explicit paths ---

/// Read raw file contents; `None` when the file does not exist
pub fn read_from(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("read", path, e)),
    }
}

/// Parse the JSON document at `path`.
///
/// Missing and blank files give `None`; unreadable or malformed ones are errors.
pub fn load_from<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match read_from(path)? {
        Some(c) if !c.trim().is_empty() => c,
        _ => return Ok(None),
    };

    let data = serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse {:?}: {}", path, e)))?;
    Ok(Some(data))
}

/// Write `data` as pretty JSON to `path`, creating parent directories.
///
/// The document lands in a sibling `.json.tmp` first and is renamed over the target.
pub fn save_to<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_if_needed(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(data)
        .map_err(|e| AppError::Config(format!("Failed to serialize data: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| io_error("write to", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error("replace", path, e))?;
    debug!("Saved {:?}", path);
    Ok(())
}

/// Delete a file at a specific path; a missing file is not an error
pub fn delete_at(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("delete", path, e)),
    }
}

// --- Config directory ---

/// Load data from a JSON file in the config directory
pub fn load<T: DeserializeOwned>(filename: &str) -> Result<Option<T>> {
    load_from(&data_path(filename)?)
}

/// Save data to a JSON file in the config directory
pub fn save<T: Serialize>(filename: &str, data: &T) -> Result<()> {
    save_to(&data_path(filename)?, data)
}
