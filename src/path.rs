// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations of the files relsync reads and writes when the
//! user does not name them explicitly.

use std::path::{Path, PathBuf};

/// File name of project store looked up by default.
pub const PROJECT_FILE_NAME: &str = "projects.json";

/// Determine default absolute path to project store.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/relsync/projects.json`.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_project_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("relsync").join(PROJECT_FILE_NAME))
        .ok_or(NoWayHome)
}

/// Determine project store to use.
///
/// An explicit path always wins. Otherwise a `projects.json` in the current
/// directory is preferred over the one in the user's config directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn resolve_project_file(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let local = Path::new(PROJECT_FILE_NAME);
    if local.is_file() {
        return Ok(local.to_path_buf());
    }

    default_project_file()
}

/// Determine default absolute path to log file.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/relsync/relsync.log`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_log_file() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("relsync").join("relsync.log"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
