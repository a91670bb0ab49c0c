// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project store management.
//!
//! The __project store__ is the file holding the [`ProjectList`]. It is read
//! once at the start of a run and written back once at the end, or once per
//! changed project when per-project persistence is requested.
//!
//! # Store Layout
//!
//! The store is JSON by default. A store whose file name ends in ".toml" is
//! read and written as TOML instead, with the exact same layout. Whatever
//! the format, a write replaces the whole file through a temporary file in
//! the same directory so that a crash never leaves half a store behind.

use crate::config::{ConfigError, ProjectList};

use std::{
    fs::read_to_string,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// File format of a project store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    #[default]
    Json,
    Toml,
}

impl StoreFormat {
    /// Determine store format from file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Project list file on disk.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    path: PathBuf,
    format: StoreFormat,
}

impl ProjectStore {
    /// Open project store at path.
    ///
    /// Nothing is read until [`ProjectStore::load`] is called.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = StoreFormat::from_path(&path);
        Self { path, format }
    }

    /// Path of store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load project list.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if store file cannot be read.
    /// - Return [`StoreError::Parse`] if store file is malformed.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> Result<ProjectList> {
        debug!("load project store {:?}", self.path.display());
        let data = read_to_string(&self.path).map_err(|source| StoreError::Read {
            source,
            path: self.path.clone(),
        })?;

        let list = match self.format {
            StoreFormat::Json => data.parse::<ProjectList>(),
            StoreFormat::Toml => ProjectList::from_toml_str(&data),
        }
        .map_err(|source| StoreError::Parse {
            source,
            path: self.path.clone(),
        })?;

        Ok(list)
    }

    /// Save project list, replacing store file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Parse`] if project list cannot be rendered.
    /// - Return [`StoreError::Write`] if store file cannot be replaced.
    #[instrument(skip(self, list), level = "debug")]
    pub fn save(&self, list: &ProjectList) -> Result<()> {
        let data = match self.format {
            StoreFormat::Json => format!("{list}\n"),
            StoreFormat::Toml => list.to_toml_string().map_err(|source| StoreError::Parse {
                source,
                path: self.path.clone(),
            })?,
        };

        self.replace(data.as_bytes())
            .map_err(|source| StoreError::Write {
                source,
                path: self.path.clone(),
            })?;
        info!("project store {:?} saved", self.path.display());

        Ok(())
    }

    /// Persist version of one project.
    ///
    /// Reads the store again, changes the version of the project matching
    /// owner and name, and writes it back. Everything else in the store is
    /// left as found on disk. Returns false if no such project exists.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if store cannot be read or written.
    #[instrument(skip(self), level = "debug")]
    pub fn update_version(&self, owner: &str, name: &str, version: &str) -> Result<bool> {
        let mut list = self.load()?;
        let Some(project) = list.find_mut(owner, name) else {
            warn!("{owner}/{name} vanished from project store, not saving its version");
            return Ok(false);
        };

        project.version = version.to_string();
        self.save(&list)?;

        Ok(true)
    }

    fn replace(&self, data: &[u8]) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        mkdirp::mkdirp(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }
}

/// Project store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store file cannot be read.
    #[error("failed to read project store {:?}", path.display())]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Store file contents are not a valid project list.
    #[error("invalid project store {:?}", path.display())]
    Parse {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },

    /// Store file cannot be replaced.
    #[error("failed to write project store {:?}", path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
