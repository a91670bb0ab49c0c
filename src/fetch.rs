// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote file fetching.
//!
//! Streams a remote resource into a project's save path while showing a
//! progress bar. A same-named file that is still held open by some other
//! process (a running executable, say) is moved aside under an
//! [`ASIDE_PREFIX`] name instead of being overwritten.
//!
//! # Pitfalls
//!
//! The lock probe simply tries to open the file for appending. This is racy:
//! the file may be opened right after the probe. It is good enough to avoid
//! the common conflict, and nothing more.

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::{
    fs::{rename, OpenOptions},
    io,
    path::{Path, PathBuf},
};
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{error, info, instrument, warn};

/// Prefix given to locked files that were moved out of the way.
pub const ASIDE_PREFIX: &str = "old-version-please-delete-manually_";

/// Write buffer size while streaming to disk.
const CHUNK_SIZE: usize = 8192;

/// Check whether a file is held open by someone else.
pub trait LockProbe: Send + Sync {
    /// Return true if path looks locked.
    fn is_locked(&self, path: &Path) -> bool;
}

/// Lock probe that attempts to open the file for appending.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendProbe;

impl LockProbe for AppendProbe {
    fn is_locked(&self, path: &Path) -> bool {
        OpenOptions::new().append(true).open(path).is_err()
    }
}

/// Fetch remote files to disk.
#[derive(Debug, Clone)]
pub struct Fetcher<P = AppendProbe>
where
    P: LockProbe,
{
    client: Client,
    probe: P,
}

impl Fetcher {
    /// Construct new fetcher using [`AppendProbe`].
    pub fn new(client: Client) -> Self {
        Self {
            client,
            probe: AppendProbe,
        }
    }
}

impl<P> Fetcher<P>
where
    P: LockProbe,
{
    /// Construct new fetcher with custom lock probe.
    pub fn with_probe(client: Client, probe: P) -> Self {
        Self { client, probe }
    }

    /// Fetch file, logging instead of failing.
    ///
    /// Returns true if the file was written completely.
    pub async fn fetch(&self, url: &str, destination: impl AsRef<Path>, file_name: &str) -> bool {
        match self.try_fetch(url, destination, file_name).await {
            Ok(path) => {
                info!("download finished: {:?}", path.display());
                true
            }
            Err(err) => {
                error!("download of {file_name} failed: {err}");
                false
            }
        }
    }

    /// Fetch file into destination directory.
    ///
    /// Creates destination directory if needed. Moves a locked file of the
    /// same name aside first. Partial files are left behind on failure.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::CreateDir`] if destination cannot be created.
    /// - Return [`FetchError::SetAside`] if locked file cannot be renamed.
    /// - Return [`FetchError::Request`] on transport failure.
    /// - Return [`FetchError::Status`] if server answers with non-success.
    /// - Return [`FetchError::Write`] if file cannot be written.
    #[instrument(skip(self, url, destination), level = "debug")]
    pub async fn try_fetch(
        &self,
        url: &str,
        destination: impl AsRef<Path>,
        file_name: &str,
    ) -> Result<PathBuf> {
        let destination = destination.as_ref();
        info!("start download: {file_name}");

        mkdirp::mkdirp(destination).map_err(|source| FetchError::CreateDir {
            source,
            path: destination.to_path_buf(),
        })?;

        let path = destination.join(file_name);
        if path.exists() && self.probe.is_locked(&path) {
            let aside = set_aside(&path)?;
            warn!(
                "{:?} is in use, moved it to {:?}",
                path.display(),
                aside.display()
            );
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let bar = progress_bar(total, file_name);

        let file = File::create(&path)
            .await
            .map_err(|source| FetchError::Write {
                source,
                path: path.clone(),
            })?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|source| FetchError::Write {
                    source,
                    path: path.clone(),
                })?;
            bar.inc(chunk.len() as u64);
        }
        writer.flush().await.map_err(|source| FetchError::Write {
            source,
            path: path.clone(),
        })?;
        bar.finish_and_clear();

        Ok(path)
    }
}

/// Move file out of the way under an [`ASIDE_PREFIX`] name.
///
/// Appends a counter when an earlier set aside copy still exists. Never
/// deletes anything.
///
/// # Errors
///
/// - Return [`FetchError::SetAside`] if rename fails.
pub fn set_aside(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut aside = parent.join(format!("{ASIDE_PREFIX}{file_name}"));
    let mut counter = 1;
    while aside.exists() {
        counter += 1;
        aside = parent.join(format!("{ASIDE_PREFIX}{counter}_{file_name}"));
    }

    rename(path, &aside).map_err(|source| FetchError::SetAside {
        source,
        path: path.to_path_buf(),
    })?;

    Ok(aside)
}

fn progress_bar(total: u64, file_name: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let template = if total == 0 {
        "{elapsed_precise:.green}  {msg:<40}  {bytes} ({bytes_per_sec})"
    } else {
        "{elapsed_precise:.green}  {msg:<40}  [{wide_bar:.yellow/blue}] {bytes}/{total_bytes} ({bytes_per_sec})"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(file_name.to_string());

    bar
}

/// File fetching error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Destination directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Locked file cannot be moved out of the way.
    #[error("failed to move locked file {:?} aside", path.display())]
    SetAside {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Connection, timeout, or malformed response.
    #[error("failed to download {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with non-success status.
    #[error("server answered HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Downloaded bytes cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;
