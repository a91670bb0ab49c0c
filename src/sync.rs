// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project synchronization.
//!
//! The synchronizer walks every project of a [`ProjectList`] one at a time and
//! brings its save path up to date with the forge.
//!
//! # Project States
//!
//! Each project moves through a small state machine:
//!
//! ```text
//! Start ─> Lookup ─┬─> Download ─┬─> VersionUpdate ─> Done
//!                  │      ^      │
//!                  │      │  (artifact unusable)
//!                  │      │      v
//!                  │    ReleaseFallback
//!                  └──────────────────────────────> Done (up to date)
//! ```
//!
//! The lookup is [`resolve::resolve`]: projects at the "CI" version track
//! the newest artifact, everything else tracks the latest release. A release
//! whose tag equals the stored version ends the walk right away. When not a
//! single file of a CI artifact could be downloaded, which is what happens
//! without a token since artifact archives require one, the latest release
//! is tried instead. Any other failure ends the walk with a failed outcome,
//! and the batch moves on to the next project.
//!
//! # Downloads
//!
//! Files are downloaded in forge order. A file that looks like an archive is
//! extracted right after its download, before the next file is fetched. One
//! failed download does not stop the others.

use crate::{
    client::{ClientError, ClientSettings},
    config::{ProjectDescriptor, ProjectList},
    extract::{self, is_archive},
    fetch::{AppendProbe, Fetcher, LockProbe},
    forge::{Forge, GithubForge, GITHUB_API_URL},
    resolve::{self, DownloadTarget, Origin, Resolution},
    store::{ProjectStore, StoreError},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    time::Duration,
};
use tracing::{error, info, instrument, warn};

/// When to write changed versions back to the project store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// Save whole project list once every project was processed.
    #[default]
    EndOfRun,

    /// Save each changed version right away.
    PerProject,
}

/// Synchronizer configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Forge API root.
    pub api_url: String,

    /// Opaque access token for forge and downloads.
    pub token: Option<String>,

    /// When to write versions back to the store.
    pub persist: PersistMode,

    /// Skip projects whose `save_path/name` file already exists.
    pub skip_existing: bool,

    /// Connect timeout for every request.
    pub connect_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API_URL.into(),
            token: None,
            persist: PersistMode::default(),
            skip_existing: false,
            connect_timeout: None,
        }
    }
}

/// Result of synchronizing one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Project reached its resolved version.
    pub success: bool,

    /// Version the project is at after synchronization.
    pub resolved_version: String,

    /// Number of files downloaded.
    pub downloads: usize,
}

impl SyncOutcome {
    fn failure(version: impl Into<String>) -> Self {
        Self {
            success: false,
            resolved_version: version.into(),
            downloads: 0,
        }
    }

    fn success(version: impl Into<String>, downloads: usize) -> Self {
        Self {
            success: true,
            resolved_version: version.into(),
            downloads,
        }
    }
}

/// Tally of a whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub updated: usize,
    pub up_to_date: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Display for RunSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{} updated, {} up to date, {} failed, {} skipped",
            self.updated, self.up_to_date, self.failed, self.skipped
        )
    }
}

#[derive(Debug)]
enum SyncState {
    Start,
    Lookup,
    ReleaseFallback,
    Download {
        version: String,
        origin: Origin,
        targets: Vec<DownloadTarget>,
    },
    VersionUpdate {
        version: String,
        downloads: usize,
    },
    Done(SyncOutcome),
}

/// Keep projects in sync with their forge.
#[derive(Debug)]
pub struct Synchronizer<F = GithubForge, P = AppendProbe>
where
    F: Forge,
    P: LockProbe,
{
    config: SyncConfig,
    forge: F,
    fetcher: Fetcher<P>,
}

impl Synchronizer {
    /// Construct new synchronizer talking to GitHub.
    ///
    /// # Errors
    ///
    /// - Return [`ClientError`] if HTTP client cannot be built.
    pub fn new(config: SyncConfig) -> Result<Self, ClientError> {
        let client = ClientSettings {
            token: config.token.clone(),
            connect_timeout: config.connect_timeout,
        }
        .build()?;
        let forge = GithubForge::new(client.clone(), config.api_url.clone());
        let fetcher = Fetcher::new(client);

        Ok(Self {
            config,
            forge,
            fetcher,
        })
    }
}

impl<F, P> Synchronizer<F, P>
where
    F: Forge,
    P: LockProbe,
{
    /// Construct new synchronizer from its parts.
    pub fn with_parts(config: SyncConfig, forge: F, fetcher: Fetcher<P>) -> Self {
        Self {
            config,
            forge,
            fetcher,
        }
    }

    /// Synchronize every project and persist new versions.
    ///
    /// Individual project failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if project list cannot be saved at the end of
    ///   the run.
    pub async fn run(
        &self,
        store: &ProjectStore,
        mut list: ProjectList,
    ) -> Result<RunSummary, StoreError> {
        info!("start updating {} project(s)", list.projects.len());
        let mut summary = RunSummary::default();

        for project in list.projects.iter_mut() {
            info!("{}", "-".repeat(60));
            info!("processing project: {project}");

            if let Err(err) = project.validate() {
                warn!("skipping project entry: {err}");
                summary.skipped += 1;
                continue;
            }

            if self.config.skip_existing && self.already_present(project) {
                info!("{project} is already present, skipping download");
                summary.skipped += 1;
                continue;
            }

            let previous = project.version.clone();
            let outcome = self.sync_project(project).await;
            if !outcome.success {
                error!("project {project} failed to update");
                summary.failed += 1;
                continue;
            }

            if outcome.downloads == 0 && outcome.resolved_version == previous {
                summary.up_to_date += 1;
            } else {
                info!("project {project} updated");
                summary.updated += 1;
            }

            if self.config.persist == PersistMode::PerProject && project.version != previous {
                let saved = store.update_version(&project.owner, &project.name, &project.version);
                if let Err(err) = saved {
                    error!("failed to save version of {project}: {err}");
                }
            }
        }

        info!("{}", "-".repeat(60));
        if self.config.persist == PersistMode::EndOfRun {
            store.save(&list)?;
        }
        info!("all projects processed: {summary}");

        Ok(summary)
    }

    /// Synchronize one project.
    ///
    /// Updates the project's version in memory on success. Never fails, a
    /// failed outcome keeps the version the project came in with.
    #[instrument(skip_all, fields(project = %project))]
    pub async fn sync_project(&self, project: &mut ProjectDescriptor) -> SyncOutcome {
        let destination = match project.target_dir() {
            Ok(destination) => destination,
            Err(err) => {
                error!("cannot determine save path of {project}: {err}");
                return SyncOutcome::failure(project.version.clone());
            }
        };

        if let Err(err) = mkdirp::mkdirp(&destination) {
            error!("cannot create save path {:?}: {err}", destination.display());
            return SyncOutcome::failure(project.version.clone());
        }

        let mut state = SyncState::Start;
        loop {
            state = match state {
                SyncState::Start => SyncState::Lookup,
                SyncState::Lookup => match resolve::resolve(&self.forge, project).await {
                    Ok(resolution) => self.after_lookup(project, resolution),
                    Err(err) => {
                        error!("lookup for {project} failed: {err}");
                        SyncState::Done(SyncOutcome::failure(project.version.clone()))
                    }
                },
                SyncState::ReleaseFallback => {
                    match resolve::latest_release(&self.forge, project).await {
                        Ok(resolution) => self.after_lookup(project, resolution),
                        Err(err) => {
                            error!("release lookup for {project} failed: {err}");
                            SyncState::Done(SyncOutcome::failure(project.version.clone()))
                        }
                    }
                }
                SyncState::Download {
                    version,
                    origin,
                    targets,
                } => {
                    let downloads = self.download_all(&destination, &targets).await;
                    match (downloads, origin) {
                        (0, Origin::Artifact) if !targets.is_empty() => {
                            warn!("artifact of {project} unusable, trying latest release");
                            SyncState::ReleaseFallback
                        }
                        (0, Origin::Release) if !targets.is_empty() => {
                            SyncState::Done(SyncOutcome::failure(project.version.clone()))
                        }
                        _ => SyncState::VersionUpdate { version, downloads },
                    }
                }
                SyncState::VersionUpdate { version, downloads } => {
                    if project.version != version {
                        info!("version of {project}: {} -> {version}", project.version);
                        project.version = version.clone();
                    }
                    SyncState::Done(SyncOutcome::success(version, downloads))
                }
                SyncState::Done(outcome) => return outcome,
            };
        }
    }

    fn after_lookup(&self, project: &ProjectDescriptor, resolution: Resolution) -> SyncState {
        match resolution {
            Resolution::UpToDate { version } => {
                info!("{project} is already at latest version, nothing to download");
                SyncState::Done(SyncOutcome::success(version, 0))
            }
            Resolution::Download {
                version,
                origin,
                targets,
            } => {
                if targets.is_empty() {
                    warn!("no files of {project} matched, nothing to download");
                }
                SyncState::Download {
                    version,
                    origin,
                    targets,
                }
            }
        }
    }

    async fn download_all(&self, destination: &Path, targets: &[DownloadTarget]) -> usize {
        let mut downloads = 0;
        for target in targets {
            if !self
                .fetcher
                .fetch(&target.url, destination, &target.file_name)
                .await
            {
                continue;
            }
            downloads += 1;

            if is_archive(&target.file_name) {
                extract::extract(
                    destination.join(&target.file_name),
                    destination,
                    target.members.as_deref(),
                );
            }
        }

        downloads
    }

    fn already_present(&self, project: &ProjectDescriptor) -> bool {
        project
            .target_dir()
            .map(|dir| dir.join(&project.name).is_file())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CI_VERSION,
        forge::{ForgeError, RemoteArtifact, RemoteRelease, StatusClass},
    };
    use pretty_assertions::assert_eq;
    use reqwest::Client;
    use std::{
        future::Future,
        sync::atomic::{AtomicUsize, Ordering},
    };

    /// Forge that fails every lookup with a fixed status, counting calls.
    struct FailingForge {
        class: StatusClass,
        calls: AtomicUsize,
    }

    impl FailingForge {
        fn new(class: StatusClass) -> Self {
            Self {
                class,
                calls: AtomicUsize::new(0),
            }
        }

        fn error(&self) -> ForgeError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ForgeError::Status {
                class: self.class,
                status: 0,
                url: "fake".into(),
            }
        }
    }

    impl Forge for FailingForge {
        fn latest_release(
            &self,
            _owner: &str,
            _repo: &str,
        ) -> impl Future<Output = crate::forge::Result<RemoteRelease>> + Send {
            let error = self.error();
            async move { Err(error) }
        }

        fn artifacts(
            &self,
            _owner: &str,
            _repo: &str,
        ) -> impl Future<Output = crate::forge::Result<Vec<RemoteArtifact>>> + Send {
            let error = self.error();
            async move { Err(error) }
        }
    }

    fn synchronizer(forge: FailingForge) -> Synchronizer<FailingForge> {
        Synchronizer::with_parts(SyncConfig::default(), forge, Fetcher::new(Client::new()))
    }

    #[tokio::test]
    async fn failed_lookup_keeps_version() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(FailingForge::new(StatusClass::RateLimited));
        let mut project = ProjectDescriptor::new("acme", "tool", "v1.0", dir.path());

        let outcome = sync.sync_project(&mut project).await;
        assert_eq!(outcome, SyncOutcome::failure("v1.0"));
        assert_eq!(project.version, "v1.0");
    }

    #[tokio::test]
    async fn failed_ci_lookups_try_release_and_keep_ci() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(FailingForge::new(StatusClass::Unauthorized));
        let mut project = ProjectDescriptor::new("acme", "tool", CI_VERSION, dir.path());

        let outcome = sync.sync_project(&mut project).await;
        assert!(!outcome.success);
        assert_eq!(project.version, CI_VERSION);
        assert_eq!(sync.forge.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_and_existing_projects_are_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("tool"), "installed")?;
        let store = ProjectStore::open(dir.path().join("projects.json"));

        let config = SyncConfig {
            skip_existing: true,
            ..Default::default()
        };
        let forge = FailingForge::new(StatusClass::ServerError);
        let sync = Synchronizer::with_parts(config, forge, Fetcher::new(Client::new()));

        let list = ProjectList {
            token: None,
            projects: vec![
                ProjectDescriptor::new("", "nameless", "v1.0", dir.path()),
                ProjectDescriptor::new("acme", "tool", "v1.0", dir.path()),
                ProjectDescriptor::new("acme", "broken", "v1.0", dir.path()),
            ],
        };

        let summary = sync.run(&store, list.clone()).await?;
        assert_eq!(
            summary,
            RunSummary {
                updated: 0,
                up_to_date: 0,
                failed: 1,
                skipped: 2,
            }
        );
        assert_eq!(sync.forge.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load()?, list);

        Ok(())
    }
}
