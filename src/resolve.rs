// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Asset resolution.
//!
//! Turn forge metadata into something the synchronizer can act on: the
//! version a project should end up at, and the concrete files to download
//! to get there.
//!
//! # Version Semantics
//!
//! Tagged projects compare the forge's latest tag to their stored version by
//! plain string equality. There is no semantic version ordering, so a forge
//! that "goes back" to an older tag still counts as a new version.
//!
//! Projects at [`CI_VERSION`] always resolve to [`CI_VERSION`], even when
//! they fall back to a tagged release because no artifacts exist or the
//! artifact lookup failed. A CI project never graduates to a concrete tag.

use crate::{
    config::{ProjectDescriptor, CI_VERSION},
    forge::{Forge, RemoteArtifact, RemoteAsset, RemoteRelease, Result},
};

use tracing::{debug, info, instrument, warn};

/// Outcome of looking up a project on the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Stored version already matches the forge.
    UpToDate { version: String },

    /// New files to download to reach `version`.
    Download {
        version: String,
        origin: Origin,
        targets: Vec<DownloadTarget>,
    },
}

/// Where download targets came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Release,
    Artifact,
}

/// Single file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Name to save the file under.
    pub file_name: String,

    /// Where to download the file from.
    pub url: String,

    /// Archive members to extract. Everything when `None`.
    pub members: Option<Vec<String>>,
}

/// Resolve what to download for project.
///
/// Tracks CI artifacts for [`CI_VERSION`] projects, falling back to the
/// latest release when the repository has no artifacts or they cannot be
/// listed. Tracks the latest release otherwise.
///
/// # Errors
///
/// - Return [`ForgeError`](crate::forge::ForgeError) if release lookup fails.
pub async fn resolve<F: Forge>(forge: &F, project: &ProjectDescriptor) -> Result<Resolution> {
    if project.tracks_ci() {
        match latest_artifact(forge, project).await {
            Ok(Some(resolution)) => return Ok(resolution),
            Ok(None) => info!("no artifacts found for {project}, trying latest release"),
            Err(err) => {
                warn!("artifact lookup for {project} failed, trying latest release: {err}")
            }
        }
    }

    latest_release(forge, project).await
}

/// Resolve newest CI artifact of project.
///
/// Returns `None` if the repository has no artifacts at all.
///
/// # Errors
///
/// - Return [`ForgeError`](crate::forge::ForgeError) if artifact lookup fails.
#[instrument(skip_all, fields(project = %project), level = "debug")]
pub async fn latest_artifact<F: Forge>(
    forge: &F,
    project: &ProjectDescriptor,
) -> Result<Option<Resolution>> {
    info!("look up latest artifact of {project}");
    let artifacts = forge.artifacts(&project.owner, &project.name).await?;
    Ok(artifacts
        .into_iter()
        .next()
        .map(|artifact| artifact_resolution(project, artifact)))
}

/// Resolve latest tagged release of project.
///
/// # Errors
///
/// - Return [`ForgeError`](crate::forge::ForgeError) if release lookup fails.
#[instrument(skip_all, fields(project = %project), level = "debug")]
pub async fn latest_release<F: Forge>(
    forge: &F,
    project: &ProjectDescriptor,
) -> Result<Resolution> {
    info!("look up latest release of {project}");
    let release = forge.latest_release(&project.owner, &project.name).await?;
    Ok(release_resolution(project, release))
}

/// Decide what a release means for project.
pub fn release_resolution(project: &ProjectDescriptor, release: RemoteRelease) -> Resolution {
    info!(
        "current version: {} | latest version: {}",
        project.version, release.tag_name
    );

    if !project.tracks_ci() && project.version == release.tag_name {
        return Resolution::UpToDate {
            version: project.version.clone(),
        };
    }

    let version = if project.tracks_ci() {
        CI_VERSION.to_string()
    } else {
        release.tag_name
    };

    let targets = select_assets(&release.assets, project.file_filter())
        .into_iter()
        .map(|asset| DownloadTarget {
            file_name: asset.name.clone(),
            url: asset.browser_download_url.clone(),
            members: None,
        })
        .collect();

    Resolution::Download {
        version,
        origin: Origin::Release,
        targets,
    }
}

/// Decide what the newest artifact means for project.
///
/// Artifacts are always zip archives. The file filter applies to the members
/// inside of it, not to the artifact itself.
pub fn artifact_resolution(project: &ProjectDescriptor, artifact: RemoteArtifact) -> Resolution {
    debug!("latest artifact is {:?}", artifact.name);
    Resolution::Download {
        version: CI_VERSION.to_string(),
        origin: Origin::Artifact,
        targets: vec![DownloadTarget {
            file_name: format!("{}_latest_artifact.zip", project.name),
            url: artifact.archive_download_url,
            members: project.file_filter().map(<[String]>::to_vec),
        }],
    }
}

/// Select assets to download.
///
/// Keeps forge order. With a filter, only assets whose name is listed are
/// kept; filter entries naming no asset are ignored.
pub fn select_assets<'a>(
    assets: &'a [RemoteAsset],
    filter: Option<&[String]>,
) -> Vec<&'a RemoteAsset> {
    match filter {
        Some(filter) => assets
            .iter()
            .filter(|asset| filter.iter().any(|name| *name == asset.name))
            .collect(),
        None => {
            info!("no file filter given, selecting every asset");
            assets.iter().collect()
        }
    }
}
