// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Forge API access.
//!
//! A __forge__ is the remote code-hosting service that publishes releases and
//! CI artifacts for a repository. Relsync only needs two things from it:
//!
//! 1. The latest tagged release, via `GET /repos/{owner}/{repo}/releases/latest`.
//! 2. The CI artifact listing, via `GET /repos/{owner}/{repo}/actions/artifacts`.
//!
//! Both are reached through the [`Forge`] trait so that the synchronizer can
//! be driven by something other than GitHub.
//!
//! # Status Classification
//!
//! The forge is unreliable, rate limited, and sometimes wants credentials.
//! Any non-success response is therefore not treated as a crash, but as a
//! [`ForgeError::Status`] carrying a [`StatusClass`] that explains what went
//! wrong in human terms.

use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    future::Future,
};
use tracing::{debug, instrument};

/// Default forge API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Latest tagged release of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRelease {
    /// Version identifier of the release.
    pub tag_name: String,

    /// Human facing release page.
    #[serde(default)]
    pub html_url: String,

    /// Downloadable assets in forge order.
    #[serde(default)]
    pub assets: Vec<RemoteAsset>,
}

/// Downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// CI produced build output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteArtifact {
    pub name: String,
    pub archive_download_url: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    #[serde(default)]
    artifacts: Vec<RemoteArtifact>,
}

/// Layer of indirection for forge access.
pub trait Forge {
    /// Fetch latest tagged release of repository.
    fn latest_release(
        &self,
        owner: &str,
        repo: &str,
    ) -> impl Future<Output = Result<RemoteRelease>> + Send;

    /// Fetch CI artifacts of repository, newest first.
    fn artifacts(
        &self,
        owner: &str,
        repo: &str,
    ) -> impl Future<Output = Result<Vec<RemoteArtifact>>> + Send;
}

/// Forge access through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubForge {
    client: Client,
    api_url: String,
}

impl GithubForge {
    /// Construct new GitHub forge client.
    ///
    /// The `api_url` is the API root, e.g., [`GITHUB_API_URL`], or the
    /// `/api/v3` endpoint of a GitHub Enterprise instance.
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("application/vnd.github+json"))
            .send()
            .await
            .map_err(|source| ForgeError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForgeError::Status {
                class: StatusClass::from(status),
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ForgeError::Decode { url, source })
    }
}

impl Forge for GithubForge {
    #[instrument(skip(self), level = "debug")]
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<RemoteRelease> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.api_url);
        self.get_json(url).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn artifacts(&self, owner: &str, repo: &str) -> Result<Vec<RemoteArtifact>> {
        let url = format!("{}/repos/{owner}/{repo}/actions/artifacts", self.api_url);
        let listing: ArtifactListing = self.get_json(url).await?;
        Ok(listing.artifacts)
    }
}

/// Human meaningful category of a failed forge response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 401: token missing or invalid.
    Unauthorized,

    /// 403 or 429: API rate limit hit, or access forbidden.
    RateLimited,

    /// 404: repository, release, or artifact does not exist.
    NotFound,

    /// 500: forge failed internally.
    ServerError,

    /// 502: forge gateway failed.
    BadGateway,

    /// 503: forge temporarily unavailable.
    Unavailable,

    /// Any other non-success status.
    Unknown,
}

impl From<StatusCode> for StatusClass {
    fn from(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            403 | 429 => Self::RateLimited,
            404 => Self::NotFound,
            500 => Self::ServerError,
            502 => Self::BadGateway,
            503 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }
}

impl Display for StatusClass {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Unauthorized => "unauthorized, check the access token",
            Self::RateLimited => "rate limited or forbidden, try again later or set an access token",
            Self::NotFound => "not found, check owner and repository name",
            Self::ServerError => "forge internal server error",
            Self::BadGateway => "bad gateway between forge services",
            Self::Unavailable => "forge service unavailable",
            Self::Unknown => "unexpected response",
        })
    }
}

/// Forge access error types.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Connection, timeout, or other transport failure.
    #[error("failed to reach {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Forge answered with a non-success status.
    #[error("{class} (HTTP {status} from {url})")]
    Status {
        class: StatusClass,
        status: u16,
        url: String,
    },

    /// Response body is not what the forge API promises.
    #[error("malformed response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ForgeError {
    /// Status class of a non-success response, if that is what failed.
    pub fn status_class(&self) -> Option<StatusClass> {
        match self {
            Self::Status { class, .. } => Some(*class),
            _ => None,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ForgeError> = std::result::Result<T, E>;
