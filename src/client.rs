// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! HTTP client construction.
//!
//! Both the forge API client and the file fetcher talk through the same
//! [`reqwest::Client`], so they share one transport policy: a relsync user
//! agent, an optional access token, and lenient certificate handling.

use reqwest::{
    header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION, USER_AGENT},
    Client,
};
use std::{env, time::Duration};
use tracing::debug;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Settings to build the shared HTTP client with.
#[derive(Clone, Debug, Default)]
pub struct ClientSettings {
    /// Opaque access token sent as `Authorization: token <TOKEN>`.
    pub token: Option<String>,

    /// Connect timeout. Transport default when absent.
    pub connect_timeout: Option<Duration>,
}

impl ClientSettings {
    /// Build HTTP client.
    ///
    /// Certificate verification is turned off, since relsync is commonly
    /// pointed at self-hosted forges and proxies with private certificates.
    ///
    /// # Errors
    ///
    /// - Return [`ClientError::InvalidToken`] if token cannot be placed in a
    ///   header.
    /// - Return [`ClientError::Build`] if TLS backend fails to initialize.
    pub fn build(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("relsync/", env!("CARGO_PKG_VERSION"))),
        );

        if let Some(token) = &self.token {
            debug!("adding access token to forge requests");
            let mut value = HeaderValue::from_str(&format!("token {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(true);
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(builder.build()?)
    }
}

/// Pick access token to use.
///
/// Explicit token wins over the one stored in the project list, which wins
/// over [`TOKEN_ENV_VAR`]. Blank tokens count as absent.
pub fn resolve_token(explicit: Option<String>, stored: Option<String>) -> Option<String> {
    explicit
        .into_iter()
        .chain(stored)
        .chain(env::var(TOKEN_ENV_VAR).ok())
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}

/// HTTP client construction error types.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Token contains characters that are not allowed in a header.
    #[error("access token is not a valid header value")]
    InvalidToken(#[from] InvalidHeaderValue),

    /// Client could not be built.
    #[error(transparent)]
    Build(#[from] reqwest::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
