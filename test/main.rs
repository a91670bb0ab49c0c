// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use mockito::{Mock, ServerGuard};
use relsync::{
    config::{ProjectDescriptor, ProjectList},
    store::ProjectStore,
    sync::SyncConfig,
};
use serde_json::json;
use std::{
    io::{Cursor, Write},
    path::Path,
};
use zip::{write::SimpleFileOptions, ZipWriter};

/// Fake forge serving release metadata, artifact listings, and downloads.
///
/// Every method hands back a mock that still needs to be created, so tests
/// can attach hit expectations first.
pub(crate) struct ForgeFixture {
    server: ServerGuard,
}

impl ForgeFixture {
    pub(crate) async fn new() -> Self {
        Self {
            server: mockito::Server::new_async().await,
        }
    }

    pub(crate) fn config(&self) -> SyncConfig {
        SyncConfig {
            api_url: self.server.url(),
            ..Default::default()
        }
    }

    pub(crate) fn download_url(&self, path: &str) -> String {
        format!("{}/download/{path}", self.server.url())
    }

    /// Serve latest release of repository with asset download links.
    pub(crate) fn release(&mut self, repo: &str, tag: &str, assets: &[&str]) -> Mock {
        let assets = assets
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "browser_download_url": self.download_url(&format!("{tag}/{name}")),
                })
            })
            .collect::<Vec<_>>();
        let body = json!({
            "tag_name": tag,
            "html_url": format!("https://github.com/{repo}/releases/tag/{tag}"),
            "assets": assets,
        });

        self.server
            .mock("GET", format!("/repos/{repo}/releases/latest").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// Answer release lookup of repository with bare status code.
    pub(crate) fn release_status(&mut self, repo: &str, status: usize) -> Mock {
        self.server
            .mock("GET", format!("/repos/{repo}/releases/latest").as_str())
            .with_status(status)
            .with_body(r#"{"message": "nope"}"#)
    }

    /// Serve artifact listing of repository, newest first.
    pub(crate) fn artifacts(&mut self, repo: &str, names: &[&str]) -> Mock {
        let artifacts = names
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "archive_download_url": self.download_url(&format!("artifacts/{name}/zip")),
                })
            })
            .collect::<Vec<_>>();
        let body = json!({ "total_count": artifacts.len(), "artifacts": artifacts });

        self.server
            .mock("GET", format!("/repos/{repo}/actions/artifacts").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// Answer download path with bare status code.
    pub(crate) fn file_status(&mut self, path: &str, status: usize) -> Mock {
        self.server
            .mock("GET", format!("/download/{path}").as_str())
            .with_status(status)
    }

    /// Serve file contents under download path.
    pub(crate) fn file(&mut self, path: &str, contents: impl AsRef<[u8]>) -> Mock {
        self.server
            .mock("GET", format!("/download/{path}").as_str())
            .with_status(200)
            .with_body(contents)
    }
}

/// Build zip archive in memory.
pub(crate) fn zip_bytes(members: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in members {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(contents.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Write project store holding projects.
pub(crate) fn store_with(
    path: impl AsRef<Path>,
    projects: Vec<ProjectDescriptor>,
) -> Result<ProjectStore> {
    let store = ProjectStore::open(path.as_ref());
    store.save(&ProjectList {
        token: None,
        projects,
    })?;

    Ok(store)
}
