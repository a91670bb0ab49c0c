// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use relsync::{
    client::resolve_token,
    forge::GITHUB_API_URL,
    path::{default_log_file, resolve_project_file},
    store::ProjectStore,
    sync::{PersistMode, SyncConfig, Synchronizer},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    process::exit,
    sync::Mutex,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "relsync [options] [<command>]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Project list to synchronize.
    #[arg(short, long, global = true, value_name = "file")]
    pub config: Option<PathBuf>,

    /// Append log output to this file.
    #[arg(long, global = true, value_name = "file")]
    pub log_file: Option<PathBuf>,

    /// Access token for the forge API.
    #[arg(short, long, global = true, value_name = "token")]
    pub token: Option<String>,

    /// Root of the forge API.
    #[arg(long, global = true, value_name = "url", default_value = GITHUB_API_URL)]
    pub api_url: String,

    /// Save each new version as soon as its project is done.
    #[arg(long, global = true)]
    pub persist_each: bool,

    /// Skip projects whose main file already exists in their save path.
    #[arg(long, global = true)]
    pub skip_existing: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let store = ProjectStore::open(resolve_project_file(self.config.clone())?);
        match self.command.clone().unwrap_or(Command::Sync) {
            Command::Sync => self.run_sync(store).await,
            Command::List => run_list(store),
        }
    }

    async fn run_sync(self, store: ProjectStore) -> Result<()> {
        let list = store
            .load()
            .with_context(|| format!("cannot load projects from {:?}", store.path().display()))?;

        let config = SyncConfig {
            api_url: self.api_url,
            token: resolve_token(self.token, list.token.clone()),
            persist: if self.persist_each {
                PersistMode::PerProject
            } else {
                PersistMode::EndOfRun
            },
            skip_existing: self.skip_existing,
            connect_timeout: None,
        };

        let synchronizer = Synchronizer::new(config)?;
        let summary = synchronizer.run(&store, list).await?;
        if summary.failed > 0 {
            warn!("{} project(s) failed, see log for details", summary.failed);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Bring every project up to date (default).
    #[command(override_usage = "relsync sync [options]")]
    Sync,

    /// Show configured projects and their versions.
    #[command(override_usage = "relsync list [options]")]
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let console = fmt::layer().compact().with_target(false);
    let log_file = match cli.log_file.clone() {
        Some(path) => Some(path),
        None => default_log_file().ok(),
    };
    let file_layer = log_file
        .as_deref()
        .and_then(|path| open_log_file(path).ok())
        .map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
        });
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            mkdirp::mkdirp(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

fn run_list(store: ProjectStore) -> Result<()> {
    let list = store
        .load()
        .with_context(|| format!("cannot load projects from {:?}", store.path().display()))?;

    info!("{} project(s) in {:?}", list.projects.len(), store.path().display());
    for project in &list.projects {
        info!(
            "{project} @ {} -> {:?}",
            project.version,
            project.save_path.display()
        );
    }

    Ok(())
}
