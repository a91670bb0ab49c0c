// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keep local copies of forge projects up to date.
//!
//! Relsync reads a list of __projects__, each naming a forge repository, the
//! version currently installed, and a directory to install into. For every
//! project it asks the forge for the latest tagged release, or for the newest
//! CI build artifact when the project tracks the special "CI" version. New
//! files get downloaded into the project's directory, archives among them get
//! unpacked, and the new version is written back to the project list.
//!
//! # Layout
//!
//! - [`config`]: project list data model.
//! - [`store`]: reading and writing the project list file.
//! - [`client`]: shared HTTP client setup.
//! - [`forge`]: forge API access.
//! - [`resolve`]: decide what to download.
//! - [`fetch`]: download files, moving locked ones aside.
//! - [`extract`]: unpack zip and 7z archives.
//! - [`sync`]: per-project state machine and batch run.
//! - [`path`]: default file locations.

pub mod client;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod forge;
pub mod path;
pub mod resolve;
pub mod store;
pub mod sync;

pub use config::{ProjectDescriptor, ProjectList, CI_VERSION};
pub use store::ProjectStore;
pub use sync::{PersistMode, RunSummary, SyncConfig, SyncOutcome, Synchronizer};
