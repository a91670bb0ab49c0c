// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the project list that relsync keeps in sync with a
//! forge. The project list is a plain document holding every project
//! descriptor plus an optional access token. File I/O is left to the
//! [`store`](crate::store) module.
//!
//! # General Layout
//!
//! ```json
//! {
//!     "projects": [
//!         {
//!             "owner": "acme",
//!             "name": "tool",
//!             "version": "v1.0",
//!             "save_path": "~/tools/acme",
//!             "files": ["tool-linux.zip"]
//!         }
//!     ],
//!     "token": "ghp_..."
//! }
//! ```
//!
//! A version of `"CI"` is special. It tells relsync to always track the newest
//! CI artifact of the repository instead of its tagged releases.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Sentinel version marking a project that tracks CI artifacts.
pub const CI_VERSION: &str = "CI";

/// Project list layout.
///
/// The whole document read from and written back to the project store.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectList {
    /// Shared access token for the forge API.
    #[serde(default, alias = "github_token", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Projects to keep in sync, in processing order.
    #[serde(default)]
    pub projects: Vec<ProjectDescriptor>,
}

impl ProjectList {
    /// Parse project list from TOML data.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::TomlDeserialize`] if data is not a valid
    ///   project list.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Render project list as pretty TOML.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::TomlSerialize`] if project list cannot be
    ///   represented as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find project by owner and repository name.
    pub fn find_mut(&mut self, owner: &str, name: &str) -> Option<&mut ProjectDescriptor> {
        self.projects
            .iter_mut()
            .find(|project| project.owner == owner && project.name == name)
    }
}

impl FromStr for ProjectList {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(data)?)
    }
}

impl Display for ProjectList {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        // INVARIANT: Four space indentation, non-ASCII left as is.
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)
            .map_err(ConfigError::Json)?;

        fmt.write_str(String::from_utf8_lossy(&buffer).as_ref())
    }
}

/// Single project to keep in sync.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectDescriptor {
    /// Owner of the remote repository.
    #[serde(default)]
    pub owner: String,

    /// Name of the remote repository.
    #[serde(default)]
    pub name: String,

    /// Last synced release tag, or [`CI_VERSION`].
    #[serde(default)]
    pub version: String,

    /// Directory to place downloaded files into.
    #[serde(default)]
    pub save_path: PathBuf,

    /// Asset names to select. Empty means every asset.
    #[serde(default)]
    pub files: Vec<String>,
}

impl ProjectDescriptor {
    /// Construct new project descriptor without a file filter.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        save_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            version: version.into(),
            save_path: save_path.into(),
            files: Vec::new(),
        }
    }

    /// Check that owner and name are both present.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingField`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::MissingField("owner"));
        }

        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }

        Ok(())
    }

    /// Project follows CI artifacts instead of tagged releases.
    pub fn tracks_ci(&self) -> bool {
        self.version == CI_VERSION
    }

    /// Asset filter, or `None` when every asset is wanted.
    pub fn file_filter(&self) -> Option<&[String]> {
        if self.files.is_empty() {
            None
        } else {
            Some(self.files.as_slice())
        }
    }

    /// Shell expanded save path.
    ///
    /// The stored path is left untouched so that writing the project list
    /// back keeps whatever the user typed.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a referenced variable is
    ///   not set.
    pub fn target_dir(&self) -> Result<PathBuf> {
        let raw = self.save_path.to_string_lossy();
        let expanded = shellexpand::full(raw.as_ref())?;
        Ok(PathBuf::from(expanded.into_owned()))
    }
}

impl Display for ProjectDescriptor {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}", self.owner, self.name)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required descriptor field is empty or absent.
    #[error("project descriptor is missing required field {0:?}")]
    MissingField(&'static str),

    /// Failed to (de)serialize JSON project list.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Failed to deserialize TOML project list.
    #[error(transparent)]
    TomlDeserialize(#[from] toml::de::Error),

    /// Failed to serialize TOML project list.
    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on save path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn deserialize_project_list() -> anyhow::Result<()> {
        let result: ProjectList = r#"
            {
                "projects": [
                    {
                        "owner": "acme",
                        "name": "tool",
                        "version": "v1.0",
                        "save_path": "/opt/acme",
                        "files": ["tool-linux.zip", "tool.exe"]
                    },
                    {
                        "owner": "acme",
                        "name": "nightly",
                        "version": "CI",
                        "save_path": "/opt/nightly"
                    }
                ],
                "github_token": "secret"
            }
        "#
        .parse()?;

        let expect = ProjectList {
            projects: vec![
                ProjectDescriptor {
                    owner: "acme".into(),
                    name: "tool".into(),
                    version: "v1.0".into(),
                    save_path: "/opt/acme".into(),
                    files: vec!["tool-linux.zip".into(), "tool.exe".into()],
                },
                ProjectDescriptor::new("acme", "nightly", CI_VERSION, "/opt/nightly"),
            ],
            token: Some("secret".into()),
        };

        assert_eq!(result, expect);
        assert!(!result.projects[0].tracks_ci());
        assert!(result.projects[1].tracks_ci());

        Ok(())
    }

    #[test]
    fn serialize_project_list() {
        let result = ProjectList {
            projects: vec![ProjectDescriptor {
                owner: "acme".into(),
                name: "工具".into(),
                version: "v1.1".into(),
                save_path: "/opt/acme".into(),
                files: vec![],
            }],
            token: None,
        }
        .to_string();

        let expect = indoc! {r#"
            {
                "projects": [
                    {
                        "owner": "acme",
                        "name": "工具",
                        "version": "v1.1",
                        "save_path": "/opt/acme",
                        "files": []
                    }
                ]
            }"#};

        assert_eq!(result, expect);
    }

    #[test]
    fn deserialize_toml_project_list() -> anyhow::Result<()> {
        let result = ProjectList::from_toml_str(indoc! {r#"
            token = "secret"

            [[projects]]
            owner = "acme"
            name = "tool"
            version = "CI"
            save_path = "/opt/acme"
            files = ["bin/tool"]
        "#})?;

        let mut project = ProjectDescriptor::new("acme", "tool", CI_VERSION, "/opt/acme");
        project.files = vec!["bin/tool".into()];
        let expect = ProjectList {
            projects: vec![project],
            token: Some("secret".into()),
        };
        assert_eq!(result, expect);

        let again = ProjectList::from_toml_str(&result.to_toml_string()?)?;
        assert_eq!(again, expect);

        Ok(())
    }

    #[test]
    fn validate_required_fields() {
        let project = ProjectDescriptor::new("", "tool", "v1.0", "/tmp");
        assert!(matches!(
            project.validate(),
            Err(ConfigError::MissingField("owner"))
        ));

        let project = ProjectDescriptor::new("acme", "  ", "v1.0", "/tmp");
        assert!(matches!(
            project.validate(),
            Err(ConfigError::MissingField("name"))
        ));

        let project = ProjectDescriptor::new("acme", "tool", "v1.0", "/tmp");
        assert!(project.validate().is_ok());
    }

    #[test]
    fn empty_file_filter_selects_everything() {
        let mut project = ProjectDescriptor::new("acme", "tool", "v1.0", "/tmp");
        assert_eq!(project.file_filter(), None);

        project.files = vec!["tool.exe".into()];
        assert_eq!(project.file_filter(), Some(&["tool.exe".to_string()][..]));
    }

    #[sealed_test(env = [("RELSYNC_ROOT", "/srv/tools")])]
    fn expand_save_path() -> anyhow::Result<()> {
        let project = ProjectDescriptor::new("acme", "tool", "v1.0", "$RELSYNC_ROOT/acme");
        assert_eq!(project.target_dir()?, PathBuf::from("/srv/tools/acme"));
        assert_eq!(project.save_path, PathBuf::from("$RELSYNC_ROOT/acme"));

        Ok(())
    }
}
