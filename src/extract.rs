// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive extraction.
//!
//! Downloaded archives are unpacked straight into the project's save path.
//! Extraction is selective: when a member filter is given, only members whose
//! stored name matches a filter entry exactly are written out. Members listed
//! in the filter but absent from the archive are skipped without complaint.
//!
//! A successfully extracted archive is deleted. An archive that could not be
//! read is left in place so the user can take a look at it.

use std::{
    fs::{remove_file, File},
    io,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, error, info, instrument, warn};
use sevenz_rust2::ArchiveEntry;
use zip::{result::ZipError, ZipArchive};

/// Supported archive container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    /// Determine archive format from file name extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "zip" => Some(Self::Zip),
            "7z" => Some(Self::SevenZip),
            _ => None,
        }
    }
}

/// Check if file name carries a supported archive extension.
pub fn is_archive(file_name: &str) -> bool {
    ArchiveFormat::from_path(file_name).is_some()
}

/// Extract archive, logging instead of failing.
///
/// Returns true if members were extracted and the archive was removed.
pub fn extract(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    members: Option<&[String]>,
) -> bool {
    let archive = archive.as_ref();
    match try_extract(archive, destination, members) {
        Ok(count) => {
            info!("extracted {count} member(s) and removed {:?}", archive.display());
            true
        }
        Err(err @ ExtractError::Remove { .. }) => {
            warn!("{err}");
            false
        }
        Err(err) => {
            error!("{err}, leaving {:?} in place", archive.display());
            false
        }
    }
}

/// Extract archive and delete it afterwards.
///
/// Dispatches on the archive's extension. Returns the number of members
/// written to the destination directory.
///
/// # Errors
///
/// - Return [`ExtractError::Unsupported`] if extension is not known.
/// - Return [`ExtractError::Open`] if archive cannot be opened.
/// - Return [`ExtractError::Zip`] or [`ExtractError::SevenZip`] if archive is
///   corrupt.
/// - Return [`ExtractError::UnsafeMember`] if a member would escape the
///   destination directory.
/// - Return [`ExtractError::Write`] if a member cannot be written.
/// - Return [`ExtractError::Remove`] if archive cannot be deleted after
///   extraction.
#[instrument(skip(archive, destination, members), level = "debug")]
pub fn try_extract(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    members: Option<&[String]>,
) -> Result<usize> {
    let archive = archive.as_ref();
    let destination = destination.as_ref();
    info!("extract {:?}", archive.display());

    let format = ArchiveFormat::from_path(archive).ok_or_else(|| ExtractError::Unsupported {
        path: archive.to_path_buf(),
    })?;
    let count = match format {
        ArchiveFormat::Zip => extract_zip(archive, destination, members)?,
        ArchiveFormat::SevenZip => extract_7z(archive, destination, members)?,
    };

    remove_file(archive).map_err(|source| ExtractError::Remove {
        source,
        path: archive.to_path_buf(),
    })?;

    Ok(count)
}

fn extract_zip(archive: &Path, destination: &Path, members: Option<&[String]>) -> Result<usize> {
    let file = File::open(archive).map_err(|source| ExtractError::Open {
        source,
        path: archive.to_path_buf(),
    })?;
    let mut zip = ZipArchive::new(file).map_err(|source| ExtractError::Zip {
        source,
        path: archive.to_path_buf(),
    })?;

    let mut count = 0;
    match members {
        Some(members) => {
            for member in members {
                let mut entry = match zip.by_name(member) {
                    Ok(entry) => entry,
                    Err(ZipError::FileNotFound) => {
                        debug!("member {member:?} not in archive, skipping");
                        continue;
                    }
                    Err(source) => {
                        return Err(ExtractError::Zip {
                            source,
                            path: archive.to_path_buf(),
                        })
                    }
                };
                write_member(&mut entry, destination)?;
                count += 1;
            }
        }
        None => {
            for index in 0..zip.len() {
                let mut entry = zip.by_index(index).map_err(|source| ExtractError::Zip {
                    source,
                    path: archive.to_path_buf(),
                })?;
                write_member(&mut entry, destination)?;
                count += 1;
            }
        }
    }

    Ok(count)
}

fn write_member<R: io::Read>(
    entry: &mut zip::read::ZipFile<'_, R>,
    destination: &Path,
) -> Result<()> {
    // INVARIANT: Never write outside of destination directory.
    let relative = entry
        .enclosed_name()
        .map(|path| path.to_path_buf())
        .ok_or_else(|| ExtractError::UnsafeMember {
            name: entry.name().to_string(),
        })?;
    let target = destination.join(relative);

    if entry.is_dir() {
        return create_dir(&target);
    }

    if let Some(parent) = target.parent() {
        create_dir(parent)?;
    }

    debug!("write {:?}", target.display());
    let mut output = File::create(&target).map_err(|source| ExtractError::Write {
        source,
        path: target.clone(),
    })?;
    io::copy(entry, &mut output).map_err(|source| ExtractError::Write {
        source,
        path: target.clone(),
    })?;

    Ok(())
}

fn extract_7z(archive: &Path, destination: &Path, members: Option<&[String]>) -> Result<usize> {
    let file = File::open(archive).map_err(|source| ExtractError::Open {
        source,
        path: archive.to_path_buf(),
    })?;

    create_dir(destination)?;

    let mut count = 0;
    let mut unsafe_member = None;
    let mut drain_error = None;
    let extract_fn = |entry: &ArchiveEntry, reader: &mut dyn io::Read, target: &PathBuf| {
        let wanted = match members {
            Some(members) => members.iter().any(|member| member == entry.name()),
            None => true,
        };

        // INVARIANT: Never write outside of destination directory.
        if wanted && !is_enclosed(entry.name()) {
            unsafe_member = Some(entry.name().to_string());
            return Ok(false);
        }

        if !wanted {
            // INVARIANT: Consume skipped members, solid blocks share one stream.
            if let Err(err) = io::copy(reader, &mut io::sink()) {
                drain_error = Some(err);
                return Ok(false);
            }
            return Ok(true);
        }

        count += 1;
        sevenz_rust2::default_entry_extract_fn(entry, reader, target)
    };
    let result = sevenz_rust2::decompress_with_extract_fn(file, destination, extract_fn);

    if let Some(name) = unsafe_member {
        return Err(ExtractError::UnsafeMember { name });
    }

    let message = match (result, drain_error) {
        (Err(err), _) => err.to_string(),
        (Ok(_), Some(err)) => err.to_string(),
        (Ok(_), None) => return Ok(count),
    };

    Err(ExtractError::SevenZip {
        message,
        path: archive.to_path_buf(),
    })
}

fn is_enclosed(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn create_dir(path: &Path) -> Result<()> {
    mkdirp::mkdirp(path).map_err(|source| ExtractError::Write {
        source,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Archive extraction error types.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// File extension names no supported archive format.
    #[error("unsupported archive format {:?}", path.display())]
    Unsupported { path: PathBuf },

    /// Archive cannot be opened.
    #[error("failed to open archive {:?}", path.display())]
    Open {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Zip archive is corrupt or unreadable.
    #[error("failed to read zip archive {:?}", path.display())]
    Zip {
        #[source]
        source: ZipError,
        path: PathBuf,
    },

    /// 7-zip archive is corrupt or unreadable.
    #[error("failed to read 7z archive {:?}: {message}", path.display())]
    SevenZip { message: String, path: PathBuf },

    /// Member path points outside of destination directory.
    #[error("refusing to extract member {name:?} outside of destination")]
    UnsafeMember { name: String },

    /// Extracted member cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Archive cannot be deleted after extraction.
    #[error("extracted but failed to remove archive {:?}", path.display())]
    Remove {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sevenz_rust2::ArchiveWriter;
    use std::{fs, io::Write};
    use zip::{write::SimpleFileOptions, ZipWriter};

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    /// Write solid 7z archive, all members compressed in one block.
    fn write_7z(path: &Path, members: &[(&str, &str)]) -> anyhow::Result<()> {
        let source = tempfile::tempdir()?;
        for (name, contents) in members {
            fs::write(source.path().join(name), contents)?;
        }

        let mut writer = ArchiveWriter::create(path)?;
        writer.push_source_path(source.path(), |_| true)?;
        writer.finish()?;

        Ok(())
    }

    #[test]
    fn detect_archive_format() {
        assert_eq!(ArchiveFormat::from_path("tool-linux.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_path("TOOL.ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_path("tool.7z"), Some(ArchiveFormat::SevenZip));
        assert_eq!(ArchiveFormat::from_path("tool.tar.gz"), None);
        assert!(!is_archive("tool.exe"));
    }

    #[test]
    fn extract_all_members() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &[("a.txt", "alpha"), ("nested/b.txt", "beta")]);

        let count = try_extract(&archive, dir.path(), None)?;

        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "alpha");
        assert_eq!(fs::read_to_string(dir.path().join("nested/b.txt"))?, "beta");
        assert!(!archive.exists());

        Ok(())
    }

    #[test]
    fn extract_only_filtered_members() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &[("a.txt", "alpha"), ("b.txt", "beta")]);

        let filter = vec!["b.txt".to_string(), "missing.txt".to_string()];
        let count = try_extract(&archive, dir.path(), Some(&filter))?;

        assert_eq!(count, 1);
        assert!(!dir.path().join("a.txt").exists());
        assert!(!dir.path().join("missing.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("b.txt"))?, "beta");
        assert!(!archive.exists());

        Ok(())
    }

    #[test]
    fn corrupt_zip_is_left_in_place() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip")?;

        let result = try_extract(&archive, dir.path(), None);
        assert!(matches!(result, Err(ExtractError::Zip { .. })));
        assert!(archive.exists());
        assert!(!extract(&archive, dir.path(), None));
        assert!(archive.exists());

        Ok(())
    }

    #[test]
    fn corrupt_7z_is_left_in_place() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("broken.7z");
        fs::write(&archive, b"definitely not a 7z archive")?;

        let result = try_extract(&archive, dir.path(), None);
        assert!(matches!(result, Err(ExtractError::SevenZip { .. })));
        assert!(archive.exists());

        Ok(())
    }

    #[test]
    fn extract_all_7z_members() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("bundle.7z");
        write_7z(&archive, &[("a.txt", "alpha"), ("b.txt", "beta")])?;

        let destination = dir.path().join("out");
        let count = try_extract(&archive, &destination, None)?;

        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(destination.join("a.txt"))?, "alpha");
        assert_eq!(fs::read_to_string(destination.join("b.txt"))?, "beta");
        assert!(!archive.exists());

        Ok(())
    }

    #[test]
    fn extract_any_filtered_member_of_solid_7z() -> anyhow::Result<()> {
        let members = [("a.txt", "alpha"), ("b.txt", "beta")];
        for &(wanted, contents) in &members {
            let dir = tempfile::tempdir()?;
            let archive = dir.path().join("bundle.7z");
            write_7z(&archive, &members)?;

            let destination = dir.path().join("out");
            let filter = vec![wanted.to_string(), "missing.txt".to_string()];
            let count = try_extract(&archive, &destination, Some(&filter))?;

            assert_eq!(count, 1);
            assert_eq!(fs::read_to_string(destination.join(wanted))?, contents);
            assert_eq!(fs::read_dir(&destination)?.count(), 1);
            assert!(!archive.exists());
        }

        Ok(())
    }

    #[test]
    fn refuse_7z_member_outside_destination() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("evil.7z");
        let mut writer = ArchiveWriter::create(&archive)?;
        let entry = ArchiveEntry::new_file("../escaped.txt");
        writer.push_archive_entry(entry, Some("gotcha".as_bytes()))?;
        writer.finish()?;

        let destination = dir.path().join("out");
        let result = try_extract(&archive, &destination, None);

        assert!(matches!(result, Err(ExtractError::UnsafeMember { .. })));
        assert!(!dir.path().join("escaped.txt").exists());
        assert!(archive.exists());

        Ok(())
    }

    #[test]
    fn unsupported_format_is_left_in_place() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("bundle.rar");
        fs::write(&archive, b"rar!")?;

        let result = try_extract(&archive, dir.path(), None);
        assert!(matches!(result, Err(ExtractError::Unsupported { .. })));
        assert!(archive.exists());

        Ok(())
    }
}
