//! Runtime archive extraction.
//!
//! The distribution is unpacked straight into the placeholder root, which
//! then holds exactly one version-named `nifi-*` directory.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::io::remove_entry;
use crate::error::StagingError;
use crate::layout::{HomeLayout, RUNTIME_DIR_PREFIX};

/// Container formats accepted for the runtime distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    /// Identify the format from the file's leading magic bytes.
    pub fn detect(path: &Path) -> Result<Self> {
        let mut header = [0u8; 262];
        let mut file =
            File::open(path).with_context(|| format!("opening archive '{}'", path.display()))?;
        let len = read_up_to(&mut file, &mut header)
            .with_context(|| format!("reading archive header '{}'", path.display()))?;
        let header = &header[..len];

        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Ok(Self::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Ok(Self::TarGz)
        } else if header.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Ok(Self::TarZst)
        } else if header.len() >= 262 && &header[257..262] == b"ustar" {
            Ok(Self::Tar)
        } else {
            Err(StagingError::UnsupportedArchive {
                path: path.to_path_buf(),
            }
            .into())
        }
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Remove `nifi-*` entries left behind by an earlier install attempt.
pub fn remove_stale_installations(layout: &HomeLayout) -> Result<usize> {
    let stale = prefixed_entries(layout.root())?;
    for path in &stale {
        tracing::debug!(path = %path.display(), "removing stale installation");
        remove_entry(path)?;
    }
    Ok(stale.len())
}

/// Unpack `archive` into the placeholder root.
///
/// `on_entry` is called with the archive-relative path of every entry
/// after it has been written. Returns the number of entries extracted.
pub fn extract_archive(
    archive: &Path,
    layout: &HomeLayout,
    mut on_entry: impl FnMut(&Path),
) -> Result<usize> {
    let dest = layout.root();
    let format = ArchiveFormat::detect(archive)?;
    tracing::debug!(archive = %archive.display(), ?format, "extracting runtime archive");

    let file =
        File::open(archive).with_context(|| format!("opening archive '{}'", archive.display()))?;
    let reader = BufReader::new(file);

    let count = match format {
        ArchiveFormat::Zip => extract_zip(reader, dest, &mut on_entry),
        ArchiveFormat::Tar => extract_tar(reader, dest, &mut on_entry),
        ArchiveFormat::TarGz => {
            extract_tar(flate2::read::GzDecoder::new(reader), dest, &mut on_entry)
        }
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::with_buffer(reader)
                .context("initialising zstd decoder")?;
            extract_tar(decoder, dest, &mut on_entry)
        }
    }
    .with_context(|| {
        format!(
            "extracting '{}' into '{}'",
            archive.display(),
            dest.display()
        )
    })?;

    Ok(count)
}

fn extract_tar(reader: impl Read, dest: &Path, on_entry: &mut dyn FnMut(&Path)) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    let mut count = 0;
    for entry in archive.entries().context("reading tar entries")? {
        let mut entry = entry.context("reading tar entry")?;
        let path = entry.path().context("decoding tar entry path")?.into_owned();
        let unpacked = entry
            .unpack_in(dest)
            .with_context(|| format!("unpacking '{}'", path.display()))?;
        if !unpacked {
            return Err(StagingError::UnsafeEntry {
                entry: path.display().to_string(),
                dest: dest.to_path_buf(),
            }
            .into());
        }
        on_entry(&path);
        count += 1;
    }
    Ok(count)
}

fn extract_zip(
    reader: impl Read + io::Seek,
    dest: &Path,
    on_entry: &mut dyn FnMut(&Path),
) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(reader).context("reading zip central directory")?;

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .with_context(|| format!("reading zip entry #{index}"))?;
        let Some(relative) = file.enclosed_name() else {
            return Err(StagingError::UnsafeEntry {
                entry: file.name().to_string(),
                dest: dest.to_path_buf(),
            }
            .into());
        };
        let target = dest.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating directory '{}'", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory '{}'", parent.display()))?;
            }
            let mut out = File::create(&target)
                .with_context(|| format!("creating file '{}'", target.display()))?;
            io::copy(&mut file, &mut out)
                .with_context(|| format!("writing file '{}'", target.display()))?;
        }

        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                .with_context(|| format!("setting permissions on '{}'", target.display()))?;
        }

        on_entry(&relative);
    }

    Ok(archive.len())
}

/// Find the single extracted `nifi-*` directory inside the placeholder root.
pub fn locate_runtime_root(layout: &HomeLayout) -> Result<PathBuf> {
    let root = layout.root();
    let mut found = Vec::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("reading directory '{}'", root.display()))?
    {
        let entry = entry.with_context(|| format!("iterating directory '{}'", root.display()))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && has_runtime_prefix(&entry.file_name()) {
            found.push(entry.path());
        }
    }

    match found.len() {
        0 => Err(StagingError::NoRuntimeRoot {
            prefix: RUNTIME_DIR_PREFIX,
            root: root.to_path_buf(),
        }
        .into()),
        1 => Ok(found.remove(0)),
        _ => {
            let mut names: Vec<String> = found
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            names.sort();
            Err(StagingError::MultipleRuntimeRoots {
                prefix: RUNTIME_DIR_PREFIX,
                root: root.to_path_buf(),
                found: names,
            }
            .into())
        }
    }
}

fn has_runtime_prefix(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.starts_with(RUNTIME_DIR_PREFIX))
}

fn prefixed_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("reading directory '{}'", root.display()))?
    {
        let entry = entry.with_context(|| format!("iterating directory '{}'", root.display()))?;
        if has_runtime_prefix(&entry.file_name()) {
            entries.push(entry.path());
        }
    }
    Ok(entries)
}
