//! Projection of the extracted runtime into the placeholder root.
//!
//! Each top-level entry of the `nifi-*` directory gets a symlink of the
//! same name directly under the placeholder root, so `conf/`, `lib/` and
//! friends resolve independently of the archive's version number.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::io::remove_entry;
use crate::layout::{is_os_metadata, HomeLayout};

/// Link every entry of `runtime_root` into the placeholder root.
///
/// Pre-existing entries at a link's path are replaced. Returns the links
/// created, sorted by name.
pub fn link_runtime_entries(runtime_root: &Path, layout: &HomeLayout) -> Result<Vec<PathBuf>> {
    let mut links = Vec::new();

    for entry in fs::read_dir(runtime_root)
        .with_context(|| format!("reading runtime directory '{}'", runtime_root.display()))?
    {
        let entry = entry.with_context(|| {
            format!("iterating runtime directory '{}'", runtime_root.display())
        })?;
        let name = entry.file_name();
        if name.to_str().is_some_and(is_os_metadata) {
            continue;
        }

        let existing = entry.path();
        let link = layout.root().join(&name);
        if link.exists() || link.is_symlink() {
            remove_entry(&link)?;
        }

        std::os::unix::fs::symlink(&existing, &link).with_context(|| {
            format!(
                "linking '{}' -> '{}'",
                link.display(),
                existing.display()
            )
        })?;
        tracing::debug!(link = %link.display(), target = %existing.display(), "linked");
        links.push(link);
    }

    links.sort();
    Ok(links)
}
