//! Filesystem helpers shared by the staging steps.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Delete a file, link or directory tree without following links.
pub(crate) fn remove_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("inspecting '{}'", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("removing directory '{}'", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("removing '{}'", path.display()))?;
    }
    Ok(())
}
