//! Cleanup of the placeholder root after an instance stops.

use anyhow::{Context, Result};
use std::fs;

use super::io::remove_entry;
use crate::layout::{HomeLayout, README_FILE_NAME};

/// Delete everything directly under the placeholder root except the
/// sentinel marker file. Returns the number of top-level entries removed.
///
/// Links are removed without touching their targets; directories are
/// removed recursively.
pub fn sweep_placeholder(layout: &HomeLayout) -> Result<usize> {
    let root = layout.root();
    let mut removed = 0;

    for entry in
        fs::read_dir(root).with_context(|| format!("reading directory '{}'", root.display()))?
    {
        let entry = entry.with_context(|| format!("iterating directory '{}'", root.display()))?;
        if entry.file_name() == README_FILE_NAME {
            continue;
        }
        remove_entry(&entry.path())?;
        removed += 1;
    }

    tracing::debug!(root = %root.display(), removed, "swept placeholder root");
    Ok(removed)
}
