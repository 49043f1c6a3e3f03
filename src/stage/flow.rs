//! Flow definition installation.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::edit::FlowEditor;

const INSTALLABLE_FLOW_NAME: &str = "flow.xml";

/// Write the flow definition that will be installed into `scratch_dir`.
///
/// Without an editor the source file is copied verbatim; otherwise it is
/// parsed, edited and serialized.
pub fn prepare_installable_flow(
    source: &Path,
    editor: Option<&FlowEditor>,
    scratch_dir: &Path,
) -> Result<PathBuf> {
    let target = scratch_dir.join(INSTALLABLE_FLOW_NAME);
    match editor {
        None => {
            fs::copy(source, &target).with_context(|| {
                format!(
                    "copying flow definition '{}' to '{}'",
                    source.display(),
                    target.display()
                )
            })?;
        }
        Some(editor) => {
            tracing::info!(steps = editor.len(), "editing flow definition");
            editor
                .edit_file(source, &target)
                .with_context(|| format!("editing flow definition '{}'", source.display()))?;
        }
    }
    Ok(target)
}

/// Gzip `flow_file` into `target`, the path the runtime reads at startup.
pub fn install_flow(flow_file: &Path, target: &Path) -> Result<()> {
    let mut input = BufReader::new(
        File::open(flow_file)
            .with_context(|| format!("opening flow file '{}'", flow_file.display()))?,
    );
    let output = File::create(target)
        .with_context(|| format!("creating installed flow '{}'", target.display()))?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)
        .with_context(|| format!("compressing flow into '{}'", target.display()))?;
    encoder
        .finish()
        .and_then(|mut writer| writer.flush())
        .with_context(|| format!("finishing installed flow '{}'", target.display()))?;
    Ok(())
}
