//! Placeholder home directory layout.
//!
//! Every staged file and link lives under a single placeholder root whose
//! directory name is fixed. The runtime archive's own version-named
//! directory is never addressed directly by callers.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Required name of the placeholder root directory.
///
/// This is a safety rail for the destructive operations scoped to the
/// root (linking, stale-installation removal, sweeping), not a security
/// boundary.
pub const PLACEHOLDER_DIR_NAME: &str = "nifi_test_nifi_home";

/// Sentinel marker file that survives every cleanup sweep.
pub const README_FILE_NAME: &str = "NIFI_TEST_README.txt";

/// Prefix of the version-named root directory inside the runtime archive.
pub const RUNTIME_DIR_PREFIX: &str = "nifi-";

/// Operating-system metadata entries never projected into the root.
pub const OS_METADATA_ENTRIES: &[&str] = &[".DS_Store", "Thumbs.db"];

const README_CONTENTS: &str = "\
This directory is the working directory of disposable NiFi test instances.

Installing an instance extracts the NiFi distribution here and links its
contents into this directory. Stopping the instance removes everything
except this file.
";

/// Paths derived from a verified placeholder root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeLayout {
    root: PathBuf,
}

impl HomeLayout {
    /// Verify `dir` is a placeholder root and derive the layout from it.
    ///
    /// The directory must exist and its final component must be
    /// [`PLACEHOLDER_DIR_NAME`].
    pub fn new(dir: &Path) -> Result<Self, ConfigError> {
        let root = fs::canonicalize(dir).map_err(|_| ConfigError::NotFound {
            what: "working directory",
            path: dir.to_path_buf(),
        })?;

        let is_placeholder = root
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == PLACEHOLDER_DIR_NAME);
        if !is_placeholder || !root.is_dir() {
            return Err(ConfigError::WrongWorkingDirectory {
                expected: PLACEHOLDER_DIR_NAME,
                actual: root,
            });
        }

        Ok(Self { root })
    }

    /// Layout rooted at the process working directory.
    pub fn from_current_dir() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|_| ConfigError::NotFound {
            what: "working directory",
            path: PathBuf::from("."),
        })?;
        Self::new(&cwd)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("conf")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn bootstrap_lib_dir(&self) -> PathBuf {
        self.lib_dir().join("bootstrap")
    }

    pub fn properties_file(&self) -> PathBuf {
        self.config_dir().join("nifi.properties")
    }

    /// Where the runtime expects the compressed flow definition at startup.
    pub fn installed_flow(&self) -> PathBuf {
        self.config_dir().join("flow.xml.gz")
    }

    pub fn readme(&self) -> PathBuf {
        self.root.join(README_FILE_NAME)
    }

    /// Create the sentinel marker file if it is missing.
    pub fn ensure_readme(&self) -> Result<()> {
        let readme = self.readme();
        if !readme.exists() {
            fs::write(&readme, README_CONTENTS)
                .with_context(|| format!("writing sentinel file '{}'", readme.display()))?;
        }
        Ok(())
    }
}

/// True for entry names that are operating-system metadata.
pub fn is_os_metadata(name: &str) -> bool {
    OS_METADATA_ENTRIES.contains(&name)
}
