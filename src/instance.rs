//! Disposable NiFi test instance.
//!
//! A [`TestInstance`] owns the placeholder root for exactly one
//! install -> start -> stop cycle. Operations must be called in that order;
//! an out-of-order call fails without doing any work and leaves the state
//! unchanged. Any failure while doing the work moves the instance into the
//! matching failed state and is returned with its cause attached.
//!
//! Only one instance may use a placeholder root at a time. Concurrent
//! instances on the same directory race on link creation and deletion.
//!
//! # Example
//!
//! ```rust,ignore
//! use nifi_testbed::{CommandLauncher, TestInstance};
//!
//! let mut nifi = TestInstance::builder()
//!     .archive("../nifi-1.6.0-bin.zip")?
//!     .flow_definition("tests/resources/flow.xml")?
//!     .launcher(CommandLauncher::new("bin/nifi.sh").args(["run"]))?
//!     .build()?;
//!
//! nifi.install()?;
//! nifi.start()?;
//! // ... exercise the flow ...
//! nifi.stop_and_cleanup()?;
//! ```

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::edit::FlowEditor;
use crate::error::{ConfigError, InstanceError};
use crate::layout::HomeLayout;
use crate::runtime::{Readiness, RunningRuntime, RuntimeEnvironment, RuntimeLauncher};
use crate::stage;
use crate::state::State;

/// One disposable provisioning of the runtime for a single test.
pub struct TestInstance {
    archive: PathBuf,
    flow_definition: PathBuf,
    editor: Option<FlowEditor>,
    layout: HomeLayout,
    launcher: Box<dyn RuntimeLauncher>,
    readiness: Readiness,
    runtime: Option<Box<dyn RunningRuntime>>,
    state: State,
}

impl TestInstance {
    pub fn builder() -> TestInstanceBuilder {
        TestInstanceBuilder::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn layout(&self) -> &HomeLayout {
        &self.layout
    }

    /// Stage the runtime and the (edited) flow definition in the
    /// placeholder root.
    pub fn install(&mut self) -> Result<(), InstanceError> {
        self.state.check_transition(State::Installed)?;

        match self.stage_installation() {
            Ok(()) => {
                self.state = State::Installed;
                tracing::info!(home = %self.layout.root().display(), "installation complete");
                Ok(())
            }
            Err(e) => {
                self.state = State::InstallationFailed;
                Err(InstanceError::Install(e))
            }
        }
    }

    fn stage_installation(&self) -> Result<()> {
        self.layout.ensure_readme()?;

        let stale = stage::remove_stale_installations(&self.layout)?;
        if stale > 0 {
            tracing::info!(count = stale, "removed stale installations");
        }

        // Dropped on every exit path, taking the edited flow file with it.
        let scratch = tempfile::Builder::new()
            .prefix("installable-flow")
            .tempdir()
            .context("creating scratch directory for the flow definition")?;
        let installable = stage::prepare_installable_flow(
            &self.flow_definition,
            self.editor.as_ref(),
            scratch.path(),
        )?;

        tracing::info!(archive = %self.archive.display(), "uncompressing NiFi archive");
        let entries = stage::extract_archive(&self.archive, &self.layout, |entry| {
            tracing::debug!(entry = %entry.display(), "uncompressed");
        })?;
        tracing::info!(entries, "uncompressing done");

        let runtime_root = stage::locate_runtime_root(&self.layout)?;
        let links = stage::link_runtime_entries(&runtime_root, &self.layout)?;
        tracing::info!(
            runtime_root = %runtime_root.display(),
            links = links.len(),
            "linked runtime into placeholder root"
        );

        stage::install_flow(&installable, &self.layout.installed_flow())?;
        Ok(())
    }

    /// Launch the runtime and wait until it counts as ready.
    pub fn start(&mut self) -> Result<(), InstanceError> {
        self.state.check_transition(State::Started)?;

        match self.launch() {
            Ok(()) => {
                self.state = State::Started;
                tracing::info!("runtime started");
                Ok(())
            }
            Err(e) => {
                self.state = State::StartFailed;
                Err(InstanceError::Start(e))
            }
        }
    }

    fn launch(&mut self) -> Result<()> {
        let bootstrap = self.layout.bootstrap_lib_dir();
        if !bootstrap.is_dir() {
            bail!("not found: {}", bootstrap.display());
        }

        let env = RuntimeEnvironment::for_layout(&self.layout);
        let runtime = self
            .launcher
            .launch(self.layout.root(), &env)
            .context("launching runtime")?;

        // Kept even if readiness fails so stop_and_cleanup can shut it down.
        let runtime = self.runtime.insert(runtime);
        self.readiness.wait(runtime.as_mut())
    }

    /// Shut the runtime down and sweep the placeholder root.
    ///
    /// Permitted after a successful start and after a failed one. A failure
    /// here always ends in `StopFailed`, whichever state it started from.
    pub fn stop_and_cleanup(&mut self) -> Result<(), InstanceError> {
        self.state.check_transition(State::Stopped)?;

        match self.shutdown_and_sweep() {
            Ok(()) => {
                self.state = State::Stopped;
                tracing::info!("runtime stopped and placeholder root cleaned");
                Ok(())
            }
            Err(e) => {
                self.state = State::StopFailed;
                Err(InstanceError::Stop(e))
            }
        }
    }

    fn shutdown_and_sweep(&mut self) -> Result<()> {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown().context("shutting down runtime")?;
        }
        let removed = stage::sweep_placeholder(&self.layout)?;
        tracing::debug!(removed, "placeholder root swept");
        Ok(())
    }
}

impl fmt::Display for TestInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NiFi test instance (state: {}, home: {})",
            self.state,
            self.layout.root().display()
        )
    }
}

impl fmt::Debug for TestInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestInstance")
            .field("archive", &self.archive)
            .field("flow_definition", &self.flow_definition)
            .field("editor", &self.editor)
            .field("layout", &self.layout)
            .field("readiness", &self.readiness)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for TestInstance {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            tracing::warn!(instance = %self, "test instance dropped with its runtime still running");
        }
    }
}

/// Single-use builder for [`TestInstance`].
#[derive(Default)]
pub struct TestInstanceBuilder {
    consumed: bool,
    archive: Option<PathBuf>,
    flow_definition: Option<PathBuf>,
    editor: Option<FlowEditor>,
    working_dir: Option<PathBuf>,
    launcher: Option<Box<dyn RuntimeLauncher>>,
    readiness: Readiness,
}

impl TestInstanceBuilder {
    fn ensure_unused(&self) -> Result<(), ConfigError> {
        if self.consumed {
            return Err(ConfigError::BuilderConsumed);
        }
        Ok(())
    }

    /// The packaged NiFi binary distribution. Must exist.
    pub fn archive(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.archive = Some(existing(path.as_ref(), "NiFi archive")?);
        Ok(self)
    }

    /// The flow definition to install. Must exist.
    pub fn flow_definition(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.flow_definition = Some(existing(path.as_ref(), "flow definition")?);
        Ok(self)
    }

    /// Edits applied to the flow definition before it is installed.
    pub fn edit_flow(&mut self, editor: FlowEditor) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.editor = Some(editor);
        Ok(self)
    }

    /// Placeholder root. Defaults to the process working directory.
    pub fn working_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.working_dir = Some(dir.as_ref().to_path_buf());
        Ok(self)
    }

    pub fn launcher(
        &mut self,
        launcher: impl RuntimeLauncher + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.launcher = Some(Box::new(launcher));
        Ok(self)
    }

    pub fn readiness(&mut self, readiness: Readiness) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.readiness = readiness;
        Ok(self)
    }

    /// Produce the instance. The builder rejects every call afterwards.
    pub fn build(&mut self) -> Result<TestInstance, ConfigError> {
        self.ensure_unused()?;
        self.consumed = true;

        let archive = self.archive.take().ok_or(ConfigError::Missing("NiFi archive"))?;
        let flow_definition = self
            .flow_definition
            .take()
            .ok_or(ConfigError::Missing("flow definition"))?;
        let launcher = self
            .launcher
            .take()
            .ok_or(ConfigError::Missing("runtime launcher"))?;
        let layout = match self.working_dir.take() {
            Some(dir) => HomeLayout::new(&dir)?,
            None => HomeLayout::from_current_dir()?,
        };

        Ok(TestInstance {
            archive,
            flow_definition,
            editor: self.editor.take(),
            layout,
            launcher,
            readiness: self.readiness,
            runtime: None,
            state: State::Created,
        })
    }
}

fn existing(path: &Path, what: &'static str) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            what,
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}
