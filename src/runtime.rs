//! Boundary to the NiFi runtime itself.
//!
//! The lifecycle only needs "start a runtime given a home directory" and
//! "shut it down". [`RuntimeLauncher`] is that capability; tests substitute
//! a fake, [`CommandLauncher`] runs the distribution's launch program as a
//! child process.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::layout::HomeLayout;

/// Starts an isolated runtime rooted at a placeholder home directory.
pub trait RuntimeLauncher: Send {
    fn launch(&self, home: &Path, env: &RuntimeEnvironment) -> Result<Box<dyn RunningRuntime>>;
}

/// Handle to a launched runtime.
pub trait RunningRuntime: Send {
    /// Whether the runtime reports itself ready. Runtimes without a
    /// readiness signal report ready immediately.
    fn is_ready(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn shutdown(self: Box<Self>) -> Result<()>;
}

/// System configuration values the runtime requires before it starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    properties: BTreeMap<String, String>,
}

impl RuntimeEnvironment {
    /// The values an embedded NiFi needs for the given placeholder home.
    pub fn for_layout(layout: &HomeLayout) -> Self {
        let mut env = Self::default();
        env.set("org.apache.jasper.compiler.disablejsr199", "true")
            .set("java.security.egd", "file:/dev/urandom")
            .set("sun.net.http.allowRestrictedHeaders", "true")
            .set("java.net.preferIPv4Stack", "true")
            .set("java.awt.headless", "true")
            .set("java.protocol.handler.pkgs", "sun.net.www.protocol")
            .set(
                "nifi.properties.file.path",
                layout.properties_file().display().to_string(),
            )
            .set("app", "NiFi")
            .set("org.apache.nifi.bootstrap.config.log.dir", "./logs");
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values rendered as `-Dkey=value` JVM options.
    pub fn to_jvm_options(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("-D{k}={v}")).collect()
    }

    /// Values rendered as one space-separated options string, the form
    /// `JAVA_TOOL_OPTIONS` takes. Values containing whitespace are
    /// double-quoted; such values may not contain a double quote.
    pub fn to_options_string(&self) -> Result<String> {
        let mut options = Vec::with_capacity(self.properties.len());
        for (key, value) in self.iter() {
            if key.is_empty() || key.contains(char::is_whitespace) || key.contains('"') {
                bail!("invalid runtime property name '{key}'");
            }
            if value.contains(char::is_whitespace) {
                if value.contains('"') {
                    bail!("runtime property '{key}' mixes whitespace and quotes: {value}");
                }
                options.push(format!("-D{key}=\"{value}\""));
            } else {
                options.push(format!("-D{key}={value}"));
            }
        }
        Ok(options.join(" "))
    }
}

/// How `start` decides the runtime is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for a fixed delay after launch. No actual readiness guarantee.
    Settle(Duration),
    /// Poll [`RunningRuntime::is_ready`] until it succeeds or `timeout` passes.
    Poll { timeout: Duration, interval: Duration },
}

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Settle(DEFAULT_SETTLE_DELAY)
    }
}

impl Readiness {
    /// Block until `runtime` counts as ready under this policy.
    pub fn wait(&self, runtime: &mut dyn RunningRuntime) -> Result<()> {
        match *self {
            Readiness::Settle(delay) => {
                tracing::warn!(
                    ?delay,
                    "no readiness signal; waiting a fixed settle delay after launch"
                );
                thread::sleep(delay);
                Ok(())
            }
            Readiness::Poll { timeout, interval } => {
                let deadline = Instant::now() + timeout;
                loop {
                    if runtime.is_ready().context("checking runtime readiness")? {
                        return Ok(());
                    }
                    if Instant::now() >= deadline {
                        bail!("runtime not ready after {:?}", timeout);
                    }
                    thread::sleep(interval);
                }
            }
        }
    }
}

/// Launches the runtime by spawning a program inside the placeholder home.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
    options_var: String,
    grace_period: Duration,
}

impl CommandLauncher {
    /// `program` is resolved relative to the home directory first, then
    /// on `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            options_var: "JAVA_TOOL_OPTIONS".to_string(),
            grace_period: Duration::from_secs(20),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Environment variable receiving the `-D` options.
    pub fn options_var(mut self, name: &str) -> Self {
        self.options_var = name.to_string();
        self
    }

    /// Time allowed between SIGTERM and SIGKILL on shutdown.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    fn resolve_program(&self, home: &Path) -> Result<PathBuf> {
        let in_home = home.join(&self.program);
        if self.program.is_relative() && in_home.is_file() {
            return Ok(in_home);
        }
        which::which(&self.program)
            .with_context(|| format!("launch program '{}' not found", self.program.display()))
    }
}

impl RuntimeLauncher for CommandLauncher {
    fn launch(&self, home: &Path, env: &RuntimeEnvironment) -> Result<Box<dyn RunningRuntime>> {
        let program = self.resolve_program(home)?;
        let options = env.to_options_string()?;
        tracing::info!(program = %program.display(), home = %home.display(), "launching runtime");

        let child = Command::new(&program)
            .args(&self.args)
            .current_dir(home)
            .env(&self.options_var, options)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning '{}'", program.display()))?;

        Ok(Box::new(ChildRuntime {
            child,
            grace_period: self.grace_period,
        }))
    }
}

struct ChildRuntime {
    child: Child,
    grace_period: Duration,
}

impl RunningRuntime for ChildRuntime {
    fn is_ready(&mut self) -> Result<bool> {
        match self.child.try_wait().context("polling runtime process")? {
            Some(status) => bail!("runtime process exited early with {status}"),
            None => Ok(true),
        }
    }

    fn shutdown(mut self: Box<Self>) -> Result<()> {
        if self.child.try_wait().context("polling runtime process")?.is_some() {
            return Ok(());
        }

        let pid = self.child.id() as libc::pid_t;
        // SAFETY: signalling a child we spawned and have not yet reaped.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            tracing::warn!(pid, "SIGTERM failed; killing runtime process");
        }

        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait().context("polling runtime process")? {
                tracing::info!(%status, "runtime process exited");
                return Ok(());
            }
            thread::sleep(Duration::from_millis(100));
        }

        tracing::warn!(pid, grace = ?self.grace_period, "runtime ignored SIGTERM; killing");
        self.child.kill().context("killing runtime process")?;
        self.child.wait().context("reaping runtime process")?;
        Ok(())
    }
}
