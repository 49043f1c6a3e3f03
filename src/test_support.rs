//! Fixtures shared by the unit tests: fake runtime archives, a sample flow
//! definition and a recording launcher.

use anyhow::{bail, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use crate::layout::{HomeLayout, PLACEHOLDER_DIR_NAME};
use crate::runtime::{RunningRuntime, RuntimeEnvironment, RuntimeLauncher};

pub(crate) const RUNTIME_DIR: &str = "nifi-1.6.0";

pub(crate) const SAMPLE_FLOW: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<flowController encoding-version="1.2">
  <maxTimerDrivenThreadCount>10</maxTimerDrivenThreadCount>
  <rootGroup>
    <id>7a1c0a5e-0163-1000-5f2e-4b5b4ddb7a51</id>
    <name>NiFi Flow</name>
    <processor>
      <id>7a1d2c3b-0163-1000-0000-000000000001</id>
      <name>GetHTTP</name>
      <class>org.apache.nifi.processors.standard.GetHTTP</class>
      <schedulingPeriod>60 sec</schedulingPeriod>
      <property>
        <name>URL</name>
        <value>http://feeds.bbci.co.uk/news/world/rss.xml</value>
      </property>
      <property>
        <name>Filename</name>
        <value>bbc-world.rss.xml</value>
      </property>
    </processor>
    <processor>
      <id>7a1d2c3b-0163-1000-0000-000000000002</id>
      <name>LogAttribute</name>
      <class>org.apache.nifi.processors.standard.LogAttribute</class>
    </processor>
    <processGroup>
      <id>7a1e0000-0163-1000-0000-000000000010</id>
      <name>Output</name>
      <processor>
        <id>7a1d2c3b-0163-1000-0000-000000000003</id>
        <name>PutFile</name>
        <class>org.apache.nifi.processors.standard.PutFile</class>
        <property>
          <name>Directory</name>
          <value>${user.home}/NiFiTest/NiFiReadTest</value>
        </property>
      </processor>
      <processor>
        <id>7a1d2c3b-0163-1000-0000-000000000004</id>
        <name>LogAttribute</name>
        <class>org.apache.nifi.processors.standard.LogAttribute</class>
      </processor>
    </processGroup>
  </rootGroup>
</flowController>
"#;

/// Files of a fake runtime distribution: (relative path, contents, mode).
fn runtime_files(root: &str) -> Vec<(String, &'static str, u32)> {
    vec![
        (format!("{root}/bin/nifi.sh"), "#!/bin/sh\nexit 0\n", 0o755),
        (
            format!("{root}/conf/nifi.properties"),
            "nifi.flow.configuration.file=./conf/flow.xml.gz\n",
            0o644,
        ),
        (format!("{root}/lib/nifi-api-1.6.0.jar"), "jar", 0o644),
        (
            format!("{root}/lib/bootstrap/nifi-bootstrap-1.6.0.jar"),
            "jar",
            0o644,
        ),
        (format!("{root}/LICENSE"), "Apache License 2.0\n", 0o644),
        (format!("{root}/.DS_Store"), "", 0o644),
    ]
}

fn runtime_dirs(root: &str) -> Vec<String> {
    ["", "/bin", "/conf", "/lib", "/lib/bootstrap"]
        .iter()
        .map(|sub| format!("{root}{sub}"))
        .collect()
}

/// Create `<parent>/nifi_test_nifi_home` and its layout.
pub(crate) fn placeholder_layout(parent: &Path) -> HomeLayout {
    let dir = parent.join(PLACEHOLDER_DIR_NAME);
    fs::create_dir_all(&dir).unwrap();
    HomeLayout::new(&dir).unwrap()
}

/// Zip archive in `dir` holding one runtime tree per entry of `roots`.
pub(crate) fn write_runtime_zip(dir: &Path, roots: &[&str]) -> PathBuf {
    let path = dir.join("nifi-bin.zip");
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    let dir_options = SimpleFileOptions::default().unix_permissions(0o755);

    zip.start_file("README.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"distribution readme\n").unwrap();

    for root in roots {
        for sub in runtime_dirs(root) {
            zip.add_directory(format!("{sub}/"), dir_options).unwrap();
        }
        for (name, contents, mode) in runtime_files(root) {
            zip.start_file(name, SimpleFileOptions::default().unix_permissions(mode))
                .unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
    path
}

/// Gzipped tar archive in `dir` holding one runtime tree per entry of `roots`.
pub(crate) fn write_runtime_tar_gz(dir: &Path, roots: &[&str]) -> PathBuf {
    let path = dir.join("nifi-bin.tar.gz");
    let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    let mut tar = tar::Builder::new(encoder);

    for root in roots {
        for sub in runtime_dirs(root) {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            tar.append_data(&mut header, format!("{sub}/"), std::io::empty())
                .unwrap();
        }
        for (name, contents, mode) in runtime_files(root) {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(mode);
            header.set_cksum();
            tar.append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
    }
    tar.into_inner().unwrap().finish().unwrap();
    path
}

/// A placeholder root, a runtime archive and the sample flow on disk.
pub(crate) struct Fixture {
    _temp: TempDir,
    pub(crate) layout: HomeLayout,
    pub(crate) archive: PathBuf,
    pub(crate) flow: PathBuf,
}

impl Fixture {
    pub(crate) fn new(temp: TempDir, layout: HomeLayout, archive: PathBuf) -> Self {
        let flow = temp.path().join("flow.xml");
        fs::write(&flow, SAMPLE_FLOW).unwrap();
        Self {
            _temp: temp,
            layout,
            archive,
            flow,
        }
    }

    pub(crate) fn zip() -> Self {
        let temp = TempDir::new().unwrap();
        let layout = placeholder_layout(temp.path());
        let archive = write_runtime_zip(temp.path(), &[RUNTIME_DIR]);
        Self::new(temp, layout, archive)
    }

    pub(crate) fn tar_gz() -> Self {
        let temp = TempDir::new().unwrap();
        let layout = placeholder_layout(temp.path());
        let archive = write_runtime_tar_gz(temp.path(), &[RUNTIME_DIR]);
        Self::new(temp, layout, archive)
    }
}

#[derive(Default)]
struct Recorded {
    events: Vec<&'static str>,
    last_env: Option<RuntimeEnvironment>,
}

/// Launcher that records calls instead of starting anything.
#[derive(Clone, Default)]
pub(crate) struct FakeLauncher {
    recorded: Arc<Mutex<Recorded>>,
    fail_launch: bool,
    fail_shutdown: bool,
    never_ready: bool,
}

impl FakeLauncher {
    pub(crate) fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_shutdown() -> Self {
        Self::default().with_failing_shutdown()
    }

    pub(crate) fn with_failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub(crate) fn never_ready() -> Self {
        Self {
            never_ready: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<&'static str> {
        self.recorded.lock().unwrap().events.clone()
    }

    pub(crate) fn last_env(&self) -> Option<RuntimeEnvironment> {
        self.recorded.lock().unwrap().last_env.clone()
    }
}

impl RuntimeLauncher for FakeLauncher {
    fn launch(&self, _home: &Path, env: &RuntimeEnvironment) -> Result<Box<dyn RunningRuntime>> {
        if self.fail_launch {
            bail!("fake runtime refused to launch");
        }
        let mut recorded = self.recorded.lock().unwrap();
        recorded.events.push("launch");
        recorded.last_env = Some(env.clone());
        Ok(Box::new(FakeRuntime {
            launcher: self.clone(),
        }))
    }
}

struct FakeRuntime {
    launcher: FakeLauncher,
}

impl RunningRuntime for FakeRuntime {
    fn is_ready(&mut self) -> Result<bool> {
        Ok(!self.launcher.never_ready)
    }

    fn shutdown(self: Box<Self>) -> Result<()> {
        self.launcher
            .recorded
            .lock()
            .unwrap()
            .events
            .push("shutdown");
        if self.launcher.fail_shutdown {
            bail!("fake runtime refused to stop");
        }
        Ok(())
    }
}
