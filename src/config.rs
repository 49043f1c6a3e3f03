//! TOML description of a test instance.
//!
//! Relative paths are resolved against the directory holding the config
//! file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::edit::FlowEditor;
use crate::error::ConfigError;
use crate::instance::TestInstanceBuilder;
use crate::runtime::{CommandLauncher, Readiness};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestbedToml {
    archive: String,
    flow_definition: String,
    working_dir: Option<String>,
    readiness: Option<ReadinessToml>,
    launcher: Option<LauncherToml>,
    #[serde(default)]
    edit: Vec<EditSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
enum ReadinessToml {
    Settle {
        settle_secs: u64,
    },
    Poll {
        timeout_secs: u64,
        #[serde(default = "default_poll_interval_millis")]
        interval_millis: u64,
    },
}

fn default_poll_interval_millis() -> u64 {
    500
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LauncherToml {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    options_var: Option<String>,
    grace_secs: Option<u64>,
}

/// One `[[edit]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum EditSpec {
    SetProperty {
        processor: String,
        property: String,
        value: String,
    },
    SetClass {
        processor: String,
        class: String,
    },
}

/// A parsed and path-resolved config file.
#[derive(Debug, Clone)]
pub struct TestbedConfig {
    pub archive: PathBuf,
    pub flow_definition: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub readiness: Readiness,
    pub launcher: Option<CommandLauncher>,
    pub edits: Vec<EditSpec>,
}

impl TestbedConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            message,
        };

        let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let parsed: TestbedToml = toml::from_str(&text).map_err(|e| invalid(e.to_string()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::from_toml(parsed, base))
    }

    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let parsed: TestbedToml = toml::from_str(text).map_err(|e| ConfigError::InvalidFile {
            path: base_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_toml(parsed, base_dir))
    }

    fn from_toml(parsed: TestbedToml, base: &Path) -> Self {
        let readiness = match parsed.readiness {
            None => Readiness::default(),
            Some(ReadinessToml::Settle { settle_secs }) => {
                Readiness::Settle(Duration::from_secs(settle_secs))
            }
            Some(ReadinessToml::Poll {
                timeout_secs,
                interval_millis,
            }) => Readiness::Poll {
                timeout: Duration::from_secs(timeout_secs),
                interval: Duration::from_millis(interval_millis),
            },
        };

        let launcher = parsed.launcher.map(|l| {
            let mut launcher = CommandLauncher::new(l.program).args(l.args);
            if let Some(var) = l.options_var {
                launcher = launcher.options_var(&var);
            }
            if let Some(grace) = l.grace_secs {
                launcher = launcher.grace_period(Duration::from_secs(grace));
            }
            launcher
        });

        Self {
            archive: resolve(base, &parsed.archive),
            flow_definition: resolve(base, &parsed.flow_definition),
            working_dir: parsed.working_dir.map(|dir| resolve(base, &dir)),
            readiness,
            launcher,
            edits: parsed.edit,
        }
    }

    /// The edit pipeline described by the `[[edit]]` entries, in order.
    pub fn flow_editor(&self) -> Result<Option<FlowEditor>, ConfigError> {
        if self.edits.is_empty() {
            return Ok(None);
        }
        let mut builder = FlowEditor::builder();
        for edit in &self.edits {
            match edit {
                EditSpec::SetProperty {
                    processor,
                    property,
                    value,
                } => builder.set_single_processor_property(processor, property, value)?,
                EditSpec::SetClass { processor, class } => {
                    builder.set_class_of_single_processor(processor, class)?
                }
            };
        }
        builder.build().map(Some)
    }

    /// An instance builder with everything from the file applied.
    ///
    /// The launcher from the file is only applied when present; callers
    /// may still set their own.
    pub fn instance_builder(&self) -> Result<TestInstanceBuilder, ConfigError> {
        let mut builder = crate::instance::TestInstance::builder();
        builder
            .archive(&self.archive)?
            .flow_definition(&self.flow_definition)?
            .readiness(self.readiness)?;
        if let Some(dir) = &self.working_dir {
            builder.working_dir(dir)?;
        }
        if let Some(editor) = self.flow_editor()? {
            builder.edit_flow(editor)?;
        }
        if let Some(launcher) = &self.launcher {
            builder.launcher(launcher.clone())?;
        }
        Ok(builder)
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, SAMPLE_FLOW};
    use crate::state::State;
    use tempfile::TempDir;
    use xmltree::Element;

    const FULL: &str = r#"
archive = "nifi-bin.zip"
flow_definition = "/abs/flow.xml"
working_dir = "nifi_test_nifi_home"

[readiness]
mode = "poll"
timeout_secs = 60

[launcher]
program = "bin/nifi.sh"
args = ["run"]

[[edit]]
kind = "set_property"
processor = "GetHTTP"
property = "URL"
value = "http://localhost:12345"

[[edit]]
kind = "set_class"
processor = "GetHTTP"
class = "com.example.MockedGetHTTP"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = TestbedConfig::parse(FULL, Path::new("/base")).unwrap();

        assert_eq!(config.archive, PathBuf::from("/base/nifi-bin.zip"));
        assert_eq!(config.flow_definition, PathBuf::from("/abs/flow.xml"));
        assert_eq!(
            config.working_dir,
            Some(PathBuf::from("/base/nifi_test_nifi_home"))
        );
        assert_eq!(
            config.readiness,
            Readiness::Poll {
                timeout: Duration::from_secs(60),
                interval: Duration::from_millis(500),
            }
        );
        assert!(config.launcher.is_some());
        assert_eq!(
            config.edits[1],
            EditSpec::SetClass {
                processor: "GetHTTP".into(),
                class: "com.example.MockedGetHTTP".into(),
            }
        );
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = TestbedConfig::parse(
            "archive = \"a.zip\"\nflow_definition = \"flow.xml\"\n",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(config.readiness, Readiness::default());
        assert!(config.launcher.is_none());
        assert!(config.flow_editor().unwrap().is_none());
    }

    #[test]
    fn test_rejects_unknown_fields_and_kinds() {
        let unknown_field = "archive = \"a\"\nflow_definition = \"b\"\nextra = 1\n";
        assert!(TestbedConfig::parse(unknown_field, Path::new(".")).is_err());

        let unknown_kind = r#"
archive = "a"
flow_definition = "b"
[[edit]]
kind = "delete_processor"
processor = "GetHTTP"
"#;
        assert!(matches!(
            TestbedConfig::parse(unknown_kind, Path::new(".")),
            Err(ConfigError::InvalidFile { .. })
        ));
    }

    #[test]
    fn test_flow_editor_applies_edits_in_order() {
        let config = TestbedConfig::parse(FULL, Path::new("/base")).unwrap();
        let editor = config.flow_editor().unwrap().unwrap();
        assert_eq!(editor.len(), 2);

        let mut doc = Element::parse(SAMPLE_FLOW.as_bytes()).unwrap();
        editor.apply(&mut doc).unwrap();
        let mut out = Vec::new();
        doc.write(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("http://localhost:12345"));
        assert!(out.contains("com.example.MockedGetHTTP"));
    }

    #[test]
    fn test_load_builds_instance() {
        let fixture = Fixture::zip();
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("nifi-testbed.toml");
        fs::write(
            &config_path,
            format!(
                "archive = {:?}\nflow_definition = {:?}\nworking_dir = {:?}\n\n[launcher]\nprogram = \"bin/nifi.sh\"\n",
                fixture.archive.display().to_string(),
                fixture.flow.display().to_string(),
                fixture.layout.root().display().to_string(),
            ),
        )
        .unwrap();

        let config = TestbedConfig::load(&config_path).unwrap();
        let instance = config.instance_builder().unwrap().build().unwrap();
        assert_eq!(instance.state(), State::Created);
        assert_eq!(instance.layout(), &fixture.layout);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            TestbedConfig::load(&temp.path().join("absent.toml")),
            Err(ConfigError::InvalidFile { .. })
        ));
    }
}
