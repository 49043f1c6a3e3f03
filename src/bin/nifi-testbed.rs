use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nifi_testbed::stage::sweep_placeholder;
use nifi_testbed::{HomeLayout, TestInstance, TestbedConfig};

fn usage() -> &'static str {
    "Usage:\n  nifi-testbed install <config.toml>\n  nifi-testbed run <config.toml>\n  nifi-testbed edit <config.toml> <output.xml>\n  nifi-testbed clean [placeholder_dir]"
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nifi_testbed=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [cmd, config] if cmd == "install" => install(Path::new(config)),
        [cmd, config] if cmd == "run" => run(Path::new(config)),
        [cmd, config, output] if cmd == "edit" => edit(Path::new(config), Path::new(output)),
        [cmd] if cmd == "clean" => clean(None),
        [cmd, dir] if cmd == "clean" => clean(Some(PathBuf::from(dir))),
        _ => bail!(usage()),
    }
}

fn load_instance(config_path: &Path) -> Result<(TestbedConfig, TestInstance)> {
    let config = TestbedConfig::load(config_path)?;
    let mut builder = config.instance_builder()?;
    if config.launcher.is_none() {
        bail!(
            "config '{}' has no [launcher] section",
            config_path.display()
        );
    }
    let instance = builder.build()?;
    Ok((config, instance))
}

fn install(config_path: &Path) -> Result<()> {
    let (_, mut instance) = load_instance(config_path)?;
    instance.install()?;
    println!("{instance}");
    Ok(())
}

fn run(config_path: &Path) -> Result<()> {
    let (_, mut instance) = load_instance(config_path)?;
    instance.install()?;
    if let Err(e) = instance.start() {
        tracing::error!(error = %e, "start failed; cleaning up");
        instance
            .stop_and_cleanup()
            .context("cleaning up after failed start")?;
        return Err(e.into());
    }

    println!("{instance}");
    println!("Press Enter to stop NiFi and clean up.");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading stdin")?;

    instance.stop_and_cleanup()?;
    println!("{instance}");
    Ok(())
}

fn edit(config_path: &Path, output: &Path) -> Result<()> {
    let config = TestbedConfig::load(config_path)?;
    match config.flow_editor()? {
        Some(editor) => editor.edit_file(&config.flow_definition, output)?,
        None => {
            std::fs::copy(&config.flow_definition, output).with_context(|| {
                format!(
                    "copying '{}' to '{}'",
                    config.flow_definition.display(),
                    output.display()
                )
            })?;
        }
    }
    println!("{}", output.display());
    Ok(())
}

fn clean(dir: Option<PathBuf>) -> Result<()> {
    let layout = match dir {
        Some(dir) => HomeLayout::new(&dir)?,
        None => HomeLayout::from_current_dir()?,
    };
    let removed = sweep_placeholder(&layout)?;
    println!("removed {removed} entries from {}", layout.root().display());
    Ok(())
}
