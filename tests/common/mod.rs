// Shared test helpers for integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{TempDir, tempdir};

use lit_runner::core::config::{Config, ConfigBuilder, parse_suite_file};
use lit_runner::core::execution::{CommandOutput, CommandRunner, RunContext};
use lit_runner::core::features::StaticProbe;
use lit_runner::core::models::TestSpec;
use lit_runner::core::planner;
use lit_runner::infra::command::ShellRunner;

/// A minimal configuration accepting `.test` files.
pub const BASIC_CONFIG: &str = r#"
name = "sample"
suffixes = [".test"]
"#;

/// A throwaway suite directory.
pub struct TestSuite {
    pub dir: TempDir,
}

impl TestSuite {
    pub fn new() -> Self {
        Self {
            dir: tempdir().expect("Failed to create temporary directory"),
        }
    }

    /// The canonical root, matching `Config::source_root`.
    pub fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().unwrap()
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }

    /// Writes `lit.toml` and returns its path.
    pub fn write_config(&self, content: &str) -> PathBuf {
        self.write("lit.toml", content)
    }

    pub fn config(&self, toml: &str) -> Config {
        self.config_with_features(toml, &[])
    }

    /// Builds a hermetic configuration: no host probing, only `PATH` from the host.
    pub fn config_with_features(&self, toml: &str, features: &[&str]) -> Config {
        self.builder(toml, features).build().expect("configuration should build")
    }

    pub fn builder(&self, toml: &str, features: &[&str]) -> ConfigBuilder {
        let file = parse_suite_file(toml, Path::new("lit.toml")).expect("valid TOML");
        ConfigBuilder::new(file, self.root())
            .with_probe(StaticProbe::new(features.iter().copied()))
            .with_host_env(host_env())
    }
}

/// The host variables tests need to find standard utilities.
pub fn host_env() -> BTreeMap<String, String> {
    std::env::var("PATH")
        .map(|path| BTreeMap::from([("PATH".to_string(), path)]))
        .unwrap_or_default()
}

/// Plans every test of `config` in discovery order.
pub fn plan(config: &Config) -> Vec<TestSpec> {
    planner::plan_execution(config, &[], None, None)
        .expect("planning should succeed")
        .tests
}

/// Plans and returns the single test at `relative`.
pub fn spec(config: &Config, relative: &str) -> TestSpec {
    plan(config)
        .into_iter()
        .find(|spec| spec.relative_path == relative)
        .unwrap_or_else(|| panic!("test {relative} was not discovered"))
}

/// A runner that records every command and delegates to the real shell.
#[derive(Debug, Default)]
pub struct CountingRunner {
    inner: ShellRunner,
    pub commands: Mutex<Vec<String>>,
}

impl CountingRunner {
    pub fn spawn_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

impl CommandRunner for CountingRunner {
    fn run(&self, command: &str, ctx: &RunContext<'_>) -> impl Future<Output = CommandOutput> + Send {
        self.commands.lock().unwrap().push(command.to_string());
        self.inner.run(command, ctx)
    }
}
