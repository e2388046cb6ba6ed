//! # Configuration Module / 配置模块
//!
//! The suite configuration is read from a TOML file (`lit.toml` by default)
//! into a [`SuiteFile`], then resolved once by [`ConfigBuilder`] into an
//! immutable [`Config`] that is shared by every component of the run.
//! Nothing reads the process environment after the build step.
//!
//! 套件配置从 TOML 文件（默认为 `lit.toml`）读取到 [`SuiteFile`]，
//! 然后由 [`ConfigBuilder`] 一次性解析为不可变的 [`Config`]，
//! 并由运行的每个组件共享。构建步骤之后不再读取进程环境。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::error::ConfigError;
use crate::core::features::{FeatureProbe, FeatureSet, HostProbe};
use crate::core::substitution::{Substitution, SubstitutionTable};
use crate::infra::fs::expand_path;

/// Default name of the suite configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "lit.toml";

/// How a configured substitution pattern is matched.
/// 配置的替换模式的匹配方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain text with identifier boundaries.
    #[default]
    Literal,
    /// Regular expression with optional junk-character exclusion.
    Regex,
    /// Regular expression matched exactly as written.
    Verbatim,
}

/// A `[[substitutions]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubstitutionEntry {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub mode: MatchMode,
    /// Characters that may not directly precede a match (regex mode).
    #[serde(default)]
    pub pre: String,
    /// Characters that may not directly follow a match (regex mode).
    #[serde(default)]
    pub post: String,
}

/// A `[[tools]]` entry: a tool name that is rewritten to its path in the tools directory.
/// `[[tools]]` 条目：一个被改写为其在工具目录中路径的工具名称。
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub pre: String,
    #[serde(default)]
    pub post: String,
    /// A regex matched as written (e.g. `\| \bnot\b`) instead of the bare name.
    #[serde(default)]
    pub verbatim: Option<String>,
    /// Missing required tools are reported when the configuration is built.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Explicit path, bypassing the tools directory lookup.
    #[serde(default)]
    pub path: Option<String>,
}

/// A `[[path_env]]` entry: directories added around the current value of a
/// path-list variable such as `OCAMLPATH` or `LD_LIBRARY_PATH`.
///
/// The current value is the one from `[environment]`, else the propagated
/// host value. Relative directories are anchored at the configuration file.
///
/// `[[path_env]]` 条目：添加到路径列表变量当前值前后的目录。
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathEnvSpec {
    pub name: String,
    #[serde(default)]
    pub prepend: Vec<String>,
    #[serde(default)]
    pub append: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "tests".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// The configuration file as written on disk.
/// 磁盘上的配置文件。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
    /// Name of the test suite, used in report headers.
    #[serde(default = "default_name")]
    pub name: String,

    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// Defaults to "en" if not specified.
    ///
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    /// 如果未指定，则默认为 "en"。
    #[serde(default = "default_language")]
    pub language: String,

    /// Where tests are discovered. Relative to the configuration file.
    #[serde(default)]
    pub source_root: Option<String>,

    /// Where tests run. Defaults to the source root.
    #[serde(default)]
    pub exec_root: Option<String>,

    /// Directory holding the tools under test; prepended to `PATH`.
    #[serde(default)]
    pub tools_dir: Option<String>,

    /// File extensions (with the leading dot) that mark test files.
    #[serde(default)]
    pub suffixes: Vec<String>,

    /// File and directory names skipped during discovery.
    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default)]
    pub features: Vec<String>,

    /// Code generation targets; each yields a `<target>-registered-target` feature.
    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub target_triple: Option<String>,

    /// Default per-test timeout in seconds. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Host variables passed through to run-lines.
    #[serde(default)]
    pub propagate_env: Vec<String>,

    /// Variables set for run-lines, overriding propagated ones.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Path-list variables extended around their current value.
    #[serde(default)]
    pub path_env: Vec<PathEnvSpec>,

    #[serde(default)]
    pub substitutions: Vec<SubstitutionEntry>,

    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

impl Default for SuiteFile {
    fn default() -> Self {
        Self {
            name: default_name(),
            language: default_language(),
            source_root: None,
            exec_root: None,
            tools_dir: None,
            suffixes: vec![],
            excludes: vec![],
            features: vec![],
            targets: vec![],
            target_triple: None,
            timeout_secs: None,
            propagate_env: vec![],
            environment: BTreeMap::new(),
            path_env: vec![],
            substitutions: vec![],
            tools: vec![],
        }
    }
}

/// Loads and parses a suite configuration file.
pub fn load_suite_file(path: &Path) -> Result<SuiteFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_suite_file(&content, path)
}

/// Parses suite configuration text; `path` is only used in error messages.
pub fn parse_suite_file(content: &str, path: &Path) -> Result<SuiteFile, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalizes a suffix so it always carries its leading dot.
pub fn normalize_suffix(suffix: &str) -> String {
    if suffix.starts_with('.') {
        suffix.to_string()
    } else {
        format!(".{suffix}")
    }
}

/// The immutable snapshot every component of a run reads from.
/// 运行中每个组件读取的不可变快照。
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub language: String,
    pub source_root: PathBuf,
    pub exec_root: PathBuf,
    pub tools_dir: Option<PathBuf>,
    pub suffixes: BTreeSet<String>,
    pub excludes: BTreeSet<String>,
    pub substitutions: SubstitutionTable,
    pub features: FeatureSet,
    /// Every configured tool and the path it resolved to, if any.
    pub tool_paths: BTreeMap<String, Option<PathBuf>>,
    /// The complete environment run-lines execute with.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub target_triple: Option<String>,
}

/// Resolves a [`SuiteFile`] into a [`Config`].
pub struct ConfigBuilder {
    file: SuiteFile,
    base_dir: PathBuf,
    probe: Box<dyn FeatureProbe>,
    extra_features: Vec<String>,
    timeout: Option<Duration>,
    host_env: Option<BTreeMap<String, String>>,
}

impl ConfigBuilder {
    /// Starts from an already parsed file. Relative paths are anchored at `base_dir`.
    pub fn new(file: SuiteFile, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            file,
            base_dir: base_dir.into(),
            probe: Box::new(HostProbe),
            extra_features: vec![],
            timeout: None,
            host_env: None,
        }
    }

    /// Loads `path` and anchors relative paths at its directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = load_suite_file(path)?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::new(file, base_dir))
    }

    pub fn with_probe(mut self, probe: impl FeatureProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Adds features on top of the configured and probed ones (e.g. `-D` on the command line).
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_features
            .extend(features.into_iter().map(Into::into));
        self
    }

    /// Overrides the configured default timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }

    /// Uses `env` instead of the process environment as the host environment.
    pub fn with_host_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.host_env = Some(env);
        self
    }

    pub fn language(&self) -> &str {
        &self.file.language
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let file = self.file;
        let base = self.base_dir;

        let source_root = match &file.source_root {
            Some(raw) => expand_path(raw, &base)?,
            None => base.clone(),
        };
        if !source_root.is_dir() {
            return Err(ConfigError::MissingSourceRoot(source_root));
        }
        let source_root = source_root
            .canonicalize()
            .map_err(|_| ConfigError::MissingSourceRoot(source_root.clone()))?;

        let exec_root = match &file.exec_root {
            Some(raw) => expand_path(raw, &base)?,
            None => source_root.clone(),
        };
        let tools_dir = file
            .tools_dir
            .as_deref()
            .map(|raw| expand_path(raw, &base))
            .transpose()?;

        let suffixes: BTreeSet<String> = file.suffixes.iter().map(|s| normalize_suffix(s)).collect();
        if suffixes.is_empty() {
            return Err(ConfigError::EmptySuffixes);
        }
        let excludes: BTreeSet<String> = file.excludes.iter().cloned().collect();

        let mut features: FeatureSet = file.features.iter().cloned().collect();
        features.extend(self.probe.probe(&file.targets, file.target_triple.as_deref()));
        features.extend(self.extra_features);

        let mut substitutions = SubstitutionTable::new();
        for entry in &file.substitutions {
            substitutions.push(match entry.mode {
                MatchMode::Literal => Substitution::literal(&entry.pattern, &entry.replacement)?,
                MatchMode::Regex => {
                    Substitution::regex(&entry.pattern, &entry.replacement, &entry.pre, &entry.post)?
                }
                MatchMode::Verbatim => Substitution::verbatim(&entry.pattern, &entry.replacement)?,
            });
        }

        let mut tool_paths = BTreeMap::new();
        for tool in &file.tools {
            let path = resolve_tool(tool, tools_dir.as_deref(), &base)?;
            match (&path, tool.required) {
                (Some(path), _) => debug!(tool = %tool.name, path = %path.display(), "resolved tool"),
                (None, true) => warn!(tool = %tool.name, "required tool not found"),
                (None, false) => debug!(tool = %tool.name, "optional tool not found"),
            }
            substitutions.push(Substitution::tool(
                &tool.name,
                path.clone(),
                &tool.pre,
                &tool.post,
                tool.verbatim.as_deref(),
            )?);
            tool_paths.insert(tool.name.clone(), path);
        }

        let host_env = self
            .host_env
            .unwrap_or_else(|| {
                std::env::vars_os()
                    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                    .collect()
            });
        let env = build_environment(&file, tools_dir.as_deref(), &host_env, &base)?;

        let timeout = self
            .timeout
            .or(file.timeout_secs.map(Duration::from_secs));

        Ok(Config {
            name: file.name,
            language: file.language,
            source_root,
            exec_root,
            tools_dir,
            suffixes,
            excludes,
            substitutions,
            features,
            tool_paths,
            env,
            timeout,
            target_triple: file.target_triple.filter(|t| !t.is_empty()),
        })
    }
}

fn resolve_tool(
    tool: &ToolSpec,
    tools_dir: Option<&Path>,
    base: &Path,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(raw) = &tool.path {
        let path = expand_path(raw, base)?;
        return Ok(path.is_file().then_some(path));
    }
    Ok(tools_dir
        .map(|dir| dir.join(format!("{}{}", tool.name, std::env::consts::EXE_SUFFIX)))
        .filter(|path| path.is_file()))
}

/// Computes the environment run-lines see: allowlisted host variables,
/// then configured overrides, with the tools directory prepended to `PATH`.
///
/// 计算运行行看到的环境：允许列表中的主机变量，然后是配置的覆盖，
/// 并将工具目录添加到 `PATH` 之前。
fn build_environment(
    file: &SuiteFile,
    tools_dir: Option<&Path>,
    host_env: &BTreeMap<String, String>,
    base: &Path,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut env: BTreeMap<String, String> = file
        .propagate_env
        .iter()
        .filter_map(|name| host_env.get(name).map(|value| (name.clone(), value.clone())))
        .collect();

    env.extend(file.environment.clone());

    for spec in &file.path_env {
        let current = match env.get(&spec.name) {
            Some(value) => value.clone(),
            None if spec.name == "PATH" => host_env.get("PATH").cloned().unwrap_or_default(),
            None => String::new(),
        };
        let expand = |dirs: &[String]| -> Result<Vec<PathBuf>, ConfigError> {
            dirs.iter().map(|raw| expand_path(raw, base)).collect()
        };
        let mut paths = expand(&spec.prepend)?;
        paths.extend(std::env::split_paths(&current).filter(|p| !p.as_os_str().is_empty()));
        paths.extend(expand(&spec.append)?);
        let joined = std::env::join_paths(paths).map_err(|e| ConfigError::PathList {
            name: spec.name.clone(),
            message: e.to_string(),
        })?;
        debug!(name = %spec.name, value = %joined.to_string_lossy(), "extended path list");
        env.insert(spec.name.clone(), joined.to_string_lossy().into_owned());
    }

    let host_path = env
        .get("PATH")
        .or_else(|| host_env.get("PATH"))
        .cloned()
        .unwrap_or_default();
    let mut paths: Vec<PathBuf> = tools_dir.map(Path::to_path_buf).into_iter().collect();
    paths.extend(std::env::split_paths(&host_path).filter(|p| !p.as_os_str().is_empty()));
    match std::env::join_paths(paths) {
        Ok(joined) => {
            env.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
        }
        Err(e) => warn!("failed to build PATH for run-lines: {e}"),
    }

    Ok(env)
}
