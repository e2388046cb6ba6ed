//! # Error Taxonomy / 错误分类
//!
//! Typed errors raised by the engine. `ConfigError` is the only class that
//! aborts a whole run; the others are isolated to the test that raised them
//! and surface as its `Error` outcome.
//!
//! 引擎抛出的类型化错误。`ConfigError` 是唯一会中止整个运行的错误类别；
//! 其他错误仅限于引发它们的测试，并表现为该测试的 `Error` 结果。

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or unusable configuration. Fatal, raised before discovery.
/// 格式错误或不可用的配置。致命错误，在发现之前抛出。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to expand path `{path}`: {message}")]
    Expand { path: String, message: String },

    #[error("cannot build path list `{name}`: {message}")]
    PathList { name: String, message: String },

    #[error("source root {0} does not exist or is not a directory")]
    MissingSourceRoot(PathBuf),

    #[error("the configured suffix set is empty")]
    EmptySuffixes,

    #[error("invalid substitution pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("substitution pattern must not be empty")]
    EmptyPattern,

    #[error("test path {0} is outside of the source root")]
    OutsideSourceRoot(PathBuf),

    #[error("test path {0} does not exist")]
    MissingTestPath(PathBuf),

    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

/// A run-line could not be substituted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("tool `{0}` is used by this run-line but no path was resolved for it")]
    MissingTool(String),
}

/// A test file's embedded directives are unusable.
/// 测试文件中嵌入的指令不可用。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("test has no RUN: lines")]
    NoRunLines,

    #[error("line {line}: {keyword} has an empty item list")]
    EmptyList { line: usize, keyword: &'static str },

    #[error("line {line}: {keyword} contains an empty item")]
    EmptyItem { line: usize, keyword: &'static str },

    #[error("line {line}: RUN: line ends with a continuation but no RUN: line follows")]
    UnterminatedRun { line: usize },

    #[error("failed to read test file: {0}")]
    Unreadable(String),
}
