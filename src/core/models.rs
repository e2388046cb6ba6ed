//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the lit runner:
//! the planned test, its outcome and the result reported for it.
//!
//! 此模块定义了整个 lit runner 中使用的核心数据结构：
//! 计划的测试、其结果类别以及为其报告的结果。

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::directives::Directives;
use crate::core::error::DirectiveError;
use crate::infra::t;

/// A test ready to be scheduled. Immutable once planned.
/// 准备调度的测试。计划后不可变。
#[derive(Debug, Clone)]
pub struct TestSpec {
    /// Position in discovery order; results are reported in this order.
    pub index: usize,
    /// Path relative to the source root, `/`-separated.
    pub relative_path: String,
    /// Absolute path of the test file.
    pub path: PathBuf,
    /// Raw text of the test file.
    pub source: String,
    /// Parsed directives. Empty when `directive_error` is set.
    pub directives: Directives,
    /// Why the directives could not be used, if they could not.
    pub directive_error: Option<DirectiveError>,
    /// Timeout from the enclosing directory scope, overriding the configured default.
    pub timeout: Option<Duration>,
    /// Set when a `lit.local.toml` marked the whole directory unsupported.
    pub scope_unsupported: bool,
}

impl TestSpec {
    pub fn name(&self) -> &str {
        &self.relative_path
    }
}

/// The final classification of one test.
/// 单个测试的最终分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Outcome {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    /// Failed, as declared by `XFAIL:`.
    #[serde(rename = "XFAIL")]
    ExpectedFail,
    /// Passed although `XFAIL:` declared it would fail.
    #[serde(rename = "XPASS")]
    UnexpectedPass,
    #[serde(rename = "UNSUPPORTED")]
    Unsupported,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "ERROR")]
    Error,
}

impl Outcome {
    /// Every outcome, in the order the summary lists them.
    pub const ALL: [Outcome; 7] = [
        Outcome::Pass,
        Outcome::Fail,
        Outcome::ExpectedFail,
        Outcome::UnexpectedPass,
        Outcome::Unsupported,
        Outcome::Timeout,
        Outcome::Error,
    ];

    /// Whether this outcome makes the run fail.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::Fail | Outcome::UnexpectedPass | Outcome::Timeout | Outcome::Error
        )
    }

    /// The stable label printed in front of each result line.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::ExpectedFail => "XFAIL",
            Outcome::UnexpectedPass => "XPASS",
            Outcome::Unsupported => "UNSUPPORTED",
            Outcome::Timeout => "TIMEOUT",
            Outcome::Error => "ERROR",
        }
    }

    /// Gets the localized description of the outcome for the summary.
    /// 获取结果的本地化描述以用于摘要。
    pub fn status_str(self, locale: &str) -> String {
        match self {
            Outcome::Pass => t!("outcome.pass", locale = locale),
            Outcome::Fail => t!("outcome.fail", locale = locale),
            Outcome::ExpectedFail => t!("outcome.xfail", locale = locale),
            Outcome::UnexpectedPass => t!("outcome.xpass", locale = locale),
            Outcome::Unsupported => t!("outcome.unsupported", locale = locale),
            Outcome::Timeout => t!("outcome.timeout", locale = locale),
            Outcome::Error => t!("outcome.error", locale = locale),
        }
        .to_string()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the run-lines of a test ended, before `XFAIL:` is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every run-line succeeded.
    Passed,
    /// Some run-line failed.
    Failed,
    /// The deadline expired.
    TimedOut,
}

/// Maps a run status and the expected-fail flag onto an outcome.
///
/// | status   | expected fail | outcome        |
/// |----------|---------------|----------------|
/// | passed   | no            | Pass           |
/// | passed   | yes           | UnexpectedPass |
/// | failed   | no            | Fail           |
/// | failed   | yes           | ExpectedFail   |
/// | timed out| either        | Timeout        |
pub fn decide(status: RunStatus, expected_fail: bool) -> Outcome {
    match (status, expected_fail) {
        (RunStatus::TimedOut, _) => Outcome::Timeout,
        (RunStatus::Passed, false) => Outcome::Pass,
        (RunStatus::Passed, true) => Outcome::UnexpectedPass,
        (RunStatus::Failed, false) => Outcome::Fail,
        (RunStatus::Failed, true) => Outcome::ExpectedFail,
    }
}

/// One command as it was executed, for the failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedCommand {
    /// The run-line after substitution.
    pub command: String,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
}

/// The result of executing one test.
/// 执行单个测试的结果。
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub index: usize,
    pub name: String,
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
    pub commands: Vec<ExecutedCommand>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Why the test did not pass, when there is something to say.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionResult {
    /// A result for a test that never reached a process.
    pub fn without_run(spec: &TestSpec, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            index: spec.index,
            name: spec.relative_path.clone(),
            outcome,
            stdout: String::new(),
            stderr: String::new(),
            commands: vec![],
            elapsed: Duration::ZERO,
            message: Some(message.into()),
        }
    }
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
