//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! Runs a single planned test from feature check to final outcome:
//! decides whether it is supported, substitutes its run-lines, runs them
//! sequentially under one wall-clock deadline and classifies the result.
//!
//! 从特性检查到最终结果运行单个计划测试：
//! 判断其是否受支持，替换其运行行，在一个截止时间内按顺序运行它们并对结果进行分类。

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::config::Config;
use crate::core::directives::prepare_run_line;
use crate::core::models::{
    ExecutedCommand, ExecutionResult, Outcome, RunStatus, TestSpec, decide,
};
use crate::core::substitution::TestPaths;
use crate::infra::{fs, t};

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandExit {
    /// The process exited on its own. `code` is `None` when it died by a signal.
    Exited { code: Option<i32>, signaled: bool },
    /// The deadline passed and the process tree was killed.
    TimedOut,
    /// The run was cancelled and the process tree was killed.
    Cancelled,
    /// The process could not be started.
    SpawnFailed(String),
}

impl CommandExit {
    /// A normal exit with `code`.
    pub fn code(code: i32) -> Self {
        CommandExit::Exited {
            code: Some(code),
            signaled: false,
        }
    }
}

/// Everything a [`CommandRunner`] reports about one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit: CommandExit,
    pub stdout: String,
    pub stderr: String,
}

/// What a runner needs besides the command itself.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub config: &'a Config,
    /// Wall-clock deadline shared by every run-line of the test.
    pub deadline: Option<tokio::time::Instant>,
    pub cancel: &'a CancellationToken,
}

/// Executes one substituted run-line.
///
/// The real implementation is [`crate::infra::command::ShellRunner`]; tests
/// substitute their own to count or script process launches.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, ctx: &RunContext<'_>) -> impl Future<Output = CommandOutput> + Send;
}

/// Where a test is in its lifecycle. Only used for trace logging.
/// 测试在其生命周期中的位置。仅用于跟踪日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Discovered,
    FeatureChecked,
    Unsupported,
    Substituted,
    Running,
    Completed,
    TimedOut,
    Error,
}

fn enter(spec: &TestSpec, state: TestState) {
    trace!(test = %spec.relative_path, ?state, "state transition");
}

/// The main entry point for running a single test.
///
/// Never fails: every problem is reported as the test's outcome.
///
/// # Arguments
/// * `spec` - The planned test
/// * `config` - The immutable run configuration
/// * `runner` - Executes substituted run-lines
/// * `cancel` - Fired when the whole run is being aborted
///
/// # Returns
/// Exactly one `ExecutionResult` for `spec`
pub async fn run_test<R: CommandRunner>(
    spec: &TestSpec,
    config: &Config,
    runner: &R,
    cancel: &CancellationToken,
) -> ExecutionResult {
    enter(spec, TestState::Discovered);

    if let Some(err) = &spec.directive_error {
        enter(spec, TestState::Error);
        return ExecutionResult::without_run(spec, Outcome::Error, err.to_string());
    }

    if let Some(reason) = unsupported_reason(spec, config) {
        enter(spec, TestState::Unsupported);
        return ExecutionResult::without_run(spec, Outcome::Unsupported, reason);
    }
    enter(spec, TestState::FeatureChecked);

    let expected_fail = spec
        .directives
        .is_expected_failure(&config.features, config.target_triple.as_deref());

    // Removed from disk when dropped at the end of this function.
    let temp_dir = match fs::create_test_temp_dir(&config.exec_root, &spec.relative_path) {
        Ok(dir) => dir,
        Err(e) => {
            enter(spec, TestState::Error);
            return ExecutionResult::without_run(spec, Outcome::Error, format!("{e:#}"));
        }
    };
    let paths = TestPaths::new(&spec.path, temp_dir.path());

    let commands = match substitute(spec, config, &paths) {
        Ok(commands) => commands,
        Err(message) => {
            enter(spec, TestState::Error);
            return ExecutionResult::without_run(spec, Outcome::Error, message);
        }
    };
    enter(spec, TestState::Substituted);

    let started = Instant::now();
    let deadline = spec
        .timeout
        .or(config.timeout)
        .map(|limit| tokio::time::Instant::now() + limit);
    let ctx = RunContext {
        config,
        deadline,
        cancel,
    };

    let mut result = ExecutionResult {
        index: spec.index,
        name: spec.relative_path.clone(),
        outcome: Outcome::Pass,
        stdout: String::new(),
        stderr: String::new(),
        commands: Vec::with_capacity(commands.len()),
        elapsed: Default::default(),
        message: None,
    };

    enter(spec, TestState::Running);
    let mut status = RunStatus::Passed;
    for (n, command) in commands.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return interrupted(spec, result, started);
        }

        let status_file = temp_dir.path().join(format!("wrapped-status-{n}"));
        let prepared = prepare_run_line(&command, &status_file);
        debug!(test = %spec.relative_path, %command, "running");
        let output = runner.run(&prepared.command, &ctx).await;
        result.stdout.push_str(&output.stdout);
        result.stderr.push_str(&output.stderr);

        match output.exit {
            CommandExit::Exited { code, signaled } => {
                result.commands.push(ExecutedCommand {
                    command: command.clone(),
                    exit_code: code,
                });
                if !prepared.judge(code, signaled) {
                    status = RunStatus::Failed;
                    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    result.message = Some(
                        t!("execution.command_failed", command = command, code = code).to_string(),
                    );
                    break;
                }
            }
            CommandExit::TimedOut => {
                result.commands.push(ExecutedCommand {
                    command,
                    exit_code: None,
                });
                status = RunStatus::TimedOut;
                let secs = spec.timeout.or(config.timeout).unwrap_or_default().as_secs();
                result.message = Some(t!("execution.timed_out", secs = secs).to_string());
                break;
            }
            CommandExit::Cancelled => return interrupted(spec, result, started),
            CommandExit::SpawnFailed(reason) => {
                enter(spec, TestState::Error);
                result.outcome = Outcome::Error;
                result.message = Some(
                    t!("execution.spawn_failed", command = command, reason = reason).to_string(),
                );
                result.elapsed = started.elapsed();
                return result;
            }
        }
    }

    enter(
        spec,
        if status == RunStatus::TimedOut {
            TestState::TimedOut
        } else {
            TestState::Completed
        },
    );
    result.outcome = decide(status, expected_fail);
    if result.outcome == Outcome::UnexpectedPass {
        result.message = Some(t!("execution.unexpected_pass").to_string());
    }
    result.elapsed = started.elapsed();
    result
}

/// Why the test must not run, or `None` if it may.
fn unsupported_reason(spec: &TestSpec, config: &Config) -> Option<String> {
    if spec.scope_unsupported {
        return Some(t!("execution.scope_unsupported").to_string());
    }
    let missing = spec.directives.missing_requirements(&config.features);
    if !missing.is_empty() {
        let features = missing.join(", ");
        return Some(t!("execution.missing_features", features = features).to_string());
    }
    let present = spec.directives.unsupported_matches(&config.features);
    if !present.is_empty() {
        let features = present.join(", ");
        return Some(t!("execution.unsupported_features", features = features).to_string());
    }
    None
}

fn substitute(spec: &TestSpec, config: &Config, paths: &TestPaths) -> Result<Vec<String>, String> {
    let table = config
        .substitutions
        .for_test(paths)
        .map_err(|e| e.to_string())?;
    spec.directives
        .run_lines
        .iter()
        .map(|run| {
            table.apply(&run.command).map_err(|e| {
                let reason = e.to_string();
                t!("execution.substitution_failed", line = run.line, reason = reason).to_string()
            })
        })
        .collect()
}

fn interrupted(spec: &TestSpec, mut result: ExecutionResult, started: Instant) -> ExecutionResult {
    enter(spec, TestState::Error);
    result.outcome = Outcome::Error;
    result.message = Some(t!("execution.interrupted").to_string());
    result.elapsed = started.elapsed();
    result
}
