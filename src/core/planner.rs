//! # Test Execution Planner Module / 测试执行计划模块
//!
//! Turns the discovered files into the ordered list of [`TestSpec`]s to run:
//! reads each file, parses its directives and optionally keeps only this
//! runner's share of the suite when it is split across CI machines.
//!
//! 将发现的文件转换为要运行的有序 [`TestSpec`] 列表：
//! 读取每个文件，解析其指令，并在测试套件被拆分到多台 CI 机器时只保留本运行器的部分。

use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::debug;

use crate::core::config::Config;
use crate::core::directives::{Directives, parse_directives};
use crate::core::discovery::{DiscoveredTest, Discovery};
use crate::core::error::DirectiveError;
use crate::core::models::TestSpec;
use crate::infra::fs::display_relative;

/// Represents a complete execution plan for a run.
/// 表示一次运行的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The tests to execute, in discovery order.
    /// 要执行的测试，按发现顺序排列。
    pub tests: Vec<TestSpec>,
    /// Number of tests discovered before sharding.
    /// 分片前发现的测试数量。
    pub discovered_count: usize,
    /// Whether the tests are distributed across multiple runners (CI environment).
    /// 测试是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Builds the `TestSpec` for one discovered file. Unreadable files and bad
/// directives are recorded on the spec and surface as its `Error` outcome.
pub fn build_spec(index: usize, test: &DiscoveredTest) -> TestSpec {
    let (source, read_error) = match std::fs::read(&test.path) {
        Ok(bytes) => (String::from_utf8_lossy(&bytes).into_owned(), None),
        Err(e) => (String::new(), Some(DirectiveError::Unreadable(e.to_string()))),
    };
    let (directives, directive_error) = match read_error {
        Some(e) => (Directives::default(), Some(e)),
        None => match parse_directives(&source) {
            Ok(directives) => (directives, None),
            Err(e) => (Directives::default(), Some(e)),
        },
    };

    TestSpec {
        index,
        relative_path: display_relative(&test.relative_path),
        path: test.path.clone(),
        source,
        directives,
        directive_error,
        timeout: test.scope.timeout,
        scope_unsupported: test.scope.unsupported,
    }
}

/// Creates an execution plan for the given configuration.
///
/// # Arguments
/// * `config` - The run configuration
/// * `paths` - Files or directories to restrict discovery to; empty means the whole source root
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
///
/// # Returns
/// An `ExecutionPlan` whose tests are numbered in discovery order
pub fn plan_execution(
    config: &Config,
    paths: &[PathBuf],
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan> {
    let discovery = Discovery::with_paths(config, paths)?;
    let mut discovered = discovery.iter().collect::<Result<Vec<_>, _>>()?;
    // Overlapping explicit paths may name the same file twice.
    discovered.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    discovered.dedup_by(|a, b| a.path == b.path);
    let discovered_count = discovered.len();
    debug!(count = discovered_count, "discovered tests");

    let (selected, is_distributed) =
        if let (Some(total), Some(index)) = (total_runners, runner_index) {
            if total == 0 || index >= total {
                bail!("Runner index must be less than total runners.");
            }
            let selected: Vec<_> = discovered
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, test)| test)
                .collect();
            (selected, true)
        } else {
            if total_runners.is_some() || runner_index.is_some() {
                bail!("Both --total-runners and --runner-index must be provided.");
            }
            (discovered, false)
        };

    let tests = selected
        .iter()
        .enumerate()
        .map(|(index, test)| build_spec(index, test))
        .collect();

    Ok(ExecutionPlan {
        tests,
        discovered_count,
        is_distributed,
    })
}
