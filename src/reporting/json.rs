//! # JSON Reporting Module / JSON 报告模块
//!
//! Renders a [`RunSummary`] as a JSON document:
//!
//! ```json
//! {
//!   "suite": "LLVM",
//!   "generated_at": "2024-05-01T12:00:00+00:00",
//!   "exit_code": 1,
//!   "interrupted": false,
//!   "not_run": 0,
//!   "elapsed": 1.52,
//!   "counts": { "PASS": 12, "FAIL": 1 },
//!   "results": [ { "index": 0, "name": "basic/echo.test", "outcome": "PASS", ... } ]
//! }
//! ```
//!
//! 将 [`RunSummary`] 渲染为 JSON 文档。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::aggregator::RunSummary;

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    suite: &'a str,
    generated_at: DateTime<Local>,
    exit_code: u8,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

/// Renders the summary of suite `suite` as pretty-printed JSON.
pub fn render_json(suite: &str, summary: &RunSummary) -> Result<String> {
    let report = JsonReport {
        suite,
        generated_at: Local::now(),
        exit_code: summary.exit_code(),
        summary,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize the run summary")
}

/// Writes the JSON report to `output_path`, creating parent directories as needed.
///
/// # Errors
/// Fails if the report cannot be serialized or the file cannot be written.
pub fn write_json_report(suite: &str, summary: &RunSummary, output_path: &Path) -> Result<()> {
    let json = render_json(suite, summary)?;
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))
}
