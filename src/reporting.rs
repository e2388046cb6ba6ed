//! # Reporting Module / 报告模块
//!
//! This module handles the display of results: one colored line per test as
//! results arrive, a final summary, failure details, and a JSON document with
//! the same data for machines.
//!
//! 此模块处理结果的显示：结果到达时每个测试一行彩色输出、最终摘要、
//! 失败详情，以及供机器读取的包含相同数据的 JSON 文档。

pub mod console;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_result_line, print_summary};
pub use json::{render_json, write_json_report};
