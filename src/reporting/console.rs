//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints results to the console with color coding and
//! internationalization support.
//!
//! 此模块在控制台打印结果，支持颜色编码和国际化。

use colored::*;

use crate::core::aggregator::RunSummary;
use crate::core::models::{ExecutionResult, Outcome};
use crate::infra::t;

/// Formats the line printed for one result, without color.
///
/// ```text
/// PASS: basic/echo.test (0.12s)
/// UNSUPPORTED: arm/only-arm.test (0.00s)
/// ```
pub fn format_result_line(result: &ExecutionResult) -> String {
    format!(
        "{}: {} ({:.2}s)",
        result.outcome.label(),
        result.name,
        result.elapsed.as_secs_f64()
    )
}

fn colorize(outcome: Outcome, text: &str) -> ColoredString {
    match outcome {
        Outcome::Pass => text.green(),
        Outcome::ExpectedFail => text.yellow(),
        Outcome::Unsupported => text.dimmed(),
        Outcome::Fail | Outcome::UnexpectedPass | Outcome::Timeout | Outcome::Error => {
            text.red().bold()
        }
    }
}

/// Prints the line for one result as it arrives.
/// 在结果到达时打印其对应的行。
pub fn print_result_line(result: &ExecutionResult) {
    let label = colorize(result.outcome, result.outcome.label());
    println!(
        "{}: {} ({:.2}s)",
        label,
        result.name,
        result.elapsed.as_secs_f64()
    );
}

/// Formats the one-line tally printed at the end of a run. Outcomes that
/// never occurred are left out.
///
/// 格式化运行结束时打印的单行统计。未出现的结果类别会被省略。
pub fn format_summary_line(summary: &RunSummary, locale: &str) -> String {
    let mut parts: Vec<String> = Outcome::ALL
        .iter()
        .filter(|outcome| summary.count(**outcome) > 0)
        .map(|outcome| format!("{}: {}", outcome.status_str(locale), summary.count(*outcome)))
        .collect();
    if summary.not_run > 0 {
        parts.push(t!("summary.not_run", locale = locale, count = summary.not_run).to_string());
    }
    let secs = format!("{:.2}", summary.elapsed.as_secs_f64());
    let counts = parts.join(", ");
    t!(
        "summary.line",
        locale = locale,
        total = summary.total(),
        secs = secs,
        counts = counts
    )
    .to_string()
}

/// Prints the final summary of a run.
///
/// # Output Format / 输出格式
/// ```text
/// --- Test Summary ---
///   Passed: 12, Failed: 1, Unsupported: 3
/// Testing Time: 1.52s, 16 tests
/// ```
pub fn print_summary(summary: &RunSummary, locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());
    let line = format_summary_line(summary, locale);
    if summary.exit_code() == 0 {
        println!("{}", line.green());
    } else {
        println!("{}", line.red());
    }
    if summary.interrupted {
        println!("{}", t!("summary.interrupted", locale = locale).yellow().bold());
    }
}

/// Prints the command log and captured output of every failing test.
///
/// 打印每个失败测试的命令日志和捕获的输出。
pub fn print_failure_details(summary: &RunSummary, locale: &str) {
    let failures: Vec<_> = summary.failures().collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("failure.banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            colorize(result.outcome, result.outcome.label()),
            result.name.cyan()
        );
        if let Some(message) = &result.message {
            println!("  {message}");
        }
        for command in &result.commands {
            let code = command
                .exit_code
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            println!("  {} {} [{}]", "$".blue(), command.command, code);
        }
        if !result.stdout.trim().is_empty() {
            println!(
                "\n--- {} ---\n{}",
                t!("failure.stdout", locale = locale).yellow(),
                result.stdout.trim_end()
            );
        }
        if !result.stderr.trim().is_empty() {
            println!(
                "\n--- {} ---\n{}",
                t!("failure.stderr", locale = locale).yellow(),
                result.stderr.trim_end()
            );
        }
        println!("\n{}", "-".repeat(80));
    }
}
