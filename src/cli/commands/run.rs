//! # Run Command Module / 运行命令模块
//!
//! This module implements the run command: it loads the configuration,
//! plans the tests, executes them on the worker pool and reports the result.
//!
//! 此模块实现了运行命令：加载配置、计划测试、在工作池上执行它们并报告结果。

use anyhow::{Context, Result};
use colored::*;
use std::{fs, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cli::{OutputFormat, RunArgs},
    core::{config::ConfigBuilder, planner, scheduler::Scheduler},
    infra::{command::ShellRunner, t},
    reporting::{
        console::{print_failure_details, print_result_line, print_summary},
        json::{render_json, write_json_report},
    },
};

/// Executes the run command with the provided arguments.
///
/// # Returns
/// The exit code of the run: 0 if nothing failed, 1 otherwise. Errors are
/// reserved for problems that prevent the run from starting.
pub async fn execute(args: RunArgs) -> Result<u8> {
    let builder = ConfigBuilder::from_path(&args.config).with_context(|| {
        t!("run.config_load_failed", path = args.config.display()).to_string()
    })?;

    let locale = match &args.lang {
        Some(lang) => crate::resolve_locale(lang).to_string(),
        None => crate::resolve_locale(builder.language()).to_string(),
    };
    rust_i18n::set_locale(&locale);

    let config = builder
        .with_features(args.params.iter().cloned())
        .with_timeout(args.timeout_secs.map(Duration::from_secs))
        .build()
        .with_context(|| t!("run.config_invalid", locale = &locale).to_string())?;

    fs::create_dir_all(&config.exec_root).with_context(|| {
        t!(
            "run.exec_root_failed",
            locale = &locale,
            path = config.exec_root.display()
        )
        .to_string()
    })?;

    let text = args.format == OutputFormat::Text;
    if text && !args.quiet {
        println!(
            "{}",
            t!(
                "run.loading_suite",
                locale = &locale,
                name = config.name.as_str().yellow(),
                path = config.source_root.display()
            )
        );
    }

    let plan = planner::plan_execution(
        &config,
        &args.paths,
        args.total_runners,
        args.runner_index,
    )?;
    info!(
        discovered = plan.discovered_count,
        planned = plan.tests.len(),
        "planned run"
    );

    if text && !args.quiet {
        if let (true, Some(total), Some(index)) =
            (plan.is_distributed, args.total_runners, args.runner_index)
        {
            println!(
                "{}",
                t!(
                    "run.split_runner",
                    locale = &locale,
                    index = index + 1,
                    total = total,
                    count = plan.tests.len(),
                    discovered = plan.discovered_count
                )
                .bold()
            );
        } else {
            println!(
                "{}",
                t!("run.single_runner", locale = &locale, count = plan.tests.len()).bold()
            );
        }
        if plan.tests.is_empty() {
            println!("{}", t!("run.no_tests", locale = &locale).yellow());
        }
    }

    let jobs = args.jobs.unwrap_or_else(num_cpus::get);
    let suite_name = config.name.clone();
    let cancel = setup_signal_handler(&locale);
    let scheduler = Scheduler::new(Arc::new(config), Arc::new(ShellRunner), jobs)
        .with_cancellation(cancel);

    let quiet = args.quiet;
    let summary = scheduler
        .run(plan.tests, |result| {
            if text && (!quiet || result.outcome.is_failure()) {
                print_result_line(result);
            }
        })
        .await;

    match args.format {
        OutputFormat::Text => {
            print_failure_details(&summary, &locale);
            print_summary(&summary, &locale);
        }
        OutputFormat::Json => println!("{}", render_json(&suite_name, &summary)?),
    }

    if let Some(path) = &args.output {
        write_json_report(&suite_name, &summary, path)?;
        if text && !args.quiet {
            println!(
                "{}",
                t!("run.report_written", locale = &locale, path = path.display())
            );
        }
    }

    Ok(summary.exit_code())
}

/// Sets up a signal handler that cancels the run on Ctrl-C.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
                token_clone.cancel();
            }
            Err(e) => warn!("failed to listen for Ctrl-C: {e}"),
        }
    });

    token
}
