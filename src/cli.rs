//! # Command-Line Interface / 命令行接口
//!
//! Builds the clap command with localized help text and dispatches to
//! [`commands::run`].
//!
//! 使用本地化帮助文本构建 clap 命令并分派到 [`commands::run`]。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::config::DEFAULT_CONFIG_FILE;
use crate::infra::{logging, t};

/// Exit code for errors that stop the run before any test executes.
pub const FATAL_EXIT_CODE: u8 = 2;

/// Output format of the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Everything the run command needs from the command line.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: PathBuf,
    pub paths: Vec<PathBuf>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub verbose: u8,
    pub quiet: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    pub params: Vec<String>,
    pub lang: Option<String>,
}

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter().enumerate().find_map(|(pos, arg)| {
        if arg == "--lang" {
            args.get(pos + 1).cloned()
        } else {
            arg.strip_prefix("--lang=").map(str::to_string)
        }
    })
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("lit-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .arg(
            Arg::new("paths")
                .help(t!("cli.paths", locale = locale).to_string())
                .value_name("PATHS")
                .num_args(0..)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help(t!("cli.config", locale = locale).to_string())
                .value_name("CONFIG")
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .help(t!("cli.jobs", locale = locale).to_string())
                .value_name("JOBS")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help(t!("cli.timeout", locale = locale).to_string())
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help(t!("cli.verbose", locale = locale).to_string())
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help(t!("cli.quiet", locale = locale).to_string())
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .help(t!("cli.format", locale = locale).to_string())
                .value_name("FORMAT")
                .value_parser(["text", "json"])
                .default_value("text")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help(t!("cli.output", locale = locale).to_string())
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("param")
                .short('D')
                .long("param")
                .help(t!("cli.param", locale = locale).to_string())
                .value_name("FEATURE")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("total-runners")
                .long("total-runners")
                .help(t!("cli.total_runners", locale = locale).to_string())
                .value_name("TOTAL_RUNNERS")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set)
                .requires("runner-index"),
        )
        .arg(
            Arg::new("runner-index")
                .long("runner-index")
                .help(t!("cli.runner_index", locale = locale).to_string())
                .value_name("RUNNER_INDEX")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set)
                .requires("total-runners"),
        )
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .action(ArgAction::Set),
        )
}

/// Extracts [`RunArgs`] from parsed matches.
pub fn run_args(matches: &ArgMatches) -> RunArgs {
    let format = match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Text,
    };
    RunArgs {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        paths: matches
            .get_many::<PathBuf>("paths")
            .map(|paths| paths.cloned().collect())
            .unwrap_or_default(),
        jobs: matches.get_one::<usize>("jobs").copied(),
        timeout_secs: matches.get_one::<u64>("timeout").copied(),
        verbose: matches.get_count("verbose"),
        quiet: matches.get_flag("quiet"),
        format,
        output: matches.get_one::<PathBuf>("output").cloned(),
        total_runners: matches.get_one::<usize>("total-runners").copied(),
        runner_index: matches.get_one::<usize>("runner-index").copied(),
        params: matches
            .get_many::<String>("param")
            .map(|params| params.cloned().collect())
            .unwrap_or_default(),
        lang: matches.get_one::<String>("lang").cloned(),
    }
}

/// Parses the command line and runs the suite.
///
/// # Returns
/// The process exit code: 0 when every test passed, 1 otherwise.
pub async fn run() -> Result<u8> {
    // Pre-parse language and initialize i18n first.
    match pre_parse_language() {
        Some(language) => rust_i18n::set_locale(crate::resolve_locale(&language)),
        None => crate::init(),
    }
    let locale = rust_i18n::locale().to_string();

    let matches = build_cli(&locale).get_matches();
    let args = run_args(&matches);
    logging::init_logging(args.verbose);

    commands::run::execute(args).await
}
