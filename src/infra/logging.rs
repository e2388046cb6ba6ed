//! # Logging / 日志
//!
//! Diagnostic logging goes through `tracing`; user-facing progress lines are
//! printed by the reporting module. `RUST_LOG` always wins over `-v`.
//!
//! 诊断日志通过 `tracing` 输出；面向用户的进度行由报告模块打印。

use tracing_subscriber::EnvFilter;

/// Maps the number of `-v` flags to a default filter directive.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
