//! # Lit Runner Library / Lit Runner 库
//!
//! This library provides the core functionality for the lit runner tool,
//! a configuration-driven engine that discovers declarative shell test scripts,
//! rewrites their `RUN:` lines through a substitution table and executes them
//! in parallel against freshly built tools.
//!
//! 此库为 lit runner 工具提供核心功能，
//! 这是一个配置驱动的引擎，用于发现声明式 shell 测试脚本，
//! 通过替换表改写其 `RUN:` 行，并针对新构建的工具并行执行它们。
//!
//! ## Modules / 模块
//!
//! - `core` - Configuration, discovery, directive parsing, substitution and execution
//! - `infra` - Infrastructure services like process spawning, temp dirs and logging
//! - `reporting` - Console and JSON result reporting
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 配置、发现、指令解析、替换和执行
//! - `infra` - 基础设施服务，如进程派生、临时目录和日志
//! - `reporting` - 控制台和 JSON 结果报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    rust_i18n::set_locale(resolve_locale(&locale));
}

/// Maps a requested locale onto one of the bundled translations.
pub fn resolve_locale(locale: &str) -> &str {
    let available_locales = rust_i18n::available_locales!();

    // Try to match the full locale first (e.g., "zh-CN")
    // Then try to match the language part only (e.g., "en" from "en-US")
    // Finally, fall back to "en"
    if available_locales.contains(&locale) {
        locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    }
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
