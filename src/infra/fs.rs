//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations,
//! such as per-test temporary directories, path expansion and shell quoting.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如每个测试的临时目录、路径展开和 shell 引用。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::core::error::ConfigError;

/// Creates a unique temporary directory for one test inside the execution root.
/// The directory is removed when the returned `TempDir` is dropped.
///
/// # Arguments
/// * `exec_root` - The execution root of the run
/// * `test_name` - Name of the test, used to make the directory easy to identify
pub fn create_test_temp_dir(exec_root: &Path, test_name: &str) -> Result<TempDir> {
    let sanitized_name = test_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();

    fs::create_dir_all(exec_root).with_context(|| {
        format!(
            "Failed to create execution root: {}",
            exec_root.display()
        )
    })?;

    tempfile::Builder::new()
        .prefix(&format!("lit_{sanitized_name}_"))
        .tempdir_in(exec_root)
        .with_context(|| format!("Failed to create temporary directory for {test_name}"))
}

/// Expands `~` and `$VAR` in a configured path and anchors relative results at `base`.
/// 展开配置路径中的 `~` 和 `$VAR`，并将相对结果锚定在 `base`。
pub fn expand_path(raw: &str, base: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = shellexpand::full(raw).map_err(|e| ConfigError::Expand {
        path: raw.to_string(),
        message: e.to_string(),
    })?;
    let path = PathBuf::from(expanded.as_ref());
    Ok(if path.is_absolute() {
        path
    } else {
        base.join(path)
    })
}

/// Renders a path for use inside a shell command line, quoting it only when needed.
pub fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    match shlex::try_quote(&raw) {
        Ok(quoted) => quoted.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

/// Formats a path relative to the source root with `/` separators,
/// so test names are identical on every platform.
pub fn display_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
