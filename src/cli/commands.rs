//! # Commands / 命令
//!
//! Implementations of the CLI commands.

pub mod run;
