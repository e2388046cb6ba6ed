//! # Core Module / 核心模块
//!
//! This module contains the core functionality of the lit runner:
//! the immutable configuration, feature predicates, the substitution engine,
//! test discovery, directive parsing, planning, execution and aggregation.
//!
//! 此模块包含 lit runner 的核心功能：
//! 不可变配置、特性谓词、替换引擎、测试发现、指令解析、计划、执行和聚合。

pub mod aggregator;
pub mod config;
pub mod directives;
pub mod discovery;
pub mod error;
pub mod execution;
pub mod features;
pub mod models;
pub mod planner;
pub mod scheduler;
pub mod substitution;

// Re-exports
pub use aggregator::{Aggregator, RunSummary};
pub use config::{Config, ConfigBuilder};
pub use execution::run_test;
pub use models::{ExecutionResult, Outcome, TestSpec};
pub use scheduler::Scheduler;
