//! # Feature Predicates / 特性谓词
//!
//! A feature is an opaque, case-sensitive token naming a capability of the
//! host or the build (`asserts`, `x86-registered-target`, `can-execute`, ...).
//! Tests gate themselves on features with `REQUIRES:` and `UNSUPPORTED:`.
//!
//! 特性是一个不透明的、区分大小写的标记，用于命名主机或构建的某种能力。
//! 测试通过 `REQUIRES:` 和 `UNSUPPORTED:` 根据特性决定是否运行。

use serde::Serialize;
use std::collections::BTreeSet;

/// The set of features available for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureSet {
    tokens: BTreeSet<String>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.tokens.insert(token.into())
    }

    /// Returns `true` if `token` is available. Unknown tokens are simply absent.
    pub fn has(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// AND semantics: every token must be available.
    /// AND 语义：每个标记都必须可用。
    pub fn require<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        tokens.iter().all(|t| self.has(t.as_ref()))
    }

    /// NOR semantics: none of the tokens may be available.
    /// NOR 语义：任何标记都不能可用。
    pub fn exclude<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        !tokens.iter().any(|t| self.has(t.as_ref()))
    }

    /// The required tokens that are not available, in declaration order.
    pub fn missing<'a, S: AsRef<str>>(&self, tokens: &'a [S]) -> Vec<&'a str> {
        tokens
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !self.has(t))
            .collect()
    }

    /// The tokens that are available, in declaration order.
    pub fn present<'a, S: AsRef<str>>(&self, tokens: &'a [S]) -> Vec<&'a str> {
        tokens
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| self.has(t))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for FeatureSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.tokens.extend(iter.into_iter().map(Into::into));
    }
}

/// Pluggable source of platform-dependent features, injected when the
/// configuration is built so the engine itself stays platform-agnostic.
///
/// 可插拔的平台相关特性来源，在构建配置时注入，使引擎本身保持与平台无关。
pub trait FeatureProbe: Send + Sync {
    /// Returns the features this probe detects.
    ///
    /// * `targets` - the code generation targets the build was configured with
    /// * `target_triple` - the default target triple, if any
    fn probe(&self, targets: &[String], target_triple: Option<&str>) -> Vec<String>;
}

/// Probes the host the runner executes on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl FeatureProbe for HostProbe {
    fn probe(&self, targets: &[String], target_triple: Option<&str>) -> Vec<String> {
        let mut features = vec![
            std::env::consts::OS.to_string(),
            std::env::consts::ARCH.to_string(),
        ];

        if !cfg!(windows) {
            features.push("can-execute".to_string());
            features.push("not_COFF".to_string());
            features.push("loadable_module".to_string());
        }

        features.extend(
            targets
                .iter()
                .map(|target| format!("{}-registered-target", target.to_lowercase())),
        );

        if target_triple.is_some_and(|triple| !triple.is_empty()) {
            features.push("default_triple".to_string());
        }

        features
    }
}

/// A probe returning a fixed list, for tests and hermetic runs.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    features: Vec<String>,
}

impl StaticProbe {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features.into_iter().map(Into::into).collect(),
        }
    }
}

impl FeatureProbe for StaticProbe {
    fn probe(&self, _targets: &[String], _target_triple: Option<&str>) -> Vec<String> {
        self.features.clone()
    }
}
