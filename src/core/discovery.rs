//! # Test Discovery Module / 测试发现模块
//!
//! Walks the source root and yields candidate test files in lexicographic
//! path order, so an unchanged tree always produces the same sequence no
//! matter how the file system orders directory entries.
//!
//! 遍历源根目录并按字典序路径顺序产出候选测试文件，
//! 因此无论文件系统如何排列目录条目，未更改的目录树总是产生相同的序列。
//!
//! A directory may contain a `lit.local.toml` that narrows the rules for its
//! own subtree only:
//!
//! ```toml
//! suffixes = [".test"]     # replaces the inherited suffix set
//! excludes = ["Inputs"]    # added to the inherited exclude set
//! unsupported = true       # every test below is reported as unsupported
//! timeout_secs = 120       # per-test timeout for this subtree
//! ```

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use walkdir::WalkDir;

use crate::core::config::{Config, normalize_suffix};
use crate::core::error::ConfigError;

/// Name of the per-directory override file.
pub const LOCAL_CONFIG_FILE: &str = "lit.local.toml";

/// The contents of a `lit.local.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    #[serde(default)]
    pub suffixes: Option<Vec<String>>,
    #[serde(default)]
    pub excludes: Option<Vec<String>>,
    #[serde(default)]
    pub unsupported: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl LocalConfig {
    /// Reads the override file of `dir`, if there is one.
    pub fn load(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(LOCAL_CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path, source })
    }
}

/// The discovery rules in force for one directory.
/// 对一个目录生效的发现规则。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub suffixes: BTreeSet<String>,
    pub excludes: BTreeSet<String>,
    pub unsupported: bool,
    pub timeout: Option<Duration>,
}

impl Scope {
    /// The rules of the source root, before any override.
    pub fn root(config: &Config) -> Self {
        Self {
            suffixes: config.suffixes.clone(),
            excludes: config.excludes.clone(),
            unsupported: false,
            timeout: None,
        }
    }

    /// The rules for a subdirectory with override `local`.
    pub fn child(&self, local: &LocalConfig) -> Self {
        let mut scope = self.clone();
        if let Some(suffixes) = &local.suffixes {
            scope.suffixes = suffixes.iter().map(|s| normalize_suffix(s)).collect();
        }
        if let Some(excludes) = &local.excludes {
            scope.excludes.extend(excludes.iter().cloned());
        }
        if let Some(unsupported) = local.unsupported {
            scope.unsupported = unsupported;
        }
        if let Some(secs) = local.timeout_secs {
            scope.timeout = Some(Duration::from_secs(secs));
        }
        scope
    }

    /// Whether a directory entry with this name is skipped entirely.
    pub fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || self.excludes.contains(name)
    }

    /// Whether a file with this name is a candidate test.
    pub fn accepts_file(&self, name: &str) -> bool {
        if self.is_excluded(name) || name == LOCAL_CONFIG_FILE {
            return false;
        }
        Path::new(name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .is_some_and(|suffix| self.suffixes.contains(&suffix))
    }
}

/// A test file found by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTest {
    /// Path relative to the source root.
    pub relative_path: PathBuf,
    /// Absolute path.
    pub path: PathBuf,
    /// The rules of the directory holding the file.
    pub scope: Arc<Scope>,
}

/// Computes the scope of `dir` by applying every override between the
/// source root and `dir` (inclusive).
pub fn scope_for_dir(config: &Config, dir: &Path) -> Result<Arc<Scope>, ConfigError> {
    let relative = dir
        .strip_prefix(&config.source_root)
        .map_err(|_| ConfigError::OutsideSourceRoot(dir.to_path_buf()))?;

    let mut current = config.source_root.clone();
    let mut scope = Scope::root(config);
    if let Some(local) = LocalConfig::load(&current)? {
        scope = scope.child(&local);
    }
    for component in relative.components() {
        current.push(component);
        if let Some(local) = LocalConfig::load(&current)? {
            scope = scope.child(&local);
        }
    }
    Ok(Arc::new(scope))
}

/// A restartable description of what to discover.
/// 可重新启动的发现描述。
#[derive(Debug, Clone)]
pub struct Discovery<'a> {
    config: &'a Config,
    roots: Vec<PathBuf>,
}

impl<'a> Discovery<'a> {
    /// Discovers the whole source root.
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            roots: vec![config.source_root.clone()],
        }
    }

    /// Discovers only the given files and directories. Relative paths are
    /// resolved against the current directory; every path must exist and lie
    /// inside the source root. An empty list discovers the whole source root.
    pub fn with_paths(config: &'a Config, paths: &[PathBuf]) -> Result<Self, ConfigError> {
        if paths.is_empty() {
            return Ok(Self::new(config));
        }
        let mut roots = Vec::with_capacity(paths.len());
        for path in paths {
            let absolute = path
                .canonicalize()
                .map_err(|_| ConfigError::MissingTestPath(path.clone()))?;
            if !absolute.starts_with(&config.source_root) {
                return Err(ConfigError::OutsideSourceRoot(absolute));
            }
            roots.push(absolute);
        }
        roots.sort();
        roots.dedup();
        Ok(Self { config, roots })
    }

    /// Starts a fresh lazy walk. May be called any number of times.
    pub fn iter(&self) -> DiscoveryIter<'a> {
        DiscoveryIter {
            config: self.config,
            pending: self.roots.clone().into_iter(),
            walk: None,
        }
    }
}

impl<'a> IntoIterator for &Discovery<'a> {
    type Item = Result<DiscoveredTest, ConfigError>;
    type IntoIter = DiscoveryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Walk {
    entries: walkdir::IntoIter,
    /// `scopes[d]` holds the scope of the directory currently open at depth `d`.
    scopes: Vec<Arc<Scope>>,
}

/// Lazy iterator over discovered tests.
pub struct DiscoveryIter<'a> {
    config: &'a Config,
    pending: std::vec::IntoIter<PathBuf>,
    walk: Option<Walk>,
}

impl DiscoveryIter<'_> {
    fn discovered(&self, path: &Path, scope: Arc<Scope>) -> Result<DiscoveredTest, ConfigError> {
        let relative_path = path
            .strip_prefix(&self.config.source_root)
            .map_err(|_| ConfigError::OutsideSourceRoot(path.to_path_buf()))?
            .to_path_buf();
        Ok(DiscoveredTest {
            relative_path,
            path: path.to_path_buf(),
            scope,
        })
    }

    /// Opens the next explicit root. Returns a test directly when the root is a file.
    fn open_root(&mut self, root: PathBuf) -> Option<Result<DiscoveredTest, ConfigError>> {
        if root.is_file() {
            // A file named explicitly runs even if its suffix is not configured.
            let parent = root
                .parent()
                .unwrap_or(self.config.source_root.as_path())
                .to_path_buf();
            return Some(
                scope_for_dir(self.config, &parent).and_then(|scope| self.discovered(&root, scope)),
            );
        }

        let scope = match scope_for_dir(self.config, &root) {
            Ok(scope) => scope,
            Err(e) => return Some(Err(e)),
        };
        let mut entries = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        // Depth 0 is the root itself; its scope is already known.
        let _ = entries.next();
        self.walk = Some(Walk {
            entries,
            scopes: vec![scope],
        });
        None
    }

    fn next_in_walk(&mut self) -> Option<Result<DiscoveredTest, ConfigError>> {
        loop {
            let walk = self.walk.as_mut()?;
            let entry = match walk.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    return Some(Err(ConfigError::Walk {
                        path,
                        message: e.to_string(),
                    }));
                }
            };

            let depth = entry.depth();
            walk.scopes.truncate(depth);
            let Some(parent) = walk.scopes.last().cloned() else {
                continue;
            };
            let name = entry.file_name().to_string_lossy();

            if entry.file_type().is_dir() {
                if parent.is_excluded(&name) {
                    trace!(path = %entry.path().display(), "skipping excluded directory");
                    walk.entries.skip_current_dir();
                    continue;
                }
                match LocalConfig::load(entry.path()) {
                    Ok(Some(local)) => walk.scopes.push(Arc::new(parent.child(&local))),
                    Ok(None) => walk.scopes.push(parent),
                    Err(e) => return Some(Err(e)),
                }
                continue;
            }

            if parent.accepts_file(&name) {
                let path = entry.into_path();
                return Some(self.discovered(&path, parent));
            }
        }
    }
}

impl Iterator for DiscoveryIter<'_> {
    type Item = Result<DiscoveredTest, ConfigError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.walk.is_some() {
                match self.next_in_walk() {
                    Some(item) => return Some(item),
                    None => self.walk = None,
                }
            }
            let root = self.pending.next()?;
            if let Some(item) = self.open_root(root) {
                return Some(item);
            }
        }
    }
}
