//! # Substitution Engine / 替换引擎
//!
//! Rewrites the tokens of a raw `RUN:` line using an ordered table of
//! replacements. Entries are applied in table order, each one scanning the
//! output of the entries before it, and every non-overlapping occurrence of an
//! entry's pattern is replaced.
//!
//! 使用有序替换表改写原始 `RUN:` 行中的标记。条目按表顺序应用，
//! 每个条目扫描之前条目的输出，并替换该条目模式的每个不重叠出现。
//!
//! ## Match modes / 匹配模式
//!
//! - `Literal` matches text with identifier boundaries: a token that starts
//!   (ends) with an identifier character only matches when the character
//!   before (after) it is not one. Identifier characters are ASCII
//!   alphanumerics and `_`; so `llc` matches in `llc -O2` and `/bin/llc` but
//!   not in `llc_dwarf` or `xllc`.
//! - `Regex` matches a regular expression and rejects candidates preceded by a
//!   character of `pre_exclude` or followed by one of `post_exclude`.
//! - `Verbatim` matches a regular expression exactly as written, including
//!   shell syntax such as `\| \bnot\b`.

use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::core::error::{ConfigError, SubstitutionError};
use crate::infra::fs::quote_path;

/// Placeholder protecting `%%` while the table runs.
const PERCENT_MARKER: &str = "#_MARKER_#";

/// How an entry finds its occurrences in a command line.
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Regex {
        regex: Regex,
        pre_exclude: Vec<char>,
        post_exclude: Vec<char>,
    },
    Verbatim(Regex),
}

/// What an occurrence is replaced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Text(String),
    /// A tool resolved against the tools directory. `path` is `None` when the
    /// tool could not be found; using it is then a `MissingTool` error.
    Tool { name: String, path: Option<PathBuf> },
}

/// One ordered rewrite rule.
#[derive(Debug, Clone)]
pub struct Substitution {
    matcher: Matcher,
    replacement: Replacement,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl Substitution {
    /// A plain token with identifier-boundary semantics.
    pub fn literal(
        token: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        Ok(Self {
            matcher: Matcher::Literal(token),
            replacement: Replacement::Text(replacement.into()),
        })
    }

    /// A regex with junk-character exclusion on either side.
    pub fn regex(
        pattern: &str,
        replacement: impl Into<String>,
        pre_exclude: &str,
        post_exclude: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            matcher: Matcher::Regex {
                regex: compile(pattern)?,
                pre_exclude: pre_exclude.chars().collect(),
                post_exclude: post_exclude.chars().collect(),
            },
            replacement: Replacement::Text(replacement.into()),
        })
    }

    /// A regex matched exactly as written.
    pub fn verbatim(pattern: &str, replacement: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            matcher: Matcher::Verbatim(compile(pattern)?),
            replacement: Replacement::Text(replacement.into()),
        })
    }

    /// Builds the substitution for a tool.
    ///
    /// Without exclusions the tool name matches with the same identifier
    /// boundaries as a `Literal` token, but never directly after a `/`, so a
    /// resolved path is not rewritten again. With `pre` or
    /// `post` junk characters it becomes a word-bounded `Regex`. A `verbatim`
    /// pattern is used as-is and only the tool name inside the matched span is
    /// replaced.
    pub fn tool(
        name: &str,
        path: Option<PathBuf>,
        pre: &str,
        post: &str,
        verbatim: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        let matcher = match verbatim {
            Some(pattern) => Matcher::Verbatim(compile(pattern)?),
            None if pre.is_empty() && post.is_empty() => Matcher::Regex {
                regex: compile(&bounded_literal(name))?,
                pre_exclude: vec!['/'],
                post_exclude: Vec::new(),
            },
            None => Matcher::Regex {
                regex: compile(&format!(r"\b{}\b", regex::escape(name)))?,
                pre_exclude: pre.chars().collect(),
                post_exclude: post.chars().collect(),
            },
        };
        Ok(Self {
            matcher,
            replacement: Replacement::Tool {
                name: name.to_string(),
                path,
            },
        })
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn replacement(&self) -> &Replacement {
        &self.replacement
    }

    /// Finds the non-overlapping occurrences of this entry, left to right.
    pub fn find_matches(&self, text: &str) -> Vec<Range<usize>> {
        match &self.matcher {
            Matcher::Literal(token) => literal_matches(text, token),
            Matcher::Regex {
                regex,
                pre_exclude,
                post_exclude,
            } => regex_matches(text, regex, pre_exclude, post_exclude),
            Matcher::Verbatim(regex) => regex_matches(text, regex, &[], &[]),
        }
    }

    /// Applies this entry to `text`.
    pub fn apply(&self, text: &str) -> Result<String, SubstitutionError> {
        let matches = self.find_matches(text);
        if matches.is_empty() {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for range in matches {
            out.push_str(&text[last..range.start]);
            out.push_str(&self.render(&text[range.clone()])?);
            last = range.end;
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn render(&self, matched: &str) -> Result<String, SubstitutionError> {
        match &self.replacement {
            Replacement::Text(text) => Ok(text.clone()),
            Replacement::Tool { name, path } => {
                let path = path
                    .as_deref()
                    .ok_or_else(|| SubstitutionError::MissingTool(name.clone()))?;
                let resolved = quote_path(path);
                match &self.matcher {
                    // Keep the surrounding syntax (`| not` -> `| /bin/not`).
                    Matcher::Verbatim(_) => match literal_matches(matched, name).first() {
                        Some(range) => Ok(format!(
                            "{}{}{}",
                            &matched[..range.start],
                            resolved,
                            &matched[range.end..]
                        )),
                        None => Ok(resolved),
                    },
                    _ => Ok(resolved),
                }
            }
        }
    }
}

/// A regex equivalent to `Literal(token)` matching.
fn bounded_literal(token: &str) -> String {
    let mut pattern = regex::escape(token);
    if token.starts_with(is_ident_char) {
        pattern.insert_str(0, r"(?-u:\b)");
    }
    if token.ends_with(is_ident_char) {
        pattern.push_str(r"(?-u:\b)");
    }
    pattern
}

fn literal_matches(text: &str, token: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let (Some(first), Some(last)) = (token.chars().next(), token.chars().next_back()) else {
        return out;
    };
    let check_before = is_ident_char(first);
    let check_after = is_ident_char(last);

    let mut start = 0;
    while let Some(pos) = text[start..].find(token) {
        let begin = start + pos;
        let end = begin + token.len();
        let before_ok = !check_before || !text[..begin].chars().next_back().is_some_and(is_ident_char);
        let after_ok = !check_after || !text[end..].chars().next().is_some_and(is_ident_char);
        if before_ok && after_ok {
            out.push(begin..end);
            start = end;
        } else {
            start = begin + first.len_utf8();
        }
    }
    out
}

fn regex_matches(
    text: &str,
    regex: &Regex,
    pre_exclude: &[char],
    post_exclude: &[char],
) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    while start <= text.len() {
        let Some(m) = regex.find_at(text, start) else {
            break;
        };
        let before_junk = text[..m.start()]
            .chars()
            .next_back()
            .is_some_and(|c| pre_exclude.contains(&c));
        let after_junk = text[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| post_exclude.contains(&c));

        if !before_junk && !after_junk && !m.as_str().is_empty() {
            out.push(m.range());
            start = m.end();
        } else {
            // Retry one character further so overlapping candidates are still seen.
            match text[m.start()..].chars().next() {
                Some(c) => start = m.start() + c.len_utf8(),
                None => break,
            }
        }
    }
    out
}

/// Paths that the built-in per-test substitutions expand to.
/// 内置的每个测试替换所展开的路径。
#[derive(Debug, Clone)]
pub struct TestPaths {
    /// `%s`: the test file.
    pub source: PathBuf,
    /// `%S` and `%p`: the directory holding the test file.
    pub source_dir: PathBuf,
    /// `%t`: a unique per-test temporary path.
    pub temp_base: PathBuf,
    /// `%T`: the directory holding `%t`.
    pub temp_dir: PathBuf,
}

impl TestPaths {
    pub fn new(source: &Path, temp_dir: &Path) -> Self {
        let source_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "test".to_string());
        Self {
            source: source.to_path_buf(),
            source_dir,
            temp_base: temp_dir.join(format!("{file_name}.tmp")),
            temp_dir: temp_dir.to_path_buf(),
        }
    }
}

/// The ordered substitution table of a run.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionTable {
    entries: Vec<Substitution>,
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Substitution) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Substitution> {
        self.entries.iter()
    }

    /// Applies every entry in order to `line`.
    pub fn apply(&self, line: &str) -> Result<String, SubstitutionError> {
        self.entries
            .iter()
            .try_fold(line.to_string(), |text, entry| entry.apply(&text))
    }

    /// Wraps this table with the built-in per-test substitutions:
    /// `%%` is protected first, then this table runs, then `%s`, `%S`, `%p`,
    /// `%t`, `%T`, `%{pathsep}` and `%{fs-sep}` expand, and `%%` finally
    /// becomes a literal `%`.
    ///
    /// 用内置的每个测试替换包装此表。
    pub fn for_test(&self, paths: &TestPaths) -> Result<SubstitutionTable, ConfigError> {
        let pathsep = if cfg!(windows) { ";" } else { ":" };
        let fs_sep = std::path::MAIN_SEPARATOR.to_string();

        let mut table = SubstitutionTable::new();
        table.push(Substitution::verbatim("%%", PERCENT_MARKER)?);
        table.entries.extend(self.entries.iter().cloned());

        let builtins = [
            ("%{pathsep}", pathsep.to_string()),
            ("%{fs-sep}", fs_sep),
            ("%s", quote_path(&paths.source)),
            ("%S", quote_path(&paths.source_dir)),
            ("%p", quote_path(&paths.source_dir)),
            ("%t", quote_path(&paths.temp_base)),
            ("%T", quote_path(&paths.temp_dir)),
        ];
        for (token, value) in builtins {
            table.push(Substitution::verbatim(&regex::escape(token), value)?);
        }

        table.push(Substitution::verbatim(&regex::escape(PERCENT_MARKER), "%")?);
        Ok(table)
    }
}

impl FromIterator<Substitution> for SubstitutionTable {
    fn from_iter<I: IntoIterator<Item = Substitution>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
