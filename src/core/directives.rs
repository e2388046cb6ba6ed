//! # Directive Parser / 指令解析器
//!
//! Extracts the directives embedded in a test file's comments:
//!
//! - `RUN: <shell pipeline>`: one run-line; a trailing `\` continues it on the next `RUN:` line
//! - `REQUIRES: a, b`: run only if every feature is available
//! - `UNSUPPORTED: c`: skip if any feature is available
//! - `XFAIL: *` or `XFAIL: feat, triple-part`: the test is expected to fail
//! - `END.`: stop scanning
//!
//! Keywords are recognised anywhere on a line, so any comment syntax works
//! (`; RUN:`, `// RUN:`, `# RUN:`).
//!
//! 提取嵌入在测试文件注释中的指令。关键字可以出现在行中的任何位置，
//! 因此任何注释语法都可以使用。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::error::DirectiveError;
use crate::core::features::FeatureSet;
use crate::infra::fs::quote_path;

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(RUN|REQUIRES|UNSUPPORTED|XFAIL):|\bEND\.").expect("directive regex is valid")
});

/// One command extracted from `RUN:` lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLine {
    /// 1-based line number of the first `RUN:` line contributing to this command.
    pub line: usize,
    pub command: String,
}

/// Everything a test file declares about itself.
/// 测试文件关于自身声明的所有内容。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directives {
    pub run_lines: Vec<RunLine>,
    pub requires: Vec<String>,
    pub unsupported: Vec<String>,
    pub xfail: Vec<String>,
}

impl Directives {
    /// Required features that are not available.
    pub fn missing_requirements<'a>(&'a self, features: &FeatureSet) -> Vec<&'a str> {
        features.missing(&self.requires)
    }

    /// `UNSUPPORTED:` features that are available.
    pub fn unsupported_matches<'a>(&'a self, features: &FeatureSet) -> Vec<&'a str> {
        features.present(&self.unsupported)
    }

    /// Whether the test is expected to fail: `*` always, a feature when it is
    /// available, anything else when it is a substring of the target triple.
    ///
    /// 测试是否预期失败。
    pub fn is_expected_failure(&self, features: &FeatureSet, target_triple: Option<&str>) -> bool {
        self.xfail.iter().any(|item| {
            item == "*"
                || features.has(item)
                || target_triple.is_some_and(|triple| triple.contains(item.as_str()))
        })
    }
}

fn parse_list(rest: &str, line: usize, keyword: &'static str) -> Result<Vec<String>, DirectiveError> {
    if rest.trim().is_empty() {
        return Err(DirectiveError::EmptyList { line, keyword });
    }
    rest.split(',')
        .map(|item| {
            let item = item.trim();
            if item.is_empty() {
                Err(DirectiveError::EmptyItem { line, keyword })
            } else {
                Ok(item.to_string())
            }
        })
        .collect()
}

/// Parses the directives of a test file.
///
/// # Errors
/// - [`DirectiveError::NoRunLines`] if the file has no `RUN:` line
/// - [`DirectiveError::EmptyList`] / [`DirectiveError::EmptyItem`] for malformed lists
/// - [`DirectiveError::UnterminatedRun`] if a continued `RUN:` line is never finished
pub fn parse_directives(source: &str) -> Result<Directives, DirectiveError> {
    let mut directives = Directives::default();
    // A RUN: command whose last line ended with `\`.
    let mut pending: Option<RunLine> = None;

    for (idx, text) in source.lines().enumerate() {
        let line = idx + 1;
        let Some(caps) = DIRECTIVE_RE.captures(text) else {
            continue;
        };
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let rest = text[whole.end()..].trim();

        let Some(keyword) = caps.get(1).map(|m| m.as_str()) else {
            // END.
            if let Some(run) = pending {
                return Err(DirectiveError::UnterminatedRun { line: run.line });
            }
            break;
        };

        if keyword != "RUN" {
            if let Some(run) = pending.take() {
                return Err(DirectiveError::UnterminatedRun { line: run.line });
            }
        }

        match keyword {
            "RUN" => {
                let mut run = pending.take().unwrap_or(RunLine {
                    line,
                    command: String::new(),
                });
                match rest.strip_suffix('\\') {
                    Some(head) => {
                        run.command.push_str(head);
                        pending = Some(run);
                    }
                    None => {
                        run.command.push_str(rest);
                        directives.run_lines.push(run);
                    }
                }
            }
            "REQUIRES" => directives
                .requires
                .extend(parse_list(rest, line, "REQUIRES:")?),
            "UNSUPPORTED" => directives
                .unsupported
                .extend(parse_list(rest, line, "UNSUPPORTED:")?),
            "XFAIL" => directives
                .xfail
                .extend(parse_list(rest, line, "XFAIL:")?),
            _ => {}
        }
    }

    if let Some(run) = pending {
        return Err(DirectiveError::UnterminatedRun { line: run.line });
    }
    if directives.run_lines.is_empty() {
        return Err(DirectiveError::NoRunLines);
    }
    Ok(directives)
}

/// A wrapper that changes how a run-line's exit status is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    /// `not`: succeeds iff the wrapped command fails without crashing.
    Not,
    /// `not --crash`: succeeds iff the wrapped command dies by a signal.
    NotCrash,
}

/// Splits leading `not` / `not --crash` wrappers off a run-line.
/// 从运行行中拆分出前导的 `not` / `not --crash` 包装器。
pub fn split_wrappers(command: &str) -> (Vec<Wrapper>, &str) {
    let mut wrappers = Vec::new();
    let mut rest = command.trim_start();
    loop {
        let Some(after) = rest.strip_prefix("not") else {
            break;
        };
        if !after.starts_with(char::is_whitespace) {
            break;
        }
        let after = after.trim_start();
        match after.strip_prefix("--crash") {
            Some(tail) if tail.is_empty() || tail.starts_with(char::is_whitespace) => {
                wrappers.push(Wrapper::NotCrash);
                rest = tail.trim_start();
            }
            _ => {
                wrappers.push(Wrapper::Not);
                rest = after;
            }
        }
    }
    (wrappers, rest)
}

/// Exit statuses above this are how a POSIX shell reports a child killed by a signal.
const SIGNAL_STATUS_BASE: i32 = 128;

/// Judges a run-line: `code`/`signaled` describe how the wrapped command
/// ended, and wrappers are applied from the innermost outwards. A status
/// above 128 counts as a crash, since that is all the shell reports for a
/// command that died inside a pipeline or list.
pub fn judge(wrappers: &[Wrapper], code: Option<i32>, signaled: bool) -> bool {
    let mut crashed = signaled || code.is_some_and(|c| c > SIGNAL_STATUS_BASE);
    let mut ok = code == Some(0) && !crashed;
    for wrapper in wrappers.iter().rev() {
        ok = match wrapper {
            Wrapper::Not => !ok && !crashed,
            Wrapper::NotCrash => crashed,
        };
        crashed = false;
    }
    ok
}

/// A run-line ready for the shell, plus what is still to be judged in-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedLine {
    pub command: String,
    /// Wrappers applied to the exit status of the whole line.
    pub wrappers: Vec<Wrapper>,
    /// Where a wrapped command that feeds a pipe records its verdict.
    pub status_file: Option<PathBuf>,
}

impl PreparedLine {
    /// Judges the line from the shell's exit status and, for a wrapped
    /// command feeding a pipe, the verdict it recorded. A failing wrapped
    /// command fails the line even when the pipe's last command succeeds.
    pub fn judge(&self, code: Option<i32>, signaled: bool) -> bool {
        if !judge(&self.wrappers, code, signaled) {
            return false;
        }
        match &self.status_file {
            Some(path) => std::fs::read_to_string(path)
                .map(|status| status.trim() == "0")
                .unwrap_or(true),
            None => true,
        }
    }
}

/// Splits `command` at its first top-level `|`, `&`, `;` or newline.
/// Quotes, backslash escapes, parentheses, backticks and `>&`/`<&`
/// redirections are skipped over.
///
/// Returns `None` for a single simple command.
pub fn split_first_command(command: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut backtick = false;
    let mut prev = '\0';
    let mut chars = command.char_indices();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' {
                    quote = None;
                }
            }
            Some(_) => match c {
                '\\' => {
                    chars.next();
                }
                '"' => quote = None,
                _ => {}
            },
            None => match c {
                '\\' => {
                    chars.next();
                }
                '\'' | '"' => quote = Some(c),
                '`' => backtick = !backtick,
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '&' if prev == '>' || prev == '<' => {}
                '|' | '&' | ';' | '\n' if depth == 0 && !backtick => {
                    return Some((&command[..i], &command[i..]));
                }
                _ => {}
            },
        }
        prev = c;
    }
    None
}

/// Scopes leading `not` wrappers to the command they wrap.
///
/// A simple command runs as-is and its wrappers are judged in-process with
/// the exact signal information. When the wrapped command is followed by a
/// pipe or list operator, the wrappers are rewritten into a subshell around
/// that first command only, so `not llc %s 2>&1 | FileCheck %s` is judged by
/// both `not llc` and `FileCheck`. The subshell writes its verdict to
/// `status_file` when it feeds a pipe.
///
/// 将前导的 `not` 包装器限定在其包装的命令上。
pub fn prepare_run_line(command: &str, status_file: &Path) -> PreparedLine {
    let (wrappers, inner) = split_wrappers(command);
    let split = if wrappers.is_empty() || cfg!(windows) {
        None
    } else {
        split_first_command(inner)
    };
    let Some((first, rest)) = split else {
        return PreparedLine {
            command: inner.to_string(),
            wrappers,
            status_file: None,
        };
    };

    let mut scoped = format!("( {}\n__lit_status=$?; ", first.trim_end());
    for wrapper in wrappers.iter().rev() {
        let test = match wrapper {
            Wrapper::Not => format!(
                "[ $__lit_status -ne 0 ] && [ $__lit_status -le {SIGNAL_STATUS_BASE} ]"
            ),
            Wrapper::NotCrash => format!("[ $__lit_status -gt {SIGNAL_STATUS_BASE} ]"),
        };
        scoped.push_str(&format!(
            "if {test}; then __lit_status=0; else __lit_status=1; fi; "
        ));
    }

    let feeds_pipe = rest.starts_with('|') && !rest.starts_with("||");
    if feeds_pipe {
        scoped.push_str(&format!("echo $__lit_status > {}; ", quote_path(status_file)));
    }
    scoped.push_str("exit $__lit_status )");
    scoped.push_str(rest);

    PreparedLine {
        command: scoped,
        wrappers: Vec::new(),
        status_file: feeds_pipe.then(|| status_file.to_path_buf()),
    }
}
