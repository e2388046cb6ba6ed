mod common;

use common::{BASIC_CONFIG, TestSuite};
use lit_runner::core::discovery::{Discovery, LocalConfig};
use lit_runner::core::error::ConfigError;
use lit_runner::infra::fs::display_relative;
use std::path::PathBuf;
use std::time::Duration;
use walkdir::WalkDir;

fn names(discovery: &Discovery<'_>) -> Vec<String> {
    discovery
        .iter()
        .map(|t| display_relative(&t.unwrap().relative_path))
        .collect()
}

fn populate(suite: &TestSuite) {
    for file in [
        "b.test",
        "a.test",
        "a/z.test",
        "a/m.test",
        "a/notes.txt",
        "c/d/e.test",
        "Inputs/helper.test",
        ".hidden/x.test",
        ".dot.test",
    ] {
        suite.write(file, "# RUN: true\n");
    }
}

#[test]
fn walk_is_sorted_and_filtered() {
    let suite = TestSuite::new();
    populate(&suite);
    let config = suite.config(&format!("{BASIC_CONFIG}\nexcludes = [\"Inputs\"]"));
    let discovery = Discovery::new(&config);
    assert_eq!(
        names(&discovery),
        vec!["a/m.test", "a/z.test", "a.test", "b.test", "c/d/e.test"]
    );
}

#[test]
fn order_matches_a_sorted_reference_walk() {
    let suite = TestSuite::new();
    populate(&suite);
    let config = suite.config(BASIC_CONFIG);

    let expected: Vec<String> = WalkDir::new(&config.source_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "test"))
        .map(|e| display_relative(e.path().strip_prefix(&config.source_root).unwrap()))
        .collect();

    assert_eq!(names(&Discovery::new(&config)), expected);
}

#[test]
fn discovery_is_restartable() {
    let suite = TestSuite::new();
    populate(&suite);
    let config = suite.config(BASIC_CONFIG);
    let discovery = Discovery::new(&config);
    assert_eq!(names(&discovery), names(&discovery));
}

#[test]
fn local_config_scopes_only_its_subtree() {
    let suite = TestSuite::new();
    suite.write("top.test", "# RUN: true\n");
    suite.write("top.ll", "; RUN: true\n");
    suite.write("llvm/a.ll", "; RUN: true\n");
    suite.write("llvm/a.test", "# RUN: true\n");
    suite.write("llvm/skip/b.ll", "; RUN: true\n");
    suite.write(
        "llvm/lit.local.toml",
        "suffixes = [\".ll\"]\nexcludes = [\"skip\"]\ntimeout_secs = 7\n",
    );
    suite.write("slow/c.test", "# RUN: true\n");
    suite.write("slow/lit.local.toml", "unsupported = true\n");

    let config = suite.config(BASIC_CONFIG);
    let tests: Vec<_> = Discovery::new(&config).iter().map(Result::unwrap).collect();
    let found: Vec<_> = tests.iter().map(|t| display_relative(&t.relative_path)).collect();
    assert_eq!(found, vec!["llvm/a.ll", "slow/c.test", "top.test"]);

    assert_eq!(tests[0].scope.timeout, Some(Duration::from_secs(7)));
    assert!(!tests[0].scope.unsupported);
    assert!(tests[1].scope.unsupported);
    assert_eq!(tests[2].scope.timeout, None);
}

#[test]
fn malformed_local_config_is_reported() {
    let suite = TestSuite::new();
    suite.write("sub/a.test", "# RUN: true\n");
    suite.write("sub/lit.local.toml", "suffixes = 3\n");
    let config = suite.config(BASIC_CONFIG);
    let results: Vec<_> = Discovery::new(&config).iter().collect();
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ConfigError::Parse { .. }))));
}

#[test]
fn local_config_load() {
    let suite = TestSuite::new();
    assert_eq!(LocalConfig::load(&suite.root()).unwrap(), None);
    suite.write("lit.local.toml", "excludes = [\"x\"]\n");
    let local = LocalConfig::load(&suite.root()).unwrap().unwrap();
    assert_eq!(local.excludes, Some(vec!["x".to_string()]));
}

#[test]
fn explicit_paths_restrict_the_walk() {
    let suite = TestSuite::new();
    populate(&suite);
    let config = suite.config(BASIC_CONFIG);

    let dir = Discovery::with_paths(&config, &[suite.root().join("a")]).unwrap();
    assert_eq!(names(&dir), vec!["a/m.test", "a/z.test"]);

    // A named file runs even when its suffix is not configured.
    let file = Discovery::with_paths(&config, &[suite.root().join("a/notes.txt")]).unwrap();
    assert_eq!(names(&file), vec!["a/notes.txt"]);
}

#[test]
fn explicit_paths_must_exist_inside_the_source_root() {
    let suite = TestSuite::new();
    suite.mkdir("tests");
    suite.write("outside.test", "# RUN: true\n");
    let config = suite.config(&format!("source_root = \"tests\"\n{BASIC_CONFIG}"));

    let missing = Discovery::with_paths(&config, &[PathBuf::from("/definitely/not/here")]);
    assert!(matches!(missing, Err(ConfigError::MissingTestPath(_))));

    let outside = Discovery::with_paths(&config, &[suite.root().join("outside.test")]);
    assert!(matches!(outside, Err(ConfigError::OutsideSourceRoot(_))));
}
