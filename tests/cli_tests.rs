use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const CONFIG: &str = r#"
name = "cli-suite"
suffixes = [".test"]
"#;

/// Builds a `lit-runner` invocation against the suite in `dir`,
/// pinned to English output without colors.
fn lit_runner(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lit-runner").unwrap();
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .arg("--lang")
        .arg("en")
        .arg("--config")
        .arg(dir.join("lit.toml"));
    cmd
}

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A suite whose only test passes exits with 0 and reports it.
/// 只有一个通过的测试的套件以 0 退出并报告它。
#[test]
fn test_successful_run() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "ok.test", "# RUN: true\n");

    lit_runner(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS: ok.test"));
}

/// A failing RUN line makes the whole run exit with 1.
/// 失败的 RUN 行使整个运行以 1 退出。
#[test]
fn test_failing_test_exits_with_one() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "ok.test", "# RUN: true\n");
    write(dir.path(), "bad.test", "# RUN: echo broken >&2 && false\n");

    lit_runner(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL: bad.test"))
        .stdout(predicate::str::contains("PASS: ok.test"));
}

/// Unsupported tests are reported but do not fail the run.
/// 不支持的测试会被报告，但不会使运行失败。
#[test]
fn test_unsupported_test_does_not_fail_run() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(
        dir.path(),
        "gated.test",
        "# REQUIRES: definitely-not-a-feature\n# RUN: false\n",
    );

    lit_runner(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("UNSUPPORTED: gated.test"));
}

/// `-D` adds a feature for this run only.
/// `-D` 仅为本次运行添加特性。
#[test]
fn test_param_enables_feature() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "gated.test", "# REQUIRES: fancy\n# RUN: true\n");

    lit_runner(dir.path())
        .arg("-D")
        .arg("fancy")
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS: gated.test"));
}

/// A missing configuration file is fatal and exits with 2.
/// 缺少配置文件是致命错误，以 2 退出。
#[test]
fn test_missing_config_is_fatal() {
    let dir = tempdir().unwrap();

    lit_runner(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

/// An invalid substitution table is fatal and no test runs.
/// 无效的替换表是致命错误，不运行任何测试。
#[test]
fn test_invalid_config_is_fatal() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "lit.toml",
        r#"
name = "broken"
suffixes = [".test"]

[[substitutions]]
pattern = "(%bad"
mode = "regex"
replacement = "x"
"#,
    );
    write(dir.path(), "ok.test", "# RUN: true\n");

    lit_runner(dir.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("PASS").not());
}

/// `--format json` prints a machine-readable summary on stdout.
/// `--format json` 在标准输出上打印机器可读的摘要。
#[test]
fn test_json_format() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "ok.test", "# RUN: true\n");
    write(dir.path(), "xfail.test", "# XFAIL: *\n# RUN: false\n");

    let output = lit_runner(dir.path())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["suite"], "cli-suite");
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["counts"]["PASS"], 1);
    assert_eq!(json["counts"]["XFAIL"], 1);
    assert_eq!(json["results"][0]["name"], "ok.test");
}

/// `--output` writes the JSON report next to the console output.
/// `--output` 在控制台输出之外写入 JSON 报告。
#[test]
fn test_output_writes_report() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "ok.test", "# RUN: true\n");
    let report = dir.path().join("reports/run.json");

    lit_runner(dir.path())
        .arg("--output")
        .arg(&report)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["results"][0]["outcome"], "PASS");
}

/// Positional paths restrict the run to part of the suite.
/// 位置路径将运行限制在套件的一部分。
#[test]
fn test_paths_restrict_run() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "a/ok.test", "# RUN: true\n");
    write(dir.path(), "b/bad.test", "# RUN: false\n");

    lit_runner(dir.path())
        .arg(dir.path().join("a"))
        .assert()
        .success()
        .stdout(predicate::str::contains("bad.test").not());
}

/// The two sharding flags must be given together.
/// 两个分片参数必须一起提供。
#[test]
fn test_runner_index_requires_total_runners() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);

    lit_runner(dir.path())
        .arg("--runner-index")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--total-runners"));
}

/// A runner index outside the shard count is rejected.
/// 超出分片数量的运行器索引会被拒绝。
#[test]
fn test_runner_index_out_of_range() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    write(dir.path(), "ok.test", "# RUN: true\n");

    lit_runner(dir.path())
        .arg("--total-runners")
        .arg("2")
        .arg("--runner-index")
        .arg("2")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Runner index must be less than total runners",
        ));
}

/// Each shard runs a disjoint part of the suite.
/// 每个分片运行套件中不相交的一部分。
#[test]
fn test_sharded_runs_are_disjoint() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lit.toml", CONFIG);
    for name in ["a", "b", "c"] {
        write(dir.path(), &format!("{name}.test"), "# RUN: true\n");
    }

    let names = |index: &str| -> Vec<String> {
        let output = lit_runner(dir.path())
            .args(["--format", "json", "--total-runners", "2", "--runner-index", index])
            .output()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        json["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    };

    assert_eq!(names("0"), vec!["a.test", "c.test"]);
    assert_eq!(names("1"), vec!["b.test"]);
}
