//! End-to-end execution of single tests and whole runs through the real shell.

mod common;

use common::{BASIC_CONFIG, CountingRunner, TestSuite, plan, spec};
use lit_runner::core::execution::run_test;
use lit_runner::core::models::{ExecutionResult, Outcome};
use lit_runner::core::scheduler::Scheduler;
use lit_runner::infra::command::ShellRunner;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

async fn run_single(
    suite: &TestSuite,
    toml: &str,
    features: &[&str],
    name: &str,
    content: &str,
) -> (ExecutionResult, usize) {
    suite.write(name, content);
    let config = suite.config_with_features(toml, features);
    let spec = spec(&config, name);
    let runner = CountingRunner::default();
    let result = run_test(&spec, &config, &runner, &CancellationToken::new()).await;
    let spawns = runner.spawn_count();
    (result, spawns)
}

#[tokio::test]
async fn passing_and_failing_run_lines() {
    let suite = TestSuite::new();
    let (pass, _) = run_single(&suite, BASIC_CONFIG, &[], "pass.test", "# RUN: true\n").await;
    assert_eq!(pass.outcome, Outcome::Pass);

    let (fail, _) = run_single(&suite, BASIC_CONFIG, &[], "fail.test", "# RUN: false\n").await;
    assert_eq!(fail.outcome, Outcome::Fail);
    assert_eq!(fail.commands[0].exit_code, Some(1));
    assert!(fail.message.is_some());
}

#[tokio::test]
async fn run_lines_short_circuit() {
    let suite = TestSuite::new();
    let (result, spawns) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "a.test",
        "# RUN: true\n# RUN: false\n# RUN: echo unreachable\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Fail);
    assert_eq!(spawns, 2);
    assert!(!result.stdout.contains("unreachable"));
}

#[tokio::test]
async fn missing_feature_is_unsupported_without_spawning() {
    let suite = TestSuite::new();
    let (result, spawns) = run_single(
        &suite,
        BASIC_CONFIG,
        &["x86"],
        "a.test",
        "# REQUIRES: x86, nonexistent-feature\n# RUN: false\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Unsupported);
    assert_eq!(spawns, 0);
    assert!(result.message.unwrap().contains("nonexistent-feature"));
}

#[tokio::test]
async fn present_unsupported_feature_skips() {
    let suite = TestSuite::new();
    let (result, spawns) = run_single(
        &suite,
        BASIC_CONFIG,
        &["windows"],
        "a.test",
        "# UNSUPPORTED: darwin, windows\n# RUN: false\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Unsupported);
    assert_eq!(spawns, 0);
}

#[tokio::test]
async fn unsupported_directory_skips() {
    let suite = TestSuite::new();
    suite.write("off/lit.local.toml", "unsupported = true\n");
    let (result, spawns) =
        run_single(&suite, BASIC_CONFIG, &[], "off/a.test", "# RUN: false\n").await;
    assert_eq!(result.outcome, Outcome::Unsupported);
    assert_eq!(spawns, 0);
}

#[tokio::test]
async fn expected_failures() {
    let suite = TestSuite::new();
    let (xfail, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "xfail.test",
        "# XFAIL: *\n# RUN: false\n",
    )
    .await;
    assert_eq!(xfail.outcome, Outcome::ExpectedFail);

    let (xpass, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "xpass.test",
        "# XFAIL: *\n# RUN: true\n",
    )
    .await;
    assert_eq!(xpass.outcome, Outcome::UnexpectedPass);

    let (conditional, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "cond.test",
        "# XFAIL: some-feature\n# RUN: true\n",
    )
    .await;
    assert_eq!(conditional.outcome, Outcome::Pass);
}

#[tokio::test]
async fn not_wrapper_inverts_exit_status() {
    let suite = TestSuite::new();
    let (result, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "a.test",
        "# RUN: not false\n# RUN: not sh -c 'exit 3'\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Pass);

    let (result, _) =
        run_single(&suite, BASIC_CONFIG, &[], "b.test", "# RUN: not true\n").await;
    assert_eq!(result.outcome, Outcome::Fail);
}

#[cfg(unix)]
#[tokio::test]
async fn not_wrapper_applies_to_first_pipeline_command() {
    let suite = TestSuite::new();
    for (name, line, expected) in [
        ("inverted_fail.test", "not false | cat", Outcome::Pass),
        ("inverted_pass.test", "not true | cat", Outcome::Fail),
        ("checked.test", "not sh -c 'echo boom; exit 1' 2>&1 | grep -q boom", Outcome::Pass),
        ("check_fails.test", "not sh -c 'echo boom; exit 1' 2>&1 | grep -q other", Outcome::Fail),
        ("and_list.test", "not false && true", Outcome::Pass),
        ("and_short.test", "not true && true", Outcome::Fail),
        ("quoted.test", "not grep -q 'a|b' /dev/null", Outcome::Pass),
    ] {
        let (result, _) =
            run_single(&suite, BASIC_CONFIG, &[], name, &format!("# RUN: {line}\n")).await;
        assert_eq!(result.outcome, expected, "{line}: {:?}", result.message);
        assert_eq!(result.commands[0].command, line);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn not_crash_sees_crashes_inside_a_pipeline() {
    let suite = TestSuite::new();
    let (result, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "a.test",
        "# RUN: not --crash sh -c 'kill -9 $$' | cat\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Pass, "{:?}", result.message);

    let (result, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "b.test",
        "# RUN: not --crash false | cat\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Fail);
}

#[cfg(unix)]
#[tokio::test]
async fn not_crash_requires_a_signal() {
    let suite = TestSuite::new();
    let (result, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "a.test",
        "# RUN: not --crash sh -c 'kill -9 $$'\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Pass);

    let (result, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "b.test",
        "# RUN: not --crash false\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Fail);
}

#[tokio::test]
async fn builtin_substitutions_and_output_capture() {
    let suite = TestSuite::new();
    let (result, _) = run_single(
        &suite,
        BASIC_CONFIG,
        &[],
        "dir/a.test",
        "# RUN: cat %s > %t\n# RUN: grep -q MARKER %t\n# RUN: test -d %T\n# RUN: echo hello-%%\n# MARKER\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Pass, "{result:?}");
    assert!(result.stdout.contains("hello-%"));
    assert!(result.commands[0].command.contains("a.test"));
}

#[tokio::test]
async fn per_test_temp_dir_is_removed() {
    let suite = TestSuite::new();
    let toml = format!("{BASIC_CONFIG}\nexec_root = \"out\"");
    let (result, _) = run_single(&suite, &toml, &[], "a.test", "# RUN: touch %t\n").await;
    assert_eq!(result.outcome, Outcome::Pass);
    let leftovers = std::fs::read_dir(suite.root().join("out")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn configured_substitutions_and_environment() {
    let suite = TestSuite::new();
    let toml = r#"
        suffixes = [".test"]
        [environment]
        EXTRA = "from-config"
        [[substitutions]]
        pattern = "%greet"
        replacement = "echo hi"
    "#;
    let (result, _) = run_single(
        &suite,
        toml,
        &[],
        "a.test",
        "# RUN: %greet\n# RUN: test \"$EXTRA\" = from-config\n# RUN: test -z \"$HOME\"\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Pass, "{result:?}");
    assert_eq!(result.stdout.trim(), "hi");
}

#[tokio::test]
async fn missing_tool_is_an_error_without_spawning() {
    let suite = TestSuite::new();
    let toml = r#"
        suffixes = [".test"]
        [[tools]]
        name = "frobnicate"
    "#;
    let (result, spawns) =
        run_single(&suite, toml, &[], "a.test", "# RUN: frobnicate %s\n").await;
    assert_eq!(result.outcome, Outcome::Error);
    assert_eq!(spawns, 0);
    assert!(result.message.unwrap().contains("frobnicate"));
}

#[tokio::test]
async fn bad_directives_are_errors() {
    let suite = TestSuite::new();
    let (result, spawns) =
        run_single(&suite, BASIC_CONFIG, &[], "a.test", "no directives here\n").await;
    assert_eq!(result.outcome, Outcome::Error);
    assert_eq!(spawns, 0);
}

#[tokio::test]
async fn timeout_kills_the_test() {
    let suite = TestSuite::new();
    let toml = format!("{BASIC_CONFIG}\ntimeout_secs = 1");
    let started = Instant::now();
    let (result, _) = run_single(&suite, &toml, &[], "slow.test", "# RUN: sleep 5\n").await;
    assert_eq!(result.outcome, Outcome::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn timeout_wins_over_expected_failure() {
    let suite = TestSuite::new();
    let toml = format!("{BASIC_CONFIG}\ntimeout_secs = 1");
    let (result, _) = run_single(
        &suite,
        &toml,
        &[],
        "slow.test",
        "# XFAIL: *\n# RUN: sleep 5\n",
    )
    .await;
    assert_eq!(result.outcome, Outcome::Timeout);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_background_children() {
    let suite = TestSuite::new();
    let pid_file = suite.root().join("bg.pid");
    let toml = format!("{BASIC_CONFIG}\ntimeout_secs = 1");
    let content = format!(
        "# RUN: sleep 30 & echo $! > {}; sleep 5\n",
        pid_file.display()
    );
    let (result, _) = run_single(&suite, &toml, &[], "bg.test", &content).await;
    assert_eq!(result.outcome, Outcome::Timeout);

    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    let proc_dir = std::path::PathBuf::from(format!("/proc/{pid}"));
    let deadline = Instant::now() + Duration::from_secs(3);
    let gone = loop {
        let alive = std::fs::read_to_string(proc_dir.join("stat"))
            .map(|stat| !stat.contains(") Z "))
            .unwrap_or(false);
        if !alive {
            break true;
        }
        if Instant::now() > deadline {
            break false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(gone, "background process {pid} survived the timeout");
}

#[tokio::test]
async fn scheduler_yields_one_result_per_test_in_order() {
    let suite = TestSuite::new();
    for i in 0..20 {
        let body = if i % 5 == 0 { "# RUN: false\n" } else { "# RUN: true\n" };
        suite.write(&format!("t{i:02}.test"), body);
    }
    let config = Arc::new(suite.config(BASIC_CONFIG));
    let tests = plan(&config);
    let scheduler = Scheduler::new(Arc::clone(&config), Arc::new(ShellRunner), 4);

    let mut seen = 0;
    let summary = scheduler.run(tests, |_| seen += 1).await;

    assert_eq!(seen, 20);
    assert_eq!(summary.total(), 20);
    assert_eq!(summary.count(Outcome::Fail), 4);
    assert_eq!(summary.count(Outcome::Pass), 16);
    let indices: Vec<_> = summary.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..20).collect::<Vec<_>>());
    assert_eq!(summary.results[0].name, "t00.test");
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn unsupported_and_expected_failures_exit_zero() {
    let suite = TestSuite::new();
    suite.write("a.test", "# REQUIRES: nonexistent-feature\n# RUN: false\n");
    suite.write("b.test", "# XFAIL: *\n# RUN: false\n");
    suite.write("c.test", "# RUN: true\n");
    let config = Arc::new(suite.config(BASIC_CONFIG));
    let tests = plan(&config);
    let summary = Scheduler::new(config, Arc::new(ShellRunner), 2)
        .run(tests, |_| {})
        .await;
    assert_eq!(summary.count(Outcome::Unsupported), 1);
    assert_eq!(summary.count(Outcome::ExpectedFail), 1);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn cancellation_before_start_runs_nothing() {
    let suite = TestSuite::new();
    for i in 0..3 {
        suite.write(&format!("t{i}.test"), "# RUN: true\n");
    }
    let config = Arc::new(suite.config(BASIC_CONFIG));
    let tests = plan(&config);
    let token = CancellationToken::new();
    token.cancel();
    let summary = Scheduler::new(config, Arc::new(ShellRunner), 2)
        .with_cancellation(token)
        .run(tests, |_| {})
        .await;
    assert_eq!(summary.total(), 0);
    assert_eq!(summary.not_run, 3);
    assert!(summary.interrupted);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_tests() {
    let suite = TestSuite::new();
    suite.write("slow.test", "# RUN: sleep 10\n");
    let config = Arc::new(suite.config(BASIC_CONFIG));
    let tests = plan(&config);
    let token = CancellationToken::new();
    let scheduler =
        Scheduler::new(config, Arc::new(ShellRunner), 1).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });
    let started = Instant::now();
    let summary = scheduler.run(tests, |_| {}).await;
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.total(), 1);
    assert_eq!(summary.results[0].outcome, Outcome::Error);
    assert!(summary.interrupted);
}
