// SPDX-License-Identifier: GPL-3.0-only

//! Runs the real executor against ordinary binaries

use std::sync::Arc;
use std::time::{Duration, Instant};

use btrfs_ops::{
    CommandInvocation, Executor, Orchestrator, OrchestratorConfig, Outcome, PrivilegedExecutor,
};

fn sh(script: &str) -> CommandInvocation {
    CommandInvocation::new("sh", vec!["-c".to_string(), script.to_string()])
}

fn executor() -> PrivilegedExecutor {
    PrivilegedExecutor::unprivileged()
}

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn success_captures_stdout() {
    let result = executor().run(&sh("echo 'Label: data  uuid: 1234'"), TIMEOUT).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout.trim(), "Label: data  uuid: 1234");
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn nonzero_exit_is_a_tool_error() {
    let result = executor()
        .run(&sh("echo 'ERROR: balance failed' >&2; exit 2"), TIMEOUT)
        .await;

    assert_eq!(result.outcome, Outcome::ToolError);
    assert_eq!(result.exit_code, Some(2));
    assert!(result.stderr.contains("balance failed"));
}

#[tokio::test]
async fn stderr_decides_denied_and_not_found() {
    let denied = executor()
        .run(&sh("echo 'ERROR: Operation not permitted' >&2; exit 1"), TIMEOUT)
        .await;
    assert_eq!(denied.outcome, Outcome::Denied);

    let missing = executor()
        .run(
            &sh("echo 'ERROR: cannot access /mnt/gone: No such file or directory' >&2; exit 1"),
            TIMEOUT,
        )
        .await;
    assert_eq!(missing.outcome, Outcome::NotFound);
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let started = Instant::now();
    let result = executor()
        .run(
            &CommandInvocation::new("sleep", vec!["30".to_string()]),
            Duration::from_millis(200),
        )
        .await;

    assert_eq!(result.outcome, Outcome::ToolError);
    assert_eq!(result.exit_code, None);
    assert!(result.stderr.contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn arguments_are_not_interpreted_by_a_shell() {
    let invocation = CommandInvocation::new(
        "printf",
        vec!["%s\n".to_string(), "/mnt/@ $(echo injected); true".to_string()],
    );
    let result = executor().run(&invocation, TIMEOUT).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.stdout, "/mnt/@ $(echo injected); true\n");
}

#[tokio::test]
async fn prefix_runs_before_the_program() {
    // `env` stands in for an escalation command that execs its argument.
    let result = PrivilegedExecutor::new(vec!["env".to_string()])
        .skip_prefix_when_root(false)
        .run(&sh("echo prefixed"), TIMEOUT)
        .await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.stdout.trim(), "prefixed");
}

#[tokio::test]
async fn missing_btrfs_binary_is_invalid_through_the_orchestrator() {
    let config = OrchestratorConfig {
        btrfs_program: "/nonexistent/bin/btrfs".to_string(),
        privilege_prefix: Vec::new(),
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::from_config(config).expect("registry is consistent");

    let result = orchestrator
        .subvolume()
        .create("/mnt/data/@home")
        .await
        .expect("request is valid");

    assert_eq!(result.outcome, Outcome::Invalid);
    assert_eq!(result.exit_code, None);
    assert!(!orchestrator.locks().is_locked("/mnt/data/@home"));
}

#[tokio::test]
async fn concurrent_exclusive_runs_release_their_locks() {
    let config = OrchestratorConfig {
        btrfs_program: "/nonexistent/bin/btrfs".to_string(),
        privilege_prefix: Vec::new(),
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(Orchestrator::from_config(config).unwrap());

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.scrub().start("/mnt/data", false).await })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.outcome, Outcome::Invalid);
    }
    assert!(!orchestrator.locks().is_locked("/mnt/data"));
}
