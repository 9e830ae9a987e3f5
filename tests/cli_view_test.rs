//! Integration tests for `sx view`.

mod common;

use common::{TestEnv, parse_stdout};
use predicates::prelude::*;
use serde_json::{Value, json};

fn view(env: &TestEnv, args: &[&str]) -> Value {
    let output = env.sx_with_data().arg("view").args(args).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    parse_stdout(&output)
}

#[test]
fn test_unfiltered_view_kpis() {
    let env = TestEnv::with_scenario();
    let result = view(&env, &["--at", "2026-06-01"]);

    assert_eq!(
        result["kpis"],
        json!({
            "groups": 2,
            "projects": 2,
            "ongoing_projects": 2,
            "overdue_projects": 0,
            "tasks": 3,
            "overdue_tasks": 1
        })
    );
    assert_eq!(result["at"], "2026-06-01T00:00:00Z");
}

#[test]
fn test_overdue_depends_on_evaluation_instant() {
    let env = TestEnv::with_scenario();
    let before = view(&env, &["--at", "2026-02-01"]);
    let after = view(&env, &["--at", "2031-01-01"]);

    assert_eq!(before["kpis"]["overdue_tasks"], 0);
    assert_eq!(before["kpis"]["overdue_projects"], 0);
    assert_eq!(after["kpis"]["overdue_tasks"], 1);
    assert_eq!(after["kpis"]["overdue_projects"], 1);
}

#[test]
fn test_project_insight_summary() {
    let env = TestEnv::with_scenario();
    let result = view(&env, &["-p", "P1", "--at", "2026-06-01"]);

    let insights = result["project_insights"].as_array().unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0]["project_id"], "P1");
    assert_eq!(insights[0]["completion_rate"], 50);
    assert_eq!(insights[0]["health_score"], 60);
    assert_eq!(
        insights[0]["summary"],
        "Billing: 1 of 2 tasks completed (50%), 1 overdue."
    );

    let groups = result["group_insights"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["group_id"], "G1");
}

#[test]
fn test_user_filter_narrows_tasks() {
    let env = TestEnv::with_scenario();
    let result = view(&env, &["-u", "U2", "--at", "2026-06-01"]);

    let tasks: Vec<&str> = result["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(tasks, vec!["T2"]);
    assert_eq!(result["kpis"]["projects"], 1);
}

#[test]
fn test_closed_projects_never_in_view() {
    let env = TestEnv::with_scenario();
    let result = view(&env, &["-g", "G1"]);

    let projects: Vec<&str> = result["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(projects, vec!["P1"]);
}

#[test]
fn test_invalid_at_is_rejected() {
    let env = TestEnv::with_scenario();
    env.sx_with_data()
        .args(["view", "--at", "yesterday"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid --at value"));
}

#[test]
fn test_view_human() {
    let env = TestEnv::with_scenario();
    env.sx_with_data()
        .args(["view", "-g", "G2", "--at", "2026-06-01", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1 group(s), 1 project(s) (1 ongoing, 0 overdue), 1 task(s) (0 overdue)",
        ))
        .stdout(predicate::str::contains("App: 0 of 1 tasks completed (0%). Health 40/100."));
}
