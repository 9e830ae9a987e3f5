//! Integration tests for `sx reconcile`.
//!
//! The scenario (see `common::SCENARIO`): G1 owns the open project P1 (members
//! U1, U2) and the closed project P2 (member U1); G2 owns P3 (member U3).

mod common;

use common::{TestEnv, parse_stdout};
use predicates::prelude::*;
use serde_json::json;

fn reconcile(env: &TestEnv, args: &[&str]) -> serde_json::Value {
    let output = env
        .sx_with_data()
        .arg("reconcile")
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    parse_stdout(&output)
}

#[test]
fn test_user_only_backfills_open_projects_and_groups() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-u", "U1"]);

    assert_eq!(result["load"]["state"], "loaded");
    assert_eq!(
        result["selection"],
        json!({"groupIds": ["G1"], "projectIds": ["P1"], "userIds": ["U1"]})
    );
    assert_eq!(result["changed"], true);
}

#[test]
fn test_project_only_closes_upward() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-p", "P1"]);

    assert_eq!(
        result["selection"],
        json!({"groupIds": ["G1"], "projectIds": ["P1"], "userIds": []})
    );
}

#[test]
fn test_users_pruned_to_project_members() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-p", "P1", "-u", "U1", "-u", "U3"]);

    assert_eq!(
        result["selection"],
        json!({"groupIds": ["G1"], "projectIds": ["P1"], "userIds": ["U1"]})
    );
}

#[test]
fn test_project_without_selected_member_yields_to_users() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-p", "P1", "-u", "U3"]);

    // P1 has no selected member, so U3 alone drives the backfill
    assert_eq!(
        result["selection"],
        json!({"groupIds": ["G2"], "projectIds": ["P3"], "userIds": ["U3"]})
    );
}

#[test]
fn test_closed_project_is_dropped() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-p", "P2"]);

    assert_eq!(
        result["selection"],
        json!({"groupIds": [], "projectIds": [], "userIds": []})
    );
}

#[test]
fn test_project_outside_selected_group_is_dropped() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-g", "G1", "-p", "P3"]);

    assert_eq!(result["selection"]["groupIds"], json!(["G1"]));
    assert_eq!(result["selection"]["projectIds"], json!([]));
}

#[test]
fn test_unknown_ids_are_dropped() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-g", "G9", "-u", "U9"]);

    assert_eq!(
        result["selection"],
        json!({"groupIds": [], "projectIds": [], "userIds": []})
    );
}

#[test]
fn test_consistent_selection_is_unchanged() {
    let env = TestEnv::with_scenario();
    let result = reconcile(&env, &["-g", "G1", "-p", "P1", "-u", "U1"]);

    assert_eq!(result["changed"], false);
    assert_eq!(result["draft"], result["selection"]);
}

#[test]
fn test_reconcile_is_idempotent() {
    let env = TestEnv::with_scenario();
    let first = reconcile(&env, &["-u", "U2", "-u", "U3"]);

    let mut args = Vec::new();
    for (flag, key) in [("-g", "groupIds"), ("-p", "projectIds"), ("-u", "userIds")] {
        for id in first["selection"][key].as_array().unwrap() {
            args.push(flag.to_string());
            args.push(id.as_str().unwrap().to_string());
        }
    }
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let second = reconcile(&env, &args);

    assert_eq!(second["selection"], first["selection"]);
    assert_eq!(second["changed"], false);
}

#[test]
fn test_unreadable_data_degrades_to_empty() {
    let env = TestEnv::new();
    env.write("data.json", "{ not json");

    let result = reconcile(&env, &["-u", "U1"]);
    assert_eq!(result["load"]["state"], "unavailable");
    assert!(result["load"]["reason"].as_str().unwrap().contains("JSON"));
    assert_eq!(result["selection"]["userIds"], json!([]));
}

#[test]
fn test_data_from_env_var() {
    let env = TestEnv::with_scenario();
    env.sx()
        .env("SX_DATA", env.data_path())
        .args(["reconcile", "-p", "P3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""groupIds":["G2"]"#));
}

#[test]
fn test_reconcile_human() {
    let env = TestEnv::with_scenario();
    env.sx_with_data()
        .args(["reconcile", "-u", "U1", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selection (adjusted):"))
        .stdout(predicate::str::contains("groups:   G1"))
        .stdout(predicate::str::contains("projects: P1"));
}
