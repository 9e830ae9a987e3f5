//! Tests for the HTTP insight generator against a local mock endpoint.

mod common;

use std::time::Duration;

use common::spawn_generator;
use serde_json::json;
use sextant::insight::{HttpInsightGenerator, InsightError, InsightGenerator, InsightRequest};

fn request() -> InsightRequest {
    InsightRequest {
        group_ids: vec!["G1".to_string()],
        project_ids: vec!["P1".to_string()],
        user_ids: vec![],
    }
}

fn client(url: &str, token: Option<&str>) -> HttpInsightGenerator {
    HttpInsightGenerator::new(url, token.map(str::to_string), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_envelope_with_report() {
    let server = spawn_generator(
        200,
        json!({
            "success": true,
            "insight": {
                "overview": {"summary": "Billing is on track.", "bullets": ["1 task overdue"]},
                "recommendations": {"bullets": ["Review refunds"]},
                "generated_at": "2026-06-01T10:00:00Z"
            }
        }),
        Duration::ZERO,
    )
    .await;

    let report = client(&server.url, None)
        .generate(&request())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.overview.summary.as_deref(), Some("Billing is on track."));
    assert_eq!(report.overview.bullets, vec!["1 task overdue"]);
    assert_eq!(report.recommendations.bullets, vec!["Review refunds"]);
    assert!(report.conclusions.is_empty());
    assert_eq!(report.generated_at.as_deref(), Some("2026-06-01T10:00:00Z"));
}

#[tokio::test]
async fn test_payload_is_camel_case_selection() {
    let server = spawn_generator(200, json!({"insight": null}), Duration::ZERO).await;

    client(&server.url, Some("tok-123")).generate(&request()).await.unwrap();

    let recorded = server.requests();
    assert_eq!(recorded.len(), 1);
    assert_eq!(
        recorded[0].body,
        json!({"groupIds": ["G1"], "projectIds": ["P1"], "userIds": []})
    );
    assert_eq!(recorded[0].authorization.as_deref(), Some("Bearer tok-123"));
}

#[tokio::test]
async fn test_no_token_sends_no_authorization() {
    let server = spawn_generator(200, json!({"insight": null}), Duration::ZERO).await;

    client(&server.url, None).generate(&request()).await.unwrap();

    assert!(server.requests()[0].authorization.is_none());
}

#[tokio::test]
async fn test_null_insight_is_none() {
    let server = spawn_generator(200, json!({"success": true, "insight": null}), Duration::ZERO).await;

    let report = client(&server.url, None).generate(&request()).await.unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn test_null_overview_renders_placeholder() {
    let server = spawn_generator(200, json!({"overview": null}), Duration::ZERO).await;

    let report = client(&server.url, None).generate(&request()).await.unwrap();
    let lines = sextant::insight::render_report(report.as_ref());
    assert_eq!(lines, vec![sextant::insight::EMPTY_PLACEHOLDER.to_string()]);
}

#[tokio::test]
async fn test_unauthorized_and_forbidden() {
    let unauthorized = spawn_generator(401, json!({"detail": "bad token"}), Duration::ZERO).await;
    let forbidden = spawn_generator(403, json!({"detail": "admins only"}), Duration::ZERO).await;

    assert_eq!(
        client(&unauthorized.url, Some("x")).generate(&request()).await,
        Err(InsightError::Unauthorized)
    );
    assert_eq!(
        client(&forbidden.url, Some("x")).generate(&request()).await,
        Err(InsightError::Forbidden)
    );
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let server = spawn_generator(500, json!({"detail": "model offline"}), Duration::ZERO).await;

    let err = client(&server.url, None).generate(&request()).await.unwrap_err();
    match err {
        InsightError::Http(msg) => {
            assert!(msg.starts_with("HTTP 500"));
            assert!(msg.contains("model offline"));
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_object_body_is_parse_error() {
    let server = spawn_generator(200, json!(["not", "a", "report"]), Duration::ZERO).await;

    let err = client(&server.url, None).generate(&request()).await.unwrap_err();
    assert!(matches!(err, InsightError::Parse(_)));
}

#[tokio::test]
async fn test_slow_generator_times_out() {
    let server = spawn_generator(200, json!({"insight": null}), Duration::from_secs(3)).await;
    let generator =
        HttpInsightGenerator::new(&server.url, None, Duration::from_millis(200)).unwrap();

    let err = generator.generate(&request()).await.unwrap_err();
    assert_eq!(err, InsightError::Timeout);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    // Port 9 (discard) is closed on test machines
    let generator =
        HttpInsightGenerator::new("http://127.0.0.1:9/insights", None, Duration::from_secs(2)).unwrap();

    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err, InsightError::Http(_)));
}
