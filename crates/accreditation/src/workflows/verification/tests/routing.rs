use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::router::USER_HEADER;
use crate::workflows::vault::RETENTION_DAYS;
use crate::workflows::verification::VerificationStatus;
use chrono::Duration;

fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request")
}

fn empty_request(method: &str, uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_HEADER, user)
        .body(Body::empty())
        .expect("request")
}

fn income_payload(annual_income: u64) -> Value {
    json!({
        "type": "INCOME",
        "financials": {
            "annual_income": annual_income,
            "income_source": "Salary"
        },
        "attestation": true,
        "consent_to_verify": true
    })
}

#[tokio::test]
async fn create_requires_known_caller() {
    let harness = harness();

    let anonymous = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/verifications",
            None,
            income_payload(300_000),
        ))
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let unknown = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/verifications",
            Some("ext-stranger"),
            income_payload(300_000),
        ))
        .await
        .expect("route executes");
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_route_returns_created_view() {
    let harness = harness();

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/verifications",
            Some("ext-investor"),
            income_payload(300_000),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "PENDING");
    assert_eq!(payload["type"], "INCOME");
    assert_eq!(payload["owner"], investor().id.0);
}

#[tokio::test]
async fn create_route_maps_domain_errors() {
    let harness = harness();

    let ineligible = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/verifications",
            Some("ext-investor"),
            income_payload(150_000),
        ))
        .await
        .expect("route executes");
    assert_eq!(ineligible.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(ineligible).await;
    assert_eq!(payload["kind"], "eligibility");

    let created = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/verifications",
            Some("ext-investor"),
            income_payload(300_000),
        ))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/verifications",
            Some("ext-investor"),
            income_payload(300_000),
        ))
        .await
        .expect("route executes");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn review_route_requires_reviewer_role() {
    let harness = harness();
    let created = harness
        .service
        .create(&investor().id, income_submission(300_000))
        .expect("submission");
    let uri = format!("/api/v1/verifications/{}/status", created.id);
    let body = json!({ "status": "APPROVED", "reviewer_notes": "W-2s match" });

    let forbidden = harness
        .router()
        .oneshot(json_request("POST", &uri, Some("ext-investor"), body.clone()))
        .await
        .expect("route executes");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let approved = harness
        .router()
        .oneshot(json_request("POST", &uri, Some("ext-reviewer"), body))
        .await
        .expect("route executes");
    assert_eq!(approved.status(), StatusCode::OK);
    let payload = read_json_body(approved).await;
    assert_eq!(payload["status"], "APPROVED");
    assert!(payload["expires_at"].is_string());

    let status = harness
        .router()
        .oneshot(empty_request(
            "GET",
            "/api/v1/verifications/status",
            "ext-investor",
        ))
        .await
        .expect("route executes");
    assert_eq!(status.status(), StatusCode::OK);
    let payload = read_json_body(status).await;
    assert_eq!(payload["is_accredited"], true);
    assert_eq!(payload["history"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn get_route_hides_other_owners_requests() {
    let harness = harness();
    let created = harness
        .service
        .create(&investor().id, income_submission(300_000))
        .expect("submission");
    let uri = format!("/api/v1/verifications/{}", created.id);

    let other = harness
        .router()
        .oneshot(empty_request("GET", &uri, "ext-other"))
        .await
        .expect("route executes");
    assert_eq!(other.status(), StatusCode::NOT_FOUND);

    let reviewer = harness
        .router()
        .oneshot(empty_request("GET", &uri, "ext-reviewer"))
        .await
        .expect("route executes");
    assert_eq!(reviewer.status(), StatusCode::OK);

    let malformed = harness
        .router()
        .oneshot(empty_request(
            "GET",
            "/api/v1/verifications/not-a-uuid",
            "ext-investor",
        ))
        .await
        .expect("route executes");
    assert_eq!(malformed.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_route_conflicts_once_review_started() {
    let harness = harness();
    let created = harness
        .service
        .create(&investor().id, income_submission(300_000))
        .expect("submission");
    harness
        .service
        .update_status(
            &created.id,
            decision(VerificationStatus::InReview),
            &reviewer().id,
        )
        .expect("in review");

    let response = harness
        .router()
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/verifications/{}/cancel", created.id),
            "ext-investor",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn document_upload_and_reviewer_download_round_trip() {
    let harness = harness();
    let created = harness
        .service
        .create(&investor().id, income_submission(300_000))
        .expect("submission");
    let contents = b"%PDF-1.4 2025 W-2 wage statement".to_vec();

    let upload = harness
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/verifications/{}/documents", created.id),
            Some("ext-investor"),
            json!({
                "document_type": "W2",
                "file_name": "w2-2025.pdf",
                "mime_type": "application/pdf",
                "size": contents.len(),
                "content": STANDARD.encode(&contents),
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(upload.status(), StatusCode::CREATED);
    let metadata = read_json_body(upload).await;
    assert_eq!(metadata["scan_status"], "CLEAN");
    assert!(metadata.get("content").is_none());
    assert!(metadata.get("checksum").is_none());
    let document_id = metadata["id"].as_str().expect("document id").to_string();

    let listing = harness
        .router()
        .oneshot(empty_request(
            "GET",
            &format!("/api/v1/verifications/{}/documents", created.id),
            "ext-reviewer",
        ))
        .await
        .expect("route executes");
    assert_eq!(listing.status(), StatusCode::OK);
    assert_eq!(
        read_json_body(listing).await.as_array().map(Vec::len),
        Some(1)
    );

    let uri = format!("/api/v1/documents/{document_id}/content");
    let investor_download = harness
        .router()
        .oneshot(empty_request("GET", &uri, "ext-investor"))
        .await
        .expect("route executes");
    assert_eq!(investor_download.status(), StatusCode::FORBIDDEN);

    let download = harness
        .router()
        .oneshot(empty_request("GET", &uri, "ext-reviewer"))
        .await
        .expect("route executes");
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        download
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/pdf")
    );
    let body = axum::body::to_bytes(download.into_body(), 64 * 1024)
        .await
        .expect("read body");
    assert_eq!(body.as_ref(), contents.as_slice());
}

#[tokio::test]
async fn upload_route_rejects_unsupported_type() {
    let harness = harness();
    let created = harness
        .service
        .create(&investor().id, income_submission(300_000))
        .expect("submission");

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/verifications/{}/documents", created.id),
            Some("ext-investor"),
            json!({
                "document_type": "OTHER",
                "file_name": "notes.txt",
                "mime_type": "text/plain",
                "size": 5,
                "content": STANDARD.encode(b"hello"),
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn purge_route_is_admin_only() {
    let harness = harness();
    let created = harness
        .service
        .create(&investor().id, income_submission(300_000))
        .expect("submission");
    let uri = format!("/api/v1/verifications/{}", created.id);

    let reviewer = harness
        .router()
        .oneshot(empty_request("DELETE", &uri, "ext-reviewer"))
        .await
        .expect("route executes");
    assert_eq!(reviewer.status(), StatusCode::FORBIDDEN);

    let admin = harness
        .router()
        .oneshot(empty_request("DELETE", &uri, "ext-admin"))
        .await
        .expect("route executes");
    assert_eq!(admin.status(), StatusCode::OK);
    let payload = read_json_body(admin).await;
    assert_eq!(payload["documents_purged"], 0);
}

#[tokio::test]
async fn maintenance_sweep_is_admin_only_and_purges_expired_payloads() {
    let harness = harness();
    let owner = investor().id;
    let created = harness
        .service
        .create(&owner, income_submission(300_000))
        .expect("submission");
    let document = harness
        .vault
        .upload(pdf_upload(created.id, &owner))
        .expect("upload");
    harness.clock.advance(Duration::days(RETENTION_DAYS));

    let reviewer = harness
        .router()
        .oneshot(empty_request(
            "POST",
            "/api/v1/maintenance/sweep",
            "ext-reviewer",
        ))
        .await
        .expect("route executes");
    assert_eq!(reviewer.status(), StatusCode::FORBIDDEN);

    let admin = harness
        .router()
        .oneshot(empty_request(
            "POST",
            "/api/v1/maintenance/sweep?scan_limit=5",
            "ext-admin",
        ))
        .await
        .expect("route executes");
    assert_eq!(admin.status(), StatusCode::OK);
    let payload = read_json_body(admin).await;
    assert_eq!(payload, json!({ "purged": 1, "scanned": 0 }));
    assert!(harness.vault.retrieve(&document.id).is_err());
}

#[tokio::test]
async fn closed_store_maps_to_service_unavailable() {
    let harness = harness();
    harness.store.close();

    let response = harness
        .router()
        .oneshot(empty_request(
            "GET",
            "/api/v1/verifications/status",
            "ext-investor",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
