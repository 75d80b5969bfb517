//! Integration tests for ecp-api endpoints
//!
//! Tests cover:
//! - Health and build info (no auth)
//! - Bearer authentication and project ownership
//! - Project registry: create, list, rename, archive/restore, lock
//! - Storage signing gateway
//! - Automation callbacks and batch notification
//! - Result listing, review snapshot, bulk validation, events

mod helpers;

use axum::http::StatusCode;
use ecp_common::api::ReviewSnapshot;
use ecp_common::models::{all_verified, ProjectStatus, VerificationStatus};
use helpers::{sample_row, TestServer, ALICE_TOKEN, BOB_TOKEN, BUCKET, N8N_SECRET};
use serde_json::json;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let server = TestServer::start().await;

    let res = server.send("GET", "/health", None, &[], None).await;
    assert_eq!(res.status, StatusCode::OK);

    let body = res.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ecp-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_no_auth_required() {
    let server = TestServer::start().await;

    let res = server.send("GET", "/api/buildinfo", None, &[], None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json()["git_hash"].is_string());
}

// =============================================================================
// Authentication and ownership
// =============================================================================

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let server = TestServer::start().await;

    let res = server.send("GET", "/api/projects", None, &[], None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"]["code"], "UNAUTHORIZED");

    let res = server.user("nope", "GET", "/api/projects", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = server
        .send(
            "POST",
            "/api/storage/sign-upload",
            None,
            &[],
            Some(json!({ "filename": "a.xlsx" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_not_found_and_forbidden_are_distinguished() {
    let server = TestServer::start().await;
    let id = server.create_project("Chantier A").await;

    let res = server
        .user(BOB_TOKEN, "GET", &format!("/api/projects/{}", id), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let unknown = uuid::Uuid::new_v4();
    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}", unknown), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = server
        .user(ALICE_TOKEN, "GET", "/api/projects/not-a-uuid", None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_every_project_endpoint_checks_ownership() {
    let server = TestServer::start().await;
    let id = server.create_project("Chantier A").await;

    let gets = [
        format!("/api/projects/{}/results", id),
        format!("/api/projects/{}/prevalidation", id),
        format!("/api/projects/{}/events", id),
        format!("/api/projects/{}/results.xlsx", id),
        format!("/api/projects/{}/results_synthese.pdf", id),
        format!("/api/projects/{}/results_synthese.html", id),
    ];
    for uri in &gets {
        let res = server.user(BOB_TOKEN, "GET", uri, None).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "GET {}", uri);
    }

    let res = server
        .user(
            BOB_TOKEN,
            "POST",
            &format!("/api/projects/{}/validation", id),
            Some(json!({ "ids": [1] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = server
        .user(
            BOB_TOKEN,
            "PATCH",
            &format!("/api/projects/{}", id),
            Some(json!({ "archived": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Project registry
// =============================================================================

#[tokio::test]
async fn test_create_project_validates_name() {
    let server = TestServer::start().await;

    let res = server
        .user(ALICE_TOKEN, "POST", "/api/projects", Some(json!({ "name": "   " })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let long = "x".repeat(121);
    let res = server
        .user(ALICE_TOKEN, "POST", "/api/projects", Some(json!({ "name": long })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            "/api/projects",
            Some(json!({ "name": "  Chantier Nord  " })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["projectName"], "Chantier Nord");
    let batch = body["batchId"].as_str().unwrap();
    assert!(!batch.contains(':') && !batch.contains('.'));
    assert_eq!(batch.rsplit('_').next().unwrap().len(), 8);

    let res = server
        .user(
            ALICE_TOKEN,
            "GET",
            &format!("/api/projects/{}", body["projectId"].as_str().unwrap()),
            None,
        )
        .await;
    let project = &res.json()["project"];
    assert_eq!(project["status"], "processing");
    assert_eq!(project["owner_id"], "alice");
    assert_eq!(project["created_by_email"], "alice@example.com");
}

#[tokio::test]
async fn test_list_is_newest_first_and_per_owner() {
    let server = TestServer::start().await;
    let first = server.create_project("Premier").await;
    let second = server.create_project("Second").await;

    let res = server.user(ALICE_TOKEN, "GET", "/api/projects", None).await;
    let projects = res.json()["projects"].as_array().unwrap().clone();
    let ids: Vec<&str> = projects.iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let res = server.user(BOB_TOKEN, "GET", "/api/projects", None).await;
    assert!(res.json()["projects"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_archive_and_restore_keep_rows() {
    let server = TestServer::start().await;
    let id = server.create_project("Archivable").await;
    server
        .ingest(&id, (1..=4).map(|n| sample_row(n, false)).collect())
        .await;

    let res = server
        .user(
            ALICE_TOKEN,
            "PATCH",
            &format!("/api/projects/{}", id),
            Some(json!({ "archived": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json()["project"]["archived_at"].is_string());

    // Hidden from the default list, visible when asked for
    let res = server.user(ALICE_TOKEN, "GET", "/api/projects", None).await;
    assert!(res.json()["projects"].as_array().unwrap().is_empty());
    let res = server
        .user(ALICE_TOKEN, "GET", "/api/projects?archived=true", None)
        .await;
    assert_eq!(res.json()["projects"].as_array().unwrap().len(), 1);

    let res = server
        .user(
            ALICE_TOKEN,
            "PATCH",
            &format!("/api/projects/{}", id),
            Some(json!({ "archived": false })),
        )
        .await;
    assert!(res.json()["project"]["archived_at"].is_null());

    let res = server.user(ALICE_TOKEN, "GET", "/api/projects", None).await;
    assert_eq!(res.json()["projects"].as_array().unwrap().len(), 1);

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/results", id), None)
        .await;
    assert_eq!(res.json()["total"], 4);
}

#[tokio::test]
async fn test_patch_requires_a_field_and_validates_name() {
    let server = TestServer::start().await;
    let id = server.create_project("Avant").await;
    let uri = format!("/api/projects/{}", id);

    let res = server.user(ALICE_TOKEN, "PATCH", &uri, Some(json!({}))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "name": "" })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "name": " Après " })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["project"]["name"], "Après");
}

#[tokio::test]
async fn test_patch_applies_rename_and_archive_together() {
    let server = TestServer::start().await;
    let id = server.create_project("Avant").await;
    let uri = format!("/api/projects/{}", id);

    // An invalid name rejects the whole update, archival included
    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "name": "  ", "archived": true })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = server.user(ALICE_TOKEN, "GET", &uri, None).await;
    assert_eq!(res.json()["project"]["name"], "Avant");
    assert!(res.json()["project"]["archived_at"].is_null());

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "name": "Après", "archived": true })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["project"]["name"], "Après");
    assert!(res.json()["project"]["archived_at"].is_string());

    // Renaming alone leaves the archival timestamp in place
    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "name": "Encore" })))
        .await;
    assert_eq!(res.json()["project"]["name"], "Encore");
    assert!(res.json()["project"]["archived_at"].is_string());
}

// =============================================================================
// Malformed requests
// =============================================================================

fn assert_json_bad_request(res: &helpers::test_server::TestResponse) {
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res
        .header(axum::http::header::CONTENT_TYPE)
        .starts_with("application/json"));
    assert_eq!(res.json()["error"]["code"], "BAD_REQUEST");
    assert!(res.json()["error"]["message"].is_string());
}

#[tokio::test]
async fn test_malformed_user_requests_get_json_bad_request() {
    let server = TestServer::start().await;

    let res = server
        .user(ALICE_TOKEN, "POST", "/api/projects", Some(json!({})))
        .await;
    assert_json_bad_request(&res);

    let res = server
        .send_raw("POST", "/api/projects", Some(ALICE_TOKEN), &[], Some("{not json"))
        .await;
    assert_json_bad_request(&res);

    let res = server
        .user(ALICE_TOKEN, "GET", "/api/projects?archived=maybe", None)
        .await;
    assert_json_bad_request(&res);

    let id = server.create_project("Chantier A").await;
    let res = server
        .user(
            ALICE_TOKEN,
            "GET",
            &format!("/api/projects/{}/results?page=first", id),
            None,
        )
        .await;
    assert_json_bad_request(&res);
}

#[tokio::test]
async fn test_automation_callbacks_authenticate_before_reading_body() {
    let server = TestServer::start().await;

    for path in ["progress", "error", "status", "results"] {
        let uri = format!("/api/n8n/{}", path);

        let res = server
            .send("POST", &uri, None, &[], Some(json!({ "projectId": 5 })))
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);

        let res = server.send_raw("POST", &uri, None, &[], Some("garbage")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);

        let res = server
            .send_raw("POST", &uri, None, &[("x-n8n-token", N8N_SECRET)], Some("garbage"))
            .await;
        assert_json_bad_request(&res);
    }

    let res = server.n8n("results", json!({ "projectId": 5 })).await;
    assert_json_bad_request(&res);
}

#[tokio::test]
async fn test_lock_requires_ready_and_is_idempotent() {
    let server = TestServer::start().await;
    let id = server.create_project("Verrou").await;
    let uri = format!("/api/projects/{}/status", id);

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "status": "locked" })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    server.set_ready(&id).await;

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "status": "ready" })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "status": "locked" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["status"], "locked");
    assert_eq!(res.json()["already"], false);

    let res = server
        .user(ALICE_TOKEN, "PATCH", &uri, Some(json!({ "status": "locked" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["already"], true);
}

// =============================================================================
// Storage signing
// =============================================================================

#[tokio::test]
async fn test_sign_upload_builds_sanitized_path() {
    let server = TestServer::start().await;

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            "/api/storage/sign-upload",
            Some(json!({
                "filename": "Factures 2024.XLSX",
                "batchId": "B 1",
                "tag": "Achats",
                "projectName": "Chantier Nord"
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let body = res.json();
    assert_eq!(body["bucket"], BUCKET);
    let path = body["path"].as_str().unwrap();
    assert!(path.starts_with("uploads/chantier_nord/b_1/achats/"), "{}", path);
    assert!(path.ends_with(".xlsx"));
    assert_eq!(body["token"], "tok");
    assert_eq!(server.storage.uploads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sign_upload_defaults_and_rejects_extensions() {
    let server = TestServer::start().await;

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            "/api/storage/sign-upload",
            Some(json!({ "filename": "data.xlsb" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let path = res.json()["path"].as_str().unwrap().to_string();
    assert!(path.starts_with("uploads/sans_nom/no_batch/untagged/"), "{}", path);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            "/api/storage/sign-upload",
            Some(json!({ "filename": "notes.csv" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(server.storage.uploads.lock().unwrap().len() == 1);
}

#[tokio::test]
async fn test_sign_download_restrictions() {
    let server = TestServer::start().await;

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            "/api/storage/sign-download",
            Some(json!({ "path": "uploads/a/b/c/x.xlsx" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["expiresIn"], 600);
    assert_eq!(res.json()["bucket"], BUCKET);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            "/api/storage/sign-download",
            Some(json!({ "bucket": "private", "path": "x.xlsx" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    for bad in ["", "   ", "uploads/../secret.xlsx", "/etc/passwd"] {
        let res = server
            .user(
                ALICE_TOKEN,
                "POST",
                "/api/storage/sign-download",
                Some(json!({ "path": bad })),
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "path {:?}", bad);
    }
    assert_eq!(server.storage.downloads.lock().unwrap().len(), 1);
}

// =============================================================================
// Batch notification
// =============================================================================

#[tokio::test]
async fn test_notify_relays_signed_files_and_records_event() {
    let server = TestServer::start().await;
    let id = server.create_project("Notif").await;

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            &format!("/api/projects/{}/notify", id),
            Some(json!({
                "files": [
                    { "bucket": BUCKET, "path": "uploads/notif/b/t/1.xlsx", "originalName": "1.xlsx", "tag": "achats" },
                    { "bucket": BUCKET, "path": "uploads/notif/b/t/2.xlsx" }
                ]
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let batches = server.relay.batches.lock().unwrap().clone();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].files.len(), 2);
    assert!(batches[0].files[0].download_url.contains("uploads/notif/b/t/1.xlsx"));
    assert_eq!(batches[0].project_id.to_string(), id);

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/events", id), None)
        .await;
    let events = res.json()["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["kind"], "info");
}

#[tokio::test]
async fn test_notify_failure_fails_project() {
    let server = TestServer::start().await;
    let id = server.create_project("Notif KO").await;
    server.relay.set_failing(true);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            &format!("/api/projects/{}/notify", id),
            Some(json!({ "files": [ { "bucket": BUCKET, "path": "uploads/x.xlsx" } ] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.json()["error"]["code"], "UPSTREAM_ERROR");

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}", id), None)
        .await;
    assert_eq!(res.json()["project"]["status"], "failed");

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/events", id), None)
        .await;
    let events = res.json()["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["kind"], "error");
}

#[tokio::test]
async fn test_notify_rejects_empty_and_foreign_buckets() {
    let server = TestServer::start().await;
    let id = server.create_project("Notif").await;
    let uri = format!("/api/projects/{}/notify", id);

    let res = server
        .user(ALICE_TOKEN, "POST", &uri, Some(json!({ "files": [] })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            &uri,
            Some(json!({ "files": [ { "bucket": "other", "path": "x.xlsx" } ] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(server.relay.batches.lock().unwrap().is_empty());
}

// =============================================================================
// Automation callbacks
// =============================================================================

#[tokio::test]
async fn test_callbacks_require_token() {
    let server = TestServer::start().await;
    let id = server.create_project("Cb").await;

    let res = server
        .send(
            "POST",
            "/api/n8n/progress",
            None,
            &[],
            Some(json!({ "projectId": id, "message": "hello" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = server
        .send(
            "POST",
            "/api/n8n/results",
            None,
            &[("x-n8n-token", "wrong")],
            Some(json!({ "projectId": id, "rows": [] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_progress_resolves_project_from_execution() {
    let server = TestServer::start().await;
    let id = server.create_project("Exec").await;

    let res = server
        .n8n(
            "progress",
            json!({ "projectId": id, "batchId": "b-1", "executionId": "exec-42", "message": "Lecture des fichiers" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Only the execution id this time
    let res = server
        .n8n("progress", json!({ "executionId": "exec-42", "message": "Calcul" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = server
        .n8n("progress", json!({ "executionId": "exec-unknown", "message": "?" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server.n8n("progress", json!({ "projectId": id })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/events", id), None)
        .await;
    let events = res.json()["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["message"], "Calcul");
    assert_eq!(events[1]["batch_id"], "b-1");
    assert_eq!(events[1]["kind"], "progress");
}

#[tokio::test]
async fn test_error_callback_fails_project() {
    let server = TestServer::start().await;
    let id = server.create_project("Err").await;

    let res = server.n8n("error", json!({ "projectId": id })).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}", id), None)
        .await;
    assert_eq!(res.json()["project"]["status"], "failed");

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/events", id), None)
        .await;
    let events = res.json()["events"].as_array().unwrap().clone();
    assert_eq!(events[0]["message"], "Erreur inconnue (n8n)");
}

#[tokio::test]
async fn test_status_callback_enforces_transitions() {
    let server = TestServer::start().await;
    let id = server.create_project("Statut").await;

    let res = server
        .n8n("status", json!({ "projectId": id, "status": "locked" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .n8n("status", json!({ "projectId": id, "status": "ready" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["previous"], "processing");
}

#[tokio::test]
async fn test_ingestion_rejects_unknown_fields() {
    let server = TestServer::start().await;
    let id = server.create_project("Strict").await;

    let mut row = sample_row(1, false);
    row["surprise"] = json!(1);
    let res = server
        .n8n("results", json!({ "projectId": id, "rows": [sample_row(2, false), row] }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"]["code"], "BAD_REQUEST");

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/results", id), None)
        .await;
    assert_eq!(res.json()["total"], 0);
}

// =============================================================================
// Results, validation and events
// =============================================================================

#[tokio::test]
async fn test_results_are_paginated() {
    let server = TestServer::start().await;
    let id = server.create_project("Pages").await;
    server
        .ingest(&id, (1..=25).map(|n| sample_row(n, false)).collect())
        .await;

    let res = server
        .user(
            ALICE_TOKEN,
            "GET",
            &format!("/api/projects/{}/results?page=3&page_size=10", id),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["total"], 25);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["page"], 3);
    assert_eq!(body["rows"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_validation_only_touches_rows_requiring_it() {
    let server = TestServer::start().await;
    let id = server.create_project("Valid").await;
    server
        .ingest(&id, vec![sample_row(1, true), sample_row(2, false)])
        .await;

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("/api/projects/{}/prevalidation", id), None)
        .await;
    let snapshot: ReviewSnapshot = serde_json::from_slice(&res.body).unwrap();
    let ids: Vec<i64> = snapshot.rows.iter().map(|r| r.id).collect();

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            &format!("/api/projects/{}/validation", id),
            Some(json!({ "ids": ids })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["updated"], 1);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            &format!("/api/projects/{}/validation", id),
            Some(json!({ "ids": [] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_events_limit_and_order() {
    let server = TestServer::start().await;
    let id = server.create_project("Journal").await;
    for n in 1..=20 {
        server
            .n8n(
                "progress",
                json!({ "projectId": id, "message": format!("étape {}", n) }),
            )
            .await;
    }

    let uri = format!("/api/projects/{}/events", id);
    let res = server.user(ALICE_TOKEN, "GET", &uri, None).await;
    let events = res.json()["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 15);
    assert_eq!(events[0]["message"], "étape 6");
    assert_eq!(events[14]["message"], "étape 20");

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("{}?limit=3", uri), None)
        .await;
    let events = res.json()["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["message"], "étape 18");

    let res = server
        .user(ALICE_TOKEN, "GET", &format!("{}?limit=500", uri), None)
        .await;
    assert_eq!(res.json()["events"].as_array().unwrap().len(), 20);
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_end_to_end_review_gate() {
    let server = TestServer::start().await;

    // Create "Test"
    let res = server
        .user(ALICE_TOKEN, "POST", "/api/projects", Some(json!({ "name": "Test" })))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    let id = body["projectId"].as_str().unwrap().to_string();
    let batch = body["batchId"].as_str().unwrap().to_string();

    // Sign two uploads into the project's batch
    let mut paths = Vec::new();
    for (file, tag) in [("achats.xlsx", "achats"), ("energie.xls", "energie")] {
        let res = server
            .user(
                ALICE_TOKEN,
                "POST",
                "/api/storage/sign-upload",
                Some(json!({ "filename": file, "batchId": batch, "tag": tag, "projectName": "Test" })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
        paths.push(res.json()["path"].as_str().unwrap().to_string());
    }
    assert!(paths.iter().all(|p| p.starts_with("uploads/test/")));

    // Automation ingests 10 rows, 3 requiring verification, then marks ready
    let rows = (1..=10).map(|n| sample_row(n, n <= 3)).collect();
    server.ingest(&id, rows).await;
    server.set_ready(&id).await;

    let snapshot_uri = format!("/api/projects/{}/prevalidation", id);
    let res = server.user(ALICE_TOKEN, "GET", &snapshot_uri, None).await;
    let snapshot: ReviewSnapshot = serde_json::from_slice(&res.body).unwrap();
    assert_eq!(snapshot.project.status, ProjectStatus::Ready);
    assert_eq!(snapshot.rows.len(), 10);
    assert!(snapshot.rows[..3].iter().all(|r| r.requires_verification));
    assert!(!all_verified(&snapshot.rows));

    let pending: Vec<i64> = snapshot
        .rows
        .iter()
        .filter(|r| r.is_pending_verification())
        .map(|r| r.id)
        .collect();
    assert_eq!(pending.len(), 3);

    let res = server
        .user(
            ALICE_TOKEN,
            "POST",
            &format!("/api/projects/{}/validation", id),
            Some(json!({ "ids": pending })),
        )
        .await;
    assert_eq!(res.json()["updated"], 3);

    let res = server.user(ALICE_TOKEN, "GET", &snapshot_uri, None).await;
    let snapshot: ReviewSnapshot = serde_json::from_slice(&res.body).unwrap();
    assert!(all_verified(&snapshot.rows));
    assert!(snapshot
        .rows
        .iter()
        .all(|r| r.effective_verification() == VerificationStatus::Validated));
}
