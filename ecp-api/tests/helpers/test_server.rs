//! Test server wrapper for integration tests
//!
//! Builds the real router over an in-memory database and fake collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use ecp_api::{build_router, AppState, Services};
use ecp_common::config::AppConfig;
use ecp_common::db::init_memory_database;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`

use super::fakes::{FakeIdentity, FakePdf, FakeRelay, FakeStorage, ALICE_TOKEN};

pub const N8N_SECRET: &str = "n8n-secret";
pub const REPROCESS_SECRET: &str = "reprocess-secret";
pub const BUCKET: &str = "raw";

pub fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        database_path: PathBuf::from(":memory:"),
        app_base_url: "https://ecp.test".to_string(),
        notify_webhook_url: "https://n8n.test/webhook/notify".to_string(),
        reprocess_webhook_url: "https://n8n.test/webhook/reprocess".to_string(),
        webhook_secret: "webhook-secret".to_string(),
        n8n_callback_secret: N8N_SECRET.to_string(),
        reprocess_callback_secret: REPROCESS_SECRET.to_string(),
        storage_url: "https://storage.test".to_string(),
        storage_anon_key: "anon".to_string(),
        storage_service_key: "service".to_string(),
        storage_bucket: BUCKET.to_string(),
        pdf_renderer_url: "https://pdf.test/render".to_string(),
    }
}

pub struct TestServer {
    pub router: Router,
    pub db: SqlitePool,
    pub storage: Arc<FakeStorage>,
    pub relay: Arc<FakeRelay>,
    pub pdf: Arc<FakePdf>,
}

/// Response status with the raw body and headers
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: header::HeaderName) -> String {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

impl TestServer {
    pub async fn start() -> Self {
        let db = init_memory_database()
            .await
            .expect("in-memory database should initialize");

        let storage = Arc::new(FakeStorage::default());
        let relay = Arc::new(FakeRelay::default());
        let pdf = Arc::new(FakePdf::default());

        let services = Services {
            identity: Arc::new(FakeIdentity::default()),
            storage: storage.clone(),
            relay: relay.clone(),
            pdf: pdf.clone(),
        };

        let state = AppState::new(db.clone(), test_config(), services);
        Self {
            router: build_router(state),
            db,
            storage,
            relay,
            pdf,
        }
    }

    /// Send a request; `token` becomes a bearer token, `headers` are extra headers
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let body = body.map(|b| b.to_string());
        self.send_raw(method, uri, token, headers, body.as_deref())
            .await
    }

    /// Send a request whose body is taken verbatim as JSON text
    pub async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Request as a user
    pub async fn user(
        &self,
        token: &str,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> TestResponse {
        self.send(method, uri, Some(token), &[], body).await
    }

    /// Automation callback carrying the shared token
    pub async fn n8n(&self, path: &str, body: Value) -> TestResponse {
        self.send(
            "POST",
            &format!("/api/n8n/{}", path),
            None,
            &[("x-n8n-token", N8N_SECRET)],
            Some(body),
        )
        .await
    }

    /// Create a project owned by Alice, returning its id
    pub async fn create_project(&self, name: &str) -> String {
        let res = self
            .user(ALICE_TOKEN, "POST", "/api/projects", Some(json!({ "name": name })))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        res.json()["projectId"].as_str().unwrap().to_string()
    }

    /// Deliver result rows for a project through the automation callback
    pub async fn ingest(&self, project_id: &str, rows: Vec<Value>) {
        let res = self
            .n8n("results", json!({ "projectId": project_id, "rows": rows }))
            .await;
        assert_eq!(res.status, StatusCode::OK, "ingest failed: {:?}", res.json());
    }

    pub async fn set_ready(&self, project_id: &str) {
        let res = self
            .n8n("status", json!({ "projectId": project_id, "status": "ready" }))
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

/// A result row as the automation delivers it
pub fn sample_row(n: usize, requires_verification: bool) -> Value {
    json!({
        "category": if n % 2 == 0 { "Fret" } else { "Energie" },
        "activity": format!("Activité {}", n),
        "supplier": "Fournisseur",
        "total_price_eur": 100.0 * n as f64,
        "quantity": n as f64,
        "quantity_unit": "km",
        "emission_factor": 0.5,
        "factor_unit": "kgCO2e/km",
        "factor_source": "true (fournisseur fe)",
        "factor_database": "Base Carbone",
        "total_emission": 0.5 * n as f64,
        "emission_unit": "kgCO2e",
        "factor_found": true,
        "requires_verification": requires_verification,
        "comment": null
    })
}
