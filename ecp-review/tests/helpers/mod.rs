//! Shared builders and an in-memory review API for the review client tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ecp_common::api::{ReprocessItem, ReviewSnapshot};
use ecp_common::models::{
    ActivityCategory, Project, ProjectEvent, ProjectStatus, ReprocessStatus, ResultRow,
    VerificationStatus,
};
use ecp_review::{ReviewApi, ReviewError, ReviewResult};
use uuid::Uuid;

pub fn project_id() -> Uuid {
    Uuid::from_u128(0x5eed)
}

pub fn project(status: ProjectStatus) -> Project {
    Project {
        id: project_id(),
        owner_id: "alice".to_string(),
        name: "Chantier Nord".to_string(),
        status,
        batch_id: "batch_20260101_000000_abcd1234".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        archived_at: None,
        created_by_email: Some("alice@example.com".to_string()),
    }
}

pub fn row(id: i64, requires_verification: bool) -> ResultRow {
    ResultRow {
        id,
        project_id: project_id(),
        batch_id: None,
        category: Some(ActivityCategory::Fret),
        activity: Some(format!("Activité {}", id)),
        supplier: None,
        total_price_eur: None,
        quantity: None,
        quantity_unit: None,
        emission_factor: None,
        factor_unit: None,
        factor_source: None,
        factor_database: None,
        total_emission: None,
        emission_unit: Some("kgCO2e".to_string()),
        factor_found: true,
        requires_verification,
        verification_status: VerificationStatus::Unverified,
        reprocess_status: ReprocessStatus::Empty,
        comment: None,
    }
}

pub fn priced(mut r: ResultRow, price: Option<f64>, emission: Option<f64>) -> ResultRow {
    r.total_price_eur = price;
    r.total_emission = emission;
    r
}

pub fn in_category(mut r: ResultRow, category: ActivityCategory) -> ResultRow {
    r.category = Some(category);
    r
}

pub fn snapshot(status: ProjectStatus, rows: Vec<ResultRow>) -> ReviewSnapshot {
    ReviewSnapshot {
        project: project(status),
        rows,
    }
}

pub fn ids<'a>(rows: impl IntoIterator<Item = &'a ResultRow>) -> Vec<i64> {
    rows.into_iter().map(|r| r.id).collect()
}

/// Review API backed by one mutable snapshot
///
/// Records calls, tracks concurrent fetches and can be switched to fail.
pub struct FakeApi {
    snapshot: Mutex<ReviewSnapshot>,
    fetch_delay: Duration,
    pub snapshot_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub fail_polls: AtomicBool,
    pub fail_reprocess: AtomicBool,
    pub validated: Mutex<Vec<Vec<i64>>>,
    pub reprocessed: Mutex<Vec<ReprocessItem>>,
}

impl FakeApi {
    pub fn new(snapshot: ReviewSnapshot) -> Self {
        Self::with_delay(snapshot, Duration::ZERO)
    }

    pub fn with_delay(snapshot: ReviewSnapshot, fetch_delay: Duration) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            fetch_delay,
            snapshot_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_polls: AtomicBool::new(false),
            fail_reprocess: AtomicBool::new(false),
            validated: Mutex::new(Vec::new()),
            reprocessed: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn set_project_status(&self, status: ProjectStatus) {
        self.snapshot.lock().unwrap().project.status = status;
    }

    /// The automation answered for one row
    pub fn finish_reprocess(&self, id: i64, status: ReprocessStatus) {
        let mut snapshot = self.snapshot.lock().unwrap();
        if let Some(row) = snapshot.rows.iter_mut().find(|r| r.id == id) {
            row.reprocess_status = status;
        }
    }
}

#[async_trait]
impl ReviewApi for FakeApi {
    async fn snapshot(&self, _project_id: Uuid) -> ReviewResult<ReviewSnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(ReviewError::NetworkError("connection refused".to_string()));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn events(&self, _project_id: Uuid, _limit: i64) -> ReviewResult<Vec<ProjectEvent>> {
        Ok(Vec::new())
    }

    async fn validate(&self, _project_id: Uuid, ids: &[i64]) -> ReviewResult<u64> {
        self.validated.lock().unwrap().push(ids.to_vec());
        let mut snapshot = self.snapshot.lock().unwrap();
        let mut updated = 0;
        for row in snapshot.rows.iter_mut() {
            if row.requires_verification && ids.contains(&row.id) {
                row.verification_status = VerificationStatus::Validated;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn reprocess(&self, _project_id: Uuid, items: Vec<ReprocessItem>) -> ReviewResult<usize> {
        if self.fail_reprocess.load(Ordering::SeqCst) {
            return Err(ReviewError::ApiError {
                status: 502,
                message: "workflow down".to_string(),
            });
        }
        let mut snapshot = self.snapshot.lock().unwrap();
        for item in &items {
            if let Some(row) = snapshot.rows.iter_mut().find(|r| r.id == item.id) {
                row.reprocess_status = ReprocessStatus::Processing;
                row.category = Some(item.category);
            }
        }
        self.reprocessed.lock().unwrap().extend(items.iter().cloned());
        Ok(items.len())
    }
}
