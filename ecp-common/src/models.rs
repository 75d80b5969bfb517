//! Domain models shared by the API service and the review client
//!
//! Projects move through a small status machine; result rows carry the
//! verification and reprocessing state the review workflow mutates.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{Error, Result};

// ========================================
// Projects
// ========================================

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Processing,
    Ready,
    Locked,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Processing => "processing",
            ProjectStatus::Ready => "ready",
            ProjectStatus::Locked => "locked",
            ProjectStatus::Failed => "failed",
        }
    }

    /// Label shown in project listings
    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Processing => "En cours",
            ProjectStatus::Ready => "Prêt",
            ProjectStatus::Locked => "Terminé",
            ProjectStatus::Failed => "Erreur",
        }
    }

    /// Whether moving from `self` to `next` is allowed
    ///
    /// Same-state moves are always allowed (idempotent). `Locked` is terminal.
    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Processing, Ready)
                | (Processing, Failed)
                | (Ready, Locked)
                | (Ready, Failed)
                | (Failed, Processing)
                | (Failed, Ready)
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(ProjectStatus::Processing),
            "ready" => Ok(ProjectStatus::Ready),
            "locked" => Ok(ProjectStatus::Locked),
            "failed" | "error" => Ok(ProjectStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown project status: {}", other))),
        }
    }
}

/// Project record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_by_email: Option<String>,
}

impl Project {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Maximum project name length (characters, after trimming)
pub const PROJECT_NAME_MAX_LEN: usize = 120;

/// Trim and validate a project name
pub fn validate_project_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Project name is required".to_string()));
    }
    if name.chars().count() > PROJECT_NAME_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Project name too long (max {} characters)",
            PROJECT_NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

/// Build a batch identifier: ISO timestamp with `:` and `.` replaced by `-`,
/// followed by the first 8 hex characters of a random UUID.
pub fn new_batch_id(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", stamp, &suffix[..8])
}

// ========================================
// Result rows
// ========================================

/// Closed set of activity categories
///
/// Serialized as the French display label, which is also the storage value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityCategory {
    #[serde(rename = "Achat matériel")]
    AchatMateriel,
    #[serde(rename = "Location matériel")]
    LocationMateriel,
    #[serde(rename = "Location véhicule")]
    LocationVehicule,
    #[serde(rename = "Fret")]
    Fret,
    #[serde(rename = "Energie")]
    Energie,
    #[serde(rename = "Prestation")]
    Prestation,
    #[serde(rename = "Assurance")]
    Assurance,
    #[serde(rename = "Annexe")]
    Annexe,
}

impl ActivityCategory {
    /// Canonical report order
    pub const ALL: [ActivityCategory; 8] = [
        ActivityCategory::AchatMateriel,
        ActivityCategory::LocationMateriel,
        ActivityCategory::LocationVehicule,
        ActivityCategory::Fret,
        ActivityCategory::Energie,
        ActivityCategory::Prestation,
        ActivityCategory::Assurance,
        ActivityCategory::Annexe,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ActivityCategory::AchatMateriel => "Achat matériel",
            ActivityCategory::LocationMateriel => "Location matériel",
            ActivityCategory::LocationVehicule => "Location véhicule",
            ActivityCategory::Fret => "Fret",
            ActivityCategory::Energie => "Energie",
            ActivityCategory::Prestation => "Prestation",
            ActivityCategory::Assurance => "Assurance",
            ActivityCategory::Annexe => "Annexe",
        }
    }

    /// URL/filename slug: accents stripped, lowercase, spaces to `-`
    pub fn slug(&self) -> String {
        slugify(self.label())
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActivityCategory {
    type Err = Error;

    /// Accepts the label or its slug, accent- and case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let wanted = slugify(s);
        ActivityCategory::ALL
            .iter()
            .copied()
            .find(|c| c.slug() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid category: {}", s.trim())))
    }
}

/// Lowercase, strip combining marks, collapse non-alphanumerics to `-`
pub fn slugify(s: &str) -> String {
    let folded: String = s
        .trim()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut out = String::with_capacity(folded.len());
    let mut dash = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Stored verification status of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Validated,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Validated => "validated",
        }
    }

    /// Label shown in the review table
    pub fn label(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "À valider",
            VerificationStatus::Validated => "Validée",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "unverified" | "à valider" | "a valider" => Ok(VerificationStatus::Unverified),
            "validated" | "validée" | "validee" => Ok(VerificationStatus::Validated),
            other => Err(Error::InvalidInput(format!("Unknown verification status: {}", other))),
        }
    }
}

/// Reprocessing status of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReprocessStatus {
    #[default]
    Empty,
    Processing,
    Done,
    Failed,
}

impl ReprocessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReprocessStatus::Empty => "empty",
            ReprocessStatus::Processing => "processing",
            ReprocessStatus::Done => "done",
            ReprocessStatus::Failed => "failed",
        }
    }

    /// `done` and `failed` end a reprocessing cycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReprocessStatus::Done | ReprocessStatus::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReprocessStatus::Empty => "",
            ReprocessStatus::Processing => "En cours",
            ReprocessStatus::Done => "Retraitée",
            ReprocessStatus::Failed => "Échec",
        }
    }
}

impl FromStr for ReprocessStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "empty" => Ok(ReprocessStatus::Empty),
            "processing" => Ok(ReprocessStatus::Processing),
            "done" => Ok(ReprocessStatus::Done),
            "failed" => Ok(ReprocessStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown reprocess status: {}", other))),
        }
    }
}

/// Where the matched emission factor came from, per the automation's marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorOrigin {
    /// Factor supplied by the supplier itself
    Supplier,
    /// Default insurance factor
    DefaultInsurance,
    /// Default monetary factor applied after an update
    DefaultMonetary,
    /// Anything else, including no marker
    Standard,
}

impl FactorOrigin {
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(|m| m.trim().to_lowercase()).as_deref() {
            Some("true (fournisseur fe)") => FactorOrigin::Supplier,
            Some("fe assurance") => FactorOrigin::DefaultInsurance,
            Some("default_monetary_update") | Some("monetary_update_default") => {
                FactorOrigin::DefaultMonetary
            }
            _ => FactorOrigin::Standard,
        }
    }
}

static MONETARY_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)kg\s*co2e\s*/\s*(k?euro|€|k€)").expect("static regex compiles")
});

/// Whether an emission-factor unit is per currency unit (kgCO2e/€, kgCO2e/k€, ...)
pub fn is_monetary_unit(unit: &str) -> bool {
    MONETARY_UNIT.is_match(unit)
}

/// One computed line item of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: i64,
    pub project_id: Uuid,
    pub batch_id: Option<String>,
    pub category: Option<ActivityCategory>,
    pub activity: Option<String>,
    pub supplier: Option<String>,
    pub total_price_eur: Option<f64>,
    pub quantity: Option<f64>,
    pub quantity_unit: Option<String>,
    pub emission_factor: Option<f64>,
    pub factor_unit: Option<String>,
    pub factor_source: Option<String>,
    pub factor_database: Option<String>,
    pub total_emission: Option<f64>,
    pub emission_unit: Option<String>,
    pub factor_found: bool,
    pub requires_verification: bool,
    pub verification_status: VerificationStatus,
    pub reprocess_status: ReprocessStatus,
    pub comment: Option<String>,
}

impl ResultRow {
    /// Verification status as the review workflow sees it
    ///
    /// Rows that do not require verification are always validated,
    /// whatever value is stored.
    pub fn effective_verification(&self) -> VerificationStatus {
        if self.requires_verification {
            self.verification_status
        } else {
            VerificationStatus::Validated
        }
    }

    /// Blocks the completion gate
    pub fn is_pending_verification(&self) -> bool {
        self.effective_verification() == VerificationStatus::Unverified
    }

    pub fn is_monetary(&self) -> bool {
        self.factor_unit.as_deref().map(is_monetary_unit).unwrap_or(false)
    }

    pub fn factor_origin(&self) -> FactorOrigin {
        FactorOrigin::from_marker(self.factor_source.as_deref())
    }

    /// Emission value in kgCO2e, missing counted as zero
    pub fn emission_kg(&self) -> f64 {
        self.total_emission.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Completion gate: every verification-required row is validated
pub fn all_verified(rows: &[ResultRow]) -> bool {
    !rows.iter().any(ResultRow::is_pending_verification)
}

/// Row payload accepted from the automation
///
/// Unknown fields are rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewResultRow {
    pub category: Option<ActivityCategory>,
    pub activity: Option<String>,
    pub supplier: Option<String>,
    pub total_price_eur: Option<f64>,
    pub quantity: Option<f64>,
    pub quantity_unit: Option<String>,
    pub emission_factor: Option<f64>,
    pub factor_unit: Option<String>,
    pub factor_source: Option<String>,
    pub factor_database: Option<String>,
    pub total_emission: Option<f64>,
    pub emission_unit: Option<String>,
    #[serde(default)]
    pub factor_found: bool,
    #[serde(default)]
    pub requires_verification: bool,
    pub comment: Option<String>,
}

// ========================================
// Events
// ========================================

/// Project event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Error,
    Info,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Progress => "progress",
            EventKind::Error => "error",
            EventKind::Info => "info",
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "progress" => Ok(EventKind::Progress),
            "error" => Ok(EventKind::Error),
            "info" => Ok(EventKind::Info),
            other => Err(Error::InvalidInput(format!("Unknown event kind: {}", other))),
        }
    }
}

/// Append-only status narration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEvent {
    pub id: i64,
    pub project_id: Uuid,
    pub batch_id: Option<String>,
    pub execution_id: Option<String>,
    pub kind: EventKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
