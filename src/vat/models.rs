//! Records exchanged with the VAT declaration API.
//!
//! Field names follow the downstream API's JSON (Swedish, camelCase):
//! `redovisare` is the reporting entity (personal or organisation number),
//! `period` the reporting period such as `2024-01`.
//!
//! Amounts are kronor carried as JSON numbers. Net amounts computed locally
//! are rounded to whole öre.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies one declaration: a reporter and a reporting period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportingPeriod {
    /// Tax reporter ID (personnummer/organisationsnummer).
    pub redovisare: String,
    /// Reporting period, e.g. `2024-01`.
    pub period: String,
}

impl ReportingPeriod {
    /// Creates a reporting period key.
    #[must_use]
    pub fn new(redovisare: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            redovisare: redovisare.into(),
            period: period.into(),
        }
    }
}

impl std::fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.redovisare, self.period)
    }
}

/// A VAT declaration draft.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatDraft {
    /// Tax reporter ID.
    pub redovisare: String,
    /// Reporting period.
    pub period: String,
    /// Sales subject to VAT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momsinkomst: Option<f64>,
    /// Outgoing VAT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utgaende_moms: Option<f64>,
    /// Incoming (deductible) VAT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingaende_moms: Option<f64>,
    /// Net amount to pay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub att_betala: Option<f64>,
    /// Net amount to get back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub att_faa_tillbaka: Option<f64>,
    /// Draft status (`draft`, `locked`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skapad: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uppdaterad: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl VatDraft {
    /// Returns the key of this draft.
    #[must_use]
    pub fn key(&self) -> ReportingPeriod {
        ReportingPeriod::new(&self.redovisare, &self.period)
    }
}

/// Body of a create-or-update draft call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatDraftRequest {
    /// Sales subject to VAT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momsinkomst: Option<f64>,
    /// Outgoing VAT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utgaende_moms: Option<f64>,
    /// Incoming VAT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingaende_moms: Option<f64>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

/// Outcome of validating a draft.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VatValidation {
    /// Whether the draft passed validation.
    pub valid: bool,
    /// Blocking problems.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
    /// Non-blocking remarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<ValidationWarning>>,
}

/// A blocking validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Offending field.
    pub field: String,
    /// Description.
    pub message: String,
    /// Machine-readable code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A non-blocking validation remark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Field concerned.
    pub field: String,
    /// Description.
    pub message: String,
}

/// All drafts of the authenticated user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VatDraftList {
    /// The drafts.
    #[serde(default)]
    pub drafts: Vec<VatDraft>,
    /// Number of drafts.
    #[serde(default)]
    pub total: usize,
}

/// A submitted declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VatSubmission {
    /// Tax reporter ID.
    pub redovisare: String,
    /// Reporting period.
    pub period: String,
    /// Submission date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlamningsdatum: Option<DateTime<Utc>>,
    /// Processing status.
    #[serde(default)]
    pub status: String,
    /// Receipt number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvittonummer: Option<String>,
    /// Declared amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub belopp: Option<f64>,
}

/// All submissions of the authenticated user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VatSubmissionList {
    /// The submissions.
    #[serde(default)]
    pub submissions: Vec<VatSubmission>,
    /// Number of submissions.
    #[serde(default)]
    pub total: usize,
}

/// A tax decision on a declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VatDecision {
    /// Tax reporter ID.
    pub redovisare: String,
    /// Reporting period.
    pub period: String,
    /// Decision date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beslutsdatum: Option<DateTime<Utc>>,
    /// Decision status.
    #[serde(default)]
    pub status: String,
    /// Decided amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub belopp: Option<f64>,
    /// Explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beskrivning: Option<String>,
}

/// All decisions for the authenticated user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VatDecisionList {
    /// The decisions.
    #[serde(default)]
    pub decisions: Vec<VatDecision>,
    /// Number of decisions.
    #[serde(default)]
    pub total: usize,
}

/// API health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status word reported by the API.
    pub status: String,
    /// Server time of the check.
    pub timestamp: DateTime<Utc>,
    /// API version, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
