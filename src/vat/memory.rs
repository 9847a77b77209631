//! In-process VAT store.
//!
//! Used with `--memory` for offline runs and by the test suites. Drafts,
//! submissions and decisions live in ordered maps keyed by
//! [`ReportingPeriod`], so listings are deterministic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    ApiError, ApiResult, HealthStatus, ReportingPeriod, ValidationError, ValidationWarning, VatApi,
    VatDecision, VatDecisionList, VatDraft, VatDraftList, VatDraftRequest, VatSubmission,
    VatSubmissionList, VatValidation,
};

const STATUS_DRAFT: &str = "draft";
const STATUS_LOCKED: &str = "locked";

#[derive(Debug, Default)]
struct Store {
    drafts: BTreeMap<ReportingPeriod, VatDraft>,
    submissions: BTreeMap<ReportingPeriod, VatSubmission>,
    decisions: BTreeMap<ReportingPeriod, VatDecision>,
}

/// [`VatApi`] that keeps everything in memory.
#[derive(Debug)]
pub struct MemoryVatApi {
    store: RwLock<Store>,
    available: AtomicBool,
}

impl Default for MemoryVatApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVatApi {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Seeds a draft, replacing any draft with the same key.
    #[must_use]
    pub fn with_draft(mut self, draft: VatDraft) -> Self {
        self.store.get_mut().drafts.insert(draft.key(), draft);
        self
    }

    /// Seeds a submission.
    #[must_use]
    pub fn with_submission(mut self, submission: VatSubmission) -> Self {
        let key = ReportingPeriod::new(&submission.redovisare, &submission.period);
        self.store.get_mut().submissions.insert(key, submission);
        self
    }

    /// Seeds a decision.
    #[must_use]
    pub fn with_decision(mut self, decision: VatDecision) -> Self {
        let key = ReportingPeriod::new(&decision.redovisare, &decision.period);
        self.store.get_mut().decisions.insert(key, decision);
        self
    }

    /// Simulates an outage. While unavailable every call fails with
    /// [`ApiError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> ApiResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Unavailable)
        }
    }
}

fn draft_not_found(key: &ReportingPeriod) -> ApiError {
    ApiError::NotFound {
        what: format!("VAT draft {key}"),
    }
}

fn ensure_unlocked(draft: &VatDraft) -> ApiResult<()> {
    if draft.status.as_deref() == Some(STATUS_LOCKED) {
        return Err(ApiError::Conflict {
            message: format!("VAT draft {} is locked", draft.key()),
        });
    }
    Ok(())
}

/// Kronor to whole öre, rounding half away from zero.
#[allow(clippy::cast_possible_truncation)] // saturates outside the i64 range
fn to_ore(kronor: f64) -> i64 {
    (kronor * 100.0).round() as i64
}

#[allow(clippy::cast_precision_loss)] // exact below 2^53 öre
fn to_kronor(ore: i64) -> f64 {
    ore as f64 / 100.0
}

/// Recomputes the net amount from outgoing and incoming VAT.
///
/// The sum is taken in whole öre, so net amounts never carry binary
/// fractions of a cent.
fn settle(draft: &mut VatDraft) {
    let net = to_ore(draft.utgaende_moms.unwrap_or(0.0))
        .saturating_sub(to_ore(draft.ingaende_moms.unwrap_or(0.0)));
    if net >= 0 {
        draft.att_betala = Some(to_kronor(net));
        draft.att_faa_tillbaka = None;
    } else {
        draft.att_betala = None;
        draft.att_faa_tillbaka = Some(to_kronor(net.saturating_neg()));
    }
}

fn validate(draft: &VatDraft) -> VatValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (field, value) in [
        ("momsinkomst", draft.momsinkomst),
        ("utgaendeMoms", draft.utgaende_moms),
    ] {
        match value {
            None => errors.push(ValidationError {
                field: field.to_string(),
                message: format!("{field} is required"),
                code: Some("REQUIRED".to_string()),
            }),
            Some(amount) if amount < 0.0 => errors.push(ValidationError {
                field: field.to_string(),
                message: format!("{field} must not be negative"),
                code: Some("NEGATIVE".to_string()),
            }),
            Some(_) => {}
        }
    }

    match draft.ingaende_moms {
        None => warnings.push(ValidationWarning {
            field: "ingaendeMoms".to_string(),
            message: "ingaendeMoms is not set, no deduction will be made".to_string(),
        }),
        Some(amount) if amount < 0.0 => errors.push(ValidationError {
            field: "ingaendeMoms".to_string(),
            message: "ingaendeMoms must not be negative".to_string(),
            code: Some("NEGATIVE".to_string()),
        }),
        Some(_) => {}
    }

    VatValidation {
        valid: errors.is_empty(),
        errors: (!errors.is_empty()).then_some(errors),
        warnings: (!warnings.is_empty()).then_some(warnings),
    }
}

#[async_trait]
impl VatApi for MemoryVatApi {
    async fn ping(&self) -> ApiResult<HealthStatus> {
        self.check_available()?;
        Ok(HealthStatus {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: Some(format!("memory/{}", env!("CARGO_PKG_VERSION"))),
        })
    }

    async fn list_drafts(&self) -> ApiResult<VatDraftList> {
        self.check_available()?;
        let store = self.store.read().await;
        let drafts: Vec<VatDraft> = store.drafts.values().cloned().collect();
        Ok(VatDraftList {
            total: drafts.len(),
            drafts,
        })
    }

    async fn get_draft(&self, key: &ReportingPeriod) -> ApiResult<Option<VatDraft>> {
        self.check_available()?;
        Ok(self.store.read().await.drafts.get(key).cloned())
    }

    async fn upsert_draft(
        &self,
        key: &ReportingPeriod,
        request: &VatDraftRequest,
    ) -> ApiResult<VatDraft> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let now = Utc::now();

        let draft = store.drafts.entry(key.clone()).or_insert_with(|| {
            debug!(%key, "creating VAT draft");
            VatDraft {
                redovisare: key.redovisare.clone(),
                period: key.period.clone(),
                status: Some(STATUS_DRAFT.to_string()),
                skapad: Some(now),
                ..VatDraft::default()
            }
        });
        ensure_unlocked(draft)?;

        if let Some(amount) = request.momsinkomst {
            draft.momsinkomst = Some(amount);
        }
        if let Some(amount) = request.utgaende_moms {
            draft.utgaende_moms = Some(amount);
        }
        if let Some(amount) = request.ingaende_moms {
            draft.ingaende_moms = Some(amount);
        }
        if let Some(metadata) = &request.metadata {
            draft
                .metadata
                .get_or_insert_with(BTreeMap::new)
                .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        settle(draft);
        draft.uppdaterad = Some(now);

        Ok(draft.clone())
    }

    async fn delete_draft(&self, key: &ReportingPeriod) -> ApiResult<bool> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let Some(draft) = store.drafts.get(key) else {
            return Ok(false);
        };
        ensure_unlocked(draft)?;
        store.drafts.remove(key);
        Ok(true)
    }

    async fn validate_draft(&self, key: &ReportingPeriod) -> ApiResult<VatValidation> {
        self.check_available()?;
        let store = self.store.read().await;
        let draft = store.drafts.get(key).ok_or_else(|| draft_not_found(key))?;
        Ok(validate(draft))
    }

    async fn lock_draft(&self, key: &ReportingPeriod) -> ApiResult<()> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let draft = store
            .drafts
            .get_mut(key)
            .ok_or_else(|| draft_not_found(key))?;
        draft.status = Some(STATUS_LOCKED.to_string());
        draft.uppdaterad = Some(Utc::now());
        Ok(())
    }

    async fn unlock_draft(&self, key: &ReportingPeriod) -> ApiResult<()> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let draft = store
            .drafts
            .get_mut(key)
            .ok_or_else(|| draft_not_found(key))?;
        draft.status = Some(STATUS_DRAFT.to_string());
        draft.uppdaterad = Some(Utc::now());
        Ok(())
    }

    async fn list_submissions(&self) -> ApiResult<VatSubmissionList> {
        self.check_available()?;
        let store = self.store.read().await;
        let submissions: Vec<VatSubmission> = store.submissions.values().cloned().collect();
        Ok(VatSubmissionList {
            total: submissions.len(),
            submissions,
        })
    }

    async fn get_submission(&self, key: &ReportingPeriod) -> ApiResult<Option<VatSubmission>> {
        self.check_available()?;
        Ok(self.store.read().await.submissions.get(key).cloned())
    }

    async fn list_decisions(&self) -> ApiResult<VatDecisionList> {
        self.check_available()?;
        let store = self.store.read().await;
        let decisions: Vec<VatDecision> = store.decisions.values().cloned().collect();
        Ok(VatDecisionList {
            total: decisions.len(),
            decisions,
        })
    }

    async fn get_decision(&self, key: &ReportingPeriod) -> ApiResult<Option<VatDecision>> {
        self.check_available()?;
        Ok(self.store.read().await.decisions.get(key).cloned())
    }
}
