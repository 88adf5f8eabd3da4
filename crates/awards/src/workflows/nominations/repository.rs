use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Criterion, CriterionId, CriterionReview, Cycle, CycleId, CycleStatus, Nomination,
    NominationId, Role, UserId,
};

/// Decision taken on a nomination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    pub const fn label(self) -> &'static str {
        match self {
            DecisionAction::Approve => "APPROVE",
            DecisionAction::Reject => "REJECT",
        }
    }
}

/// Audit entry stored for every approval or rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub nomination_id: NominationId,
    pub action: DecisionAction,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<f64>,
    #[serde(default)]
    pub criteria_reviews: Vec<CriterionReview>,
    pub decided_at: DateTime<Utc>,
}

/// Storage abstraction so the approval service can be exercised in isolation.
pub trait NominationRepository: Send + Sync {
    fn cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError>;
    fn criteria(&self, cycle_id: &CycleId) -> Result<Vec<Criterion>, RepositoryError>;
    fn nomination(&self, id: &NominationId) -> Result<Option<Nomination>, RepositoryError>;
    fn nominations_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Nomination>, RepositoryError>;
    /// Store a newly submitted nomination. Existing ids are a `Conflict`.
    fn insert_nomination(&self, nomination: Nomination) -> Result<(), RepositoryError>;
    /// Persist the decided nomination together with its decision record.
    ///
    /// Compare-and-set: within one critical section the stored nomination must
    /// still be `PENDING`, otherwise nothing is written and the call returns
    /// `Conflict`. Unknown nominations are `NotFound`.
    fn record_decision(
        &self,
        nomination: Nomination,
        record: ApprovalRecord,
    ) -> Result<(), RepositoryError>;
    fn approvals(&self, nomination_id: &NominationId) -> Result<Vec<ApprovalRecord>, RepositoryError>;
    /// Move a cycle from `expected` to `next`. Returns `Conflict` when the
    /// stored status is no longer `expected`.
    fn update_cycle_status(
        &self,
        cycle_id: &CycleId,
        expected: CycleStatus,
        next: CycleStatus,
    ) -> Result<Cycle, RepositoryError>;
    /// Insert or replace a criterion of a cycle, keyed by criterion id.
    fn save_criterion(&self, cycle_id: &CycleId, criterion: Criterion) -> Result<(), RepositoryError>;
    fn remove_criterion(
        &self,
        cycle_id: &CycleId,
        criterion_id: &CriterionId,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook informing nominees and submitters of decisions.
pub trait DecisionNotifier: Send + Sync {
    fn publish(&self, notice: DecisionNotice) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNotice {
    pub template: String,
    pub nomination_id: NominationId,
    pub recipients: Vec<UserId>,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
