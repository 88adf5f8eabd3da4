use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::answers::{validate_answers, AnswerError};
use super::criteria::{ensure_deletable, CriterionDraft, CriterionError, CriterionUpdate};
use super::domain::{
    Criterion, CriterionId, CriterionReview, Cycle, CycleId, CycleStatus, Nomination,
    NominationAnswer, NominationId, NominationRatingResult, NominationStatus, Role,
    TransitionError, UserId,
};
use super::permissions::{self, Action, ActionContext};
use super::rankings::{rank_nominations, RankingTable};
use super::rating::{collect_reviews, RatingAggregator, ReviewEntry, ReviewError, ReviewInputs};
use super::repository::{
    ApprovalRecord, DecisionAction, DecisionNotice, DecisionNotifier, NominationRepository,
    NotificationError, RepositoryError,
};

/// Authenticated user performing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
        }
    }
}

/// Body of `POST /approvals/approve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub nomination_id: NominationId,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub criteria_reviews: Vec<ReviewEntry>,
}

/// Body of `POST /approvals/reject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRequest {
    pub nomination_id: NominationId,
    pub reason: String,
}

/// Body of `POST /nominations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominationSubmission {
    pub cycle_id: CycleId,
    pub nominee_user_id: UserId,
    #[serde(default)]
    pub answers: Vec<NominationAnswer>,
}

static NOMINATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_nomination_id() -> NominationId {
    let id = NOMINATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NominationId(format!("nom-{id:06}"))
}

/// Error raised by the approval service.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalServiceError {
    #[error(transparent)]
    PermissionDenied(#[from] permissions::PermissionDenied),
    #[error("{action} is not available while the {entity} is {status}")]
    InvalidState {
        action: Action,
        entity: &'static str,
        status: &'static str,
    },
    #[error("a reason is required")]
    MissingReason,
    #[error("a nominee is required")]
    MissingNominee,
    #[error("overall rating {value} must be within [0, {max}]")]
    OverallRatingOutOfRange { value: f64, max: f64 },
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Answers(#[from] AnswerError),
    #[error(transparent)]
    Criterion(#[from] CriterionError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Service composing the permission matrix, the rating aggregator, and storage.
pub struct NominationApprovalService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    aggregator: RatingAggregator,
}

impl<R, N> NominationApprovalService<R, N>
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, aggregator: RatingAggregator) -> Self {
        Self {
            repository,
            notifier,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> RatingAggregator {
        self.aggregator
    }

    /// Live preview of the overall rating for a cycle's active criteria.
    pub fn preview(
        &self,
        cycle_id: &CycleId,
        reviews: &ReviewInputs,
    ) -> Result<NominationRatingResult, ApprovalServiceError> {
        let criteria = self.active_criteria(cycle_id)?;
        Ok(self.aggregator.preview(&criteria, reviews))
    }

    /// Strict check of reviews against a cycle's active criteria without recording anything.
    pub fn validate(
        &self,
        cycle_id: &CycleId,
        reviews: &ReviewInputs,
    ) -> Result<(NominationRatingResult, Vec<CriterionReview>), ApprovalServiceError> {
        let criteria = self.active_criteria(cycle_id)?;
        Ok(self.aggregator.authoritative(&criteria, reviews)?)
    }

    /// Approve a pending nomination with strictly validated per-criterion ratings.
    pub fn approve(
        &self,
        actor: &Actor,
        request: ApprovalRequest,
    ) -> Result<ApprovalRecord, ApprovalServiceError> {
        let mut nomination =
            self.pending_nomination(actor, Action::ApproveNomination, &request.nomination_id)?;
        let reason = required_reason(&request.reason)?;
        let criteria = self.active_criteria(&nomination.cycle_id)?;

        let legacy = criteria.is_empty() && request.criteria_reviews.is_empty();
        let (rating, total_weight, criteria_reviews) = if legacy {
            let rating = match request.rating {
                Some(value) => Some(self.check_overall(value)?),
                None => None,
            };
            (rating, None, Vec::new())
        } else {
            let reviews = collect_reviews(request.criteria_reviews);
            let (result, accepted) = self.aggregator.authoritative(&criteria, &reviews)?;
            if let Some(submitted) = request.rating {
                if (submitted - result.total_rating).abs() > 1e-6 {
                    debug!(
                        nomination = %nomination.id.0,
                        submitted,
                        computed = result.total_rating,
                        "ignoring client supplied rating in favour of computed value"
                    );
                }
            }
            (Some(result.total_rating), Some(result.total_weight), accepted)
        };

        nomination.status = NominationStatus::Approved;
        nomination.rating = rating;

        let record = ApprovalRecord {
            nomination_id: nomination.id.clone(),
            action: DecisionAction::Approve,
            actor_id: actor.user_id.clone(),
            actor_role: actor.role,
            reason,
            rating,
            total_weight,
            criteria_reviews,
            decided_at: Utc::now(),
        };

        self.finish(nomination, record)
    }

    /// Reject a pending nomination.
    pub fn reject(
        &self,
        actor: &Actor,
        request: RejectionRequest,
    ) -> Result<ApprovalRecord, ApprovalServiceError> {
        let mut nomination =
            self.pending_nomination(actor, Action::RejectNomination, &request.nomination_id)?;
        let reason = required_reason(&request.reason)?;

        nomination.status = NominationStatus::Rejected;

        let record = ApprovalRecord {
            nomination_id: nomination.id.clone(),
            action: DecisionAction::Reject,
            actor_id: actor.user_id.clone(),
            actor_role: actor.role,
            reason,
            rating: None,
            total_weight: None,
            criteria_reviews: Vec::new(),
            decided_at: Utc::now(),
        };

        self.finish(nomination, record)
    }

    /// Decision history for a nomination.
    pub fn history(
        &self,
        nomination_id: &NominationId,
    ) -> Result<Vec<ApprovalRecord>, ApprovalServiceError> {
        if self.repository.nomination(nomination_id)?.is_none() {
            return Err(ApprovalServiceError::NotFound(format!(
                "nomination {}",
                nomination_id.0
            )));
        }
        Ok(self.repository.approvals(nomination_id)?)
    }

    /// Rank nominees of a closed cycle.
    pub fn rankings(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
    ) -> Result<RankingTable, ApprovalServiceError> {
        let cycle = self.cycle(cycle_id)?;

        authorize(
            actor,
            Action::ComputeRankings,
            &ActionContext::cycle(cycle.status),
            "cycle",
            cycle.status.label(),
        )?;

        let nominations = self.repository.nominations_for_cycle(cycle_id)?;
        let table = rank_nominations(cycle_id, &nominations, Utc::now());
        info!(
            cycle = %cycle_id.0,
            ranked = table.entries.len(),
            actor = %actor.user_id.0,
            "rankings computed"
        );
        Ok(table)
    }

    /// Submit a nomination into an open cycle after checking its answers.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: NominationSubmission,
    ) -> Result<Nomination, ApprovalServiceError> {
        let cycle = self.cycle(&submission.cycle_id)?;
        authorize(
            actor,
            Action::SubmitNomination,
            &ActionContext::cycle(cycle.status),
            "cycle",
            cycle.status.label(),
        )?;

        let nominee = submission.nominee_user_id.0.trim();
        if nominee.is_empty() {
            return Err(ApprovalServiceError::MissingNominee);
        }

        let criteria = self.active_criteria(&cycle.id)?;
        validate_answers(&criteria, &submission.answers)?;

        let nomination = Nomination {
            id: next_nomination_id(),
            cycle_id: cycle.id,
            nominee_user_id: UserId(nominee.to_string()),
            submitted_by: actor.user_id.clone(),
            status: NominationStatus::Pending,
            answers: submission.answers,
            rating: None,
        };
        self.repository.insert_nomination(nomination.clone())?;

        info!(
            nomination = %nomination.id.0,
            cycle = %nomination.cycle_id.0,
            submitted_by = %actor.user_id.0,
            "nomination submitted"
        );
        Ok(nomination)
    }

    /// Move a cycle through its lifecycle. Finalizing is gated separately from editing.
    pub fn update_cycle_status(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        next: CycleStatus,
    ) -> Result<Cycle, ApprovalServiceError> {
        let mut cycle = self.cycle(cycle_id)?;
        let action = if next == CycleStatus::Finalized {
            Action::FinalizeCycle
        } else {
            Action::EditCycle
        };
        authorize(
            actor,
            action,
            &ActionContext::cycle(cycle.status),
            "cycle",
            cycle.status.label(),
        )?;

        let current = cycle.status;
        cycle.transition(next)?;
        let stored = self.repository.update_cycle_status(cycle_id, current, next)?;

        info!(
            cycle = %cycle_id.0,
            from = current.label(),
            to = next.label(),
            actor = %actor.user_id.0,
            "cycle status changed"
        );
        Ok(stored)
    }

    /// Lock a closed cycle's results.
    pub fn finalize(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
    ) -> Result<Cycle, ApprovalServiceError> {
        self.update_cycle_status(actor, cycle_id, CycleStatus::Finalized)
    }

    /// Define a new criterion on a draft cycle.
    pub fn add_criterion(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        criterion_id: CriterionId,
        draft: CriterionDraft,
    ) -> Result<Criterion, ApprovalServiceError> {
        self.criteria_cycle(actor, cycle_id)?;
        if self.find_criterion(cycle_id, &criterion_id)?.is_some() {
            return Err(RepositoryError::Conflict.into());
        }

        let criterion = draft.validate(criterion_id)?;
        self.repository.save_criterion(cycle_id, criterion.clone())?;
        info!(
            cycle = %cycle_id.0,
            criterion = %criterion.id.0,
            weight = criterion.weight,
            "criterion added"
        );
        Ok(criterion)
    }

    pub fn update_criterion(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        criterion_id: &CriterionId,
        update: CriterionUpdate,
    ) -> Result<Criterion, ApprovalServiceError> {
        let cycle = self.criteria_cycle(actor, cycle_id)?;
        let mut criterion = self
            .find_criterion(cycle_id, criterion_id)?
            .ok_or_else(|| criterion_not_found(criterion_id))?;

        criterion.apply_update(update, cycle.status)?;
        self.repository.save_criterion(cycle_id, criterion.clone())?;
        Ok(criterion)
    }

    /// Remove a criterion no nomination has answered.
    pub fn delete_criterion(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        criterion_id: &CriterionId,
    ) -> Result<(), ApprovalServiceError> {
        let cycle = self.criteria_cycle(actor, cycle_id)?;
        if self.find_criterion(cycle_id, criterion_id)?.is_none() {
            return Err(criterion_not_found(criterion_id));
        }

        let referenced = self
            .repository
            .nominations_for_cycle(cycle_id)?
            .iter()
            .any(|nomination| {
                nomination
                    .answers
                    .iter()
                    .any(|answer| &answer.criteria_id == criterion_id)
            });
        ensure_deletable(cycle.status, referenced)?;

        self.repository.remove_criterion(cycle_id, criterion_id)?;
        info!(cycle = %cycle_id.0, criterion = %criterion_id.0, "criterion removed");
        Ok(())
    }

    fn cycle(&self, cycle_id: &CycleId) -> Result<Cycle, ApprovalServiceError> {
        self.repository
            .cycle(cycle_id)?
            .ok_or_else(|| ApprovalServiceError::NotFound(format!("cycle {}", cycle_id.0)))
    }

    fn criteria_cycle(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
    ) -> Result<Cycle, ApprovalServiceError> {
        let cycle = self.cycle(cycle_id)?;
        authorize(
            actor,
            Action::ManageCriteria,
            &ActionContext::cycle(cycle.status),
            "cycle",
            cycle.status.label(),
        )?;
        Ok(cycle)
    }

    fn find_criterion(
        &self,
        cycle_id: &CycleId,
        criterion_id: &CriterionId,
    ) -> Result<Option<Criterion>, RepositoryError> {
        Ok(self
            .repository
            .criteria(cycle_id)?
            .into_iter()
            .find(|criterion| &criterion.id == criterion_id))
    }

    fn pending_nomination(
        &self,
        actor: &Actor,
        action: Action,
        nomination_id: &NominationId,
    ) -> Result<Nomination, ApprovalServiceError> {
        let nomination = self.repository.nomination(nomination_id)?.ok_or_else(|| {
            ApprovalServiceError::NotFound(format!("nomination {}", nomination_id.0))
        })?;

        authorize(
            actor,
            action,
            &ActionContext::nomination(nomination.status),
            "nomination",
            nomination.status.label(),
        )?;
        Ok(nomination)
    }

    fn active_criteria(&self, cycle_id: &CycleId) -> Result<Vec<Criterion>, RepositoryError> {
        Ok(self
            .repository
            .criteria(cycle_id)?
            .into_iter()
            .filter(|criterion| criterion.is_active)
            .collect())
    }

    fn check_overall(&self, value: f64) -> Result<f64, ApprovalServiceError> {
        let max = self.aggregator.scale();
        if value.is_finite() && (0.0..=max).contains(&value) {
            Ok(value)
        } else {
            Err(ApprovalServiceError::OverallRatingOutOfRange { value, max })
        }
    }

    fn finish(
        &self,
        nomination: Nomination,
        record: ApprovalRecord,
    ) -> Result<ApprovalRecord, ApprovalServiceError> {
        let recipients = vec![
            nomination.nominee_user_id.clone(),
            nomination.submitted_by.clone(),
        ];
        self.repository.record_decision(nomination, record.clone())?;

        info!(
            nomination = %record.nomination_id.0,
            action = record.action.label(),
            actor = %record.actor_id.0,
            rating = ?record.rating,
            "nomination decision recorded"
        );

        let mut details = BTreeMap::new();
        details.insert("decision".to_string(), record.action.label().to_string());
        if let Some(rating) = record.rating {
            details.insert("rating".to_string(), format!("{rating:.2}"));
        }
        let template = match record.action {
            DecisionAction::Approve => "nomination_approved",
            DecisionAction::Reject => "nomination_rejected",
        };
        self.notifier.publish(DecisionNotice {
            template: template.to_string(),
            nomination_id: record.nomination_id.clone(),
            recipients,
            details,
        })?;

        Ok(record)
    }
}

/// Split a denied lookup into "wrong role" and "wrong state".
fn authorize(
    actor: &Actor,
    action: Action,
    context: &ActionContext,
    entity: &'static str,
    status: &'static str,
) -> Result<(), ApprovalServiceError> {
    if !permissions::role_permits(action, actor.role) {
        warn!(
            actor = %actor.user_id.0,
            role = actor.role.label(),
            action = action.label(),
            "permission denied"
        );
        return Err(permissions::PermissionDenied {
            action,
            role: actor.role.label().to_string(),
        }
        .into());
    }
    if !permissions::is_allowed(action, actor.role, context) {
        return Err(ApprovalServiceError::InvalidState {
            action,
            entity,
            status,
        });
    }
    Ok(())
}

fn criterion_not_found(criterion_id: &CriterionId) -> ApprovalServiceError {
    ApprovalServiceError::NotFound(format!("criterion {}", criterion_id.0))
}

fn required_reason(reason: &str) -> Result<String, ApprovalServiceError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        Err(ApprovalServiceError::MissingReason)
    } else {
        Ok(trimmed.to_string())
    }
}
