//! Nomination review workflow: weighted ratings, role and status permissions,
//! approvals, and cycle rankings.

pub mod answers;
pub mod criteria;
pub mod domain;
pub mod permissions;
pub mod rankings;
pub mod rating;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use answers::{validate_answers, AnswerError, AnswerIssue};
pub use criteria::{CriterionDraft, CriterionError, CriterionUpdate};
pub use domain::{
    AnswerPayload, Criterion, CriterionId, CriterionReview, Cycle, CycleId, CycleStatus,
    Nomination, NominationAnswer, NominationId, NominationRatingResult, NominationStatus,
    QuestionConfig, Role, TransitionError, UserId,
};
pub use permissions::{is_allowed, is_allowed_for, Action, ActionContext, PermissionDenied};
pub use rankings::{rank_nominations, RankingEntry, RankingTable};
pub use rating::{
    collect_reviews, compute_total_rating, RatingAggregator, RatingInput, ReviewEntry,
    ReviewError, ReviewInputs,
};
pub use repository::{
    ApprovalRecord, DecisionAction, DecisionNotice, DecisionNotifier, NominationRepository,
    NotificationError, RepositoryError,
};
pub use router::nomination_router;
pub use service::{
    Actor, ApprovalRequest, ApprovalServiceError, NominationApprovalService, NominationSubmission,
    RejectionRequest,
};
pub use session::{AuthEvent, AuthEventSink, SessionClaims, SessionMonitor};
