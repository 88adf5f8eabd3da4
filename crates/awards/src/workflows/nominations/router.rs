use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::answers::AnswerError;
use super::criteria::{CriterionDraft, CriterionError, CriterionUpdate};
use super::domain::{CriterionId, CycleId, CycleStatus, NominationId, Role};
use super::permissions::{self, Action, ActionContext};
use super::rating::{collect_reviews, ReviewEntry};
use super::repository::{DecisionNotifier, NominationRepository, RepositoryError};
use super::service::{
    Actor, ApprovalRequest, ApprovalServiceError, NominationApprovalService, NominationSubmission,
    RejectionRequest,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Body shared by the preview and validate endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRequest {
    pub cycle_id: CycleId,
    #[serde(default)]
    pub criteria_reviews: Vec<ReviewEntry>,
}

/// Body of the permission lookup. Fields stay raw strings so malformed values answer `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionQuery {
    pub action: String,
    pub role: String,
    #[serde(default)]
    pub cycle_status: Option<String>,
    #[serde(default)]
    pub nomination_status: Option<String>,
}

/// Body of `PATCH /cycles/:cycle_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStatusChange {
    pub status: CycleStatus,
}

/// Body of `POST /cycles/:cycle_id/criteria`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionCreate {
    pub id: CriterionId,
    #[serde(flatten)]
    pub draft: CriterionDraft,
}

/// Router builder exposing the rating, permission, nomination, cycle, and ranking endpoints.
pub fn nomination_router<R, N>(service: Arc<NominationApprovalService<R, N>>) -> Router
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    Router::new()
        .route("/api/v1/ratings/preview", post(preview_handler::<R, N>))
        .route("/api/v1/ratings/validate", post(validate_handler::<R, N>))
        .route("/api/v1/permissions/check", post(permission_handler))
        .route("/api/v1/nominations", post(submit_handler::<R, N>))
        .route("/api/v1/approvals/approve", post(approve_handler::<R, N>))
        .route("/api/v1/approvals/reject", post(reject_handler::<R, N>))
        .route(
            "/api/v1/nominations/:nomination_id/approvals",
            get(history_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id",
            patch(cycle_status_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/finalize",
            post(finalize_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/criteria",
            post(add_criterion_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/criteria/:criterion_id",
            patch(update_criterion_handler::<R, N>).delete(delete_criterion_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/rankings",
            get(rankings_handler::<R, N>),
        )
        .with_state(service)
}

pub(crate) async fn preview_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    axum::Json(request): axum::Json<RatingRequest>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let reviews = collect_reviews(request.criteria_reviews);
    match service.preview(&request.cycle_id, &reviews) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    axum::Json(request): axum::Json<RatingRequest>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let reviews = collect_reviews(request.criteria_reviews);
    match service.validate(&request.cycle_id, &reviews) {
        Ok((result, accepted)) => {
            let payload = json!({
                "total_rating": result.total_rating,
                "total_weight": result.total_weight,
                "criteria_reviews": accepted,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn permission_handler(axum::Json(query): axum::Json<PermissionQuery>) -> Response {
    let context = ActionContext::from_labels(
        query.cycle_status.as_deref(),
        query.nomination_status.as_deref(),
    );
    let allowed = Action::parse(&query.action)
        .map(|action| permissions::is_allowed_for(action, &query.role, &context))
        .unwrap_or(false);
    let payload = json!({
        "action": query.action,
        "role": query.role,
        "allowed": allowed,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<NominationSubmission>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.submit(&actor, submission) {
        Ok(nomination) => (StatusCode::CREATED, axum::Json(nomination)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cycle_status_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
    axum::Json(change): axum::Json<CycleStatusChange>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.update_cycle_status(&actor, &CycleId(cycle_id), change.status) {
        Ok(cycle) => (StatusCode::OK, axum::Json(cycle)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn finalize_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.finalize(&actor, &CycleId(cycle_id)) {
        Ok(cycle) => (StatusCode::OK, axum::Json(cycle)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_criterion_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
    axum::Json(request): axum::Json<CriterionCreate>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.add_criterion(&actor, &CycleId(cycle_id), request.id, request.draft) {
        Ok(criterion) => (StatusCode::CREATED, axum::Json(criterion)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_criterion_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    Path((cycle_id, criterion_id)): Path<(String, String)>,
    axum::Json(update): axum::Json<CriterionUpdate>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let criterion_id = CriterionId::new(criterion_id);
    match service.update_criterion(&actor, &CycleId(cycle_id), &criterion_id, update) {
        Ok(criterion) => (StatusCode::OK, axum::Json(criterion)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_criterion_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    Path((cycle_id, criterion_id)): Path<(String, String)>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let criterion_id = CriterionId::new(criterion_id);
    match service.delete_criterion(&actor, &CycleId(cycle_id), &criterion_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ApprovalRequest>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.approve(&actor, request) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<RejectionRequest>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.reject(&actor, request) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    Path(nomination_id): Path<String>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    match service.history(&NominationId(nomination_id)) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rankings_handler<R, N>(
    State(service): State<Arc<NominationApprovalService<R, N>>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
) -> Response
where
    R: NominationRepository + 'static,
    N: DecisionNotifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.rankings(&actor, &CycleId(cycle_id)) {
        Ok(table) => (StatusCode::OK, axum::Json(table)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Resolve the acting user. A missing id is 401; a role outside the hierarchy is 403.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let Some(user_id) = header_value(headers, USER_ID_HEADER) else {
        let payload = json!({ "error": format!("missing {USER_ID_HEADER} header") });
        return Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response());
    };
    let raw_role = header_value(headers, USER_ROLE_HEADER).unwrap_or_default();
    match Role::parse(raw_role) {
        Some(role) => Ok(Actor::new(user_id, role)),
        None => {
            let payload = json!({ "error": format!("unrecognised role '{raw_role}'") });
            Err((StatusCode::FORBIDDEN, axum::Json(payload)).into_response())
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn error_response(error: ApprovalServiceError) -> Response {
    match error {
        ApprovalServiceError::PermissionDenied(denied) => {
            let payload = json!({ "error": denied.to_string() });
            (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
        }
        ApprovalServiceError::Review(review) => {
            let payload = json!({
                "error": review.to_string(),
                "details": review,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ApprovalServiceError::Answers(AnswerError::Invalid { issues }) => {
            let payload = json!({
                "error": "nomination answers invalid",
                "details": issues,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        error @ (ApprovalServiceError::Transition(_)
        | ApprovalServiceError::Criterion(
            CriterionError::CycleLocked(_) | CriterionError::Referenced,
        )) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        error @ (ApprovalServiceError::MissingReason
        | ApprovalServiceError::MissingNominee
        | ApprovalServiceError::Criterion(_)
        | ApprovalServiceError::OverallRatingOutOfRange { .. }) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        error @ (ApprovalServiceError::NotFound(_)
        | ApprovalServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        error @ (ApprovalServiceError::InvalidState { .. }
        | ApprovalServiceError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
