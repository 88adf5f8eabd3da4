use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::nominations::{
    ApprovalServiceError, CriterionError, RepositoryError, ReviewError, TransitionError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Criterion(CriterionError),
    Review(ReviewError),
    Transition(TransitionError),
    Approval(ApprovalServiceError),
    Repository(RepositoryError),
    Export(csv::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Criterion(err) => write!(f, "criterion error: {}", err),
            AppError::Review(err) => write!(f, "review error: {}", err),
            AppError::Transition(err) => write!(f, "cycle error: {}", err),
            AppError::Approval(err) => write!(f, "approval error: {}", err),
            AppError::Repository(err) => write!(f, "repository error: {}", err),
            AppError::Export(err) => write!(f, "ranking export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Criterion(err) => Some(err),
            AppError::Review(err) => Some(err),
            AppError::Transition(err) => Some(err),
            AppError::Approval(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Criterion(_)
            | AppError::Review(_)
            | AppError::Transition(_)
            | AppError::Approval(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Repository(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CriterionError> for AppError {
    fn from(value: CriterionError) -> Self {
        Self::Criterion(value)
    }
}

impl From<ReviewError> for AppError {
    fn from(value: ReviewError) -> Self {
        Self::Review(value)
    }
}

impl From<TransitionError> for AppError {
    fn from(value: TransitionError) -> Self {
        Self::Transition(value)
    }
}

impl From<ApprovalServiceError> for AppError {
    fn from(value: ApprovalServiceError) -> Self {
        Self::Approval(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_bad_request() {
        let response = AppError::from(CriterionError::NonPositiveWeight(0.0)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_errors_map_to_internal_error() {
        let response = AppError::from(ConfigError::InvalidPort).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::from(ConfigError::InvalidPort).to_string(),
            "configuration error: APP_PORT must be a valid u16"
        );
    }
}
