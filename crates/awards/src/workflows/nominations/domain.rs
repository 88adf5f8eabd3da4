use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for nomination cycles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CycleId(pub String);

/// Identifier wrapper for scoring criteria.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CriterionId(pub String);

impl CriterionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// Identifier wrapper for submitted nominations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NominationId(pub String);

/// Identifier wrapper for users (nominees, submitters, reviewers).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Organizational role, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    TeamLead,
    Manager,
    Hr,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Employee, Role::TeamLead, Role::Manager, Role::Hr];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::TeamLead => "TEAM_LEAD",
            Role::Manager => "MANAGER",
            Role::Hr => "HR",
        }
    }

    /// Parse the verbatim role string used by the REST API.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.label() == raw)
    }

    /// Whether this role sits at or above `required` in the hierarchy.
    pub fn at_least(self, required: Role) -> bool {
        self >= required
    }
}

/// Lifecycle state of a nomination cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Draft,
    Open,
    Closed,
    Finalized,
}

impl CycleStatus {
    pub const ALL: [CycleStatus; 4] = [
        CycleStatus::Draft,
        CycleStatus::Open,
        CycleStatus::Closed,
        CycleStatus::Finalized,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CycleStatus::Draft => "DRAFT",
            CycleStatus::Open => "OPEN",
            CycleStatus::Closed => "CLOSED",
            CycleStatus::Finalized => "FINALIZED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == raw)
    }

    /// Forward progression plus the two administrative corrections
    /// (`OPEN -> DRAFT`, `CLOSED -> OPEN`). FINALIZED is terminal.
    pub fn can_transition_to(self, next: CycleStatus) -> bool {
        matches!(
            (self, next),
            (CycleStatus::Draft, CycleStatus::Open)
                | (CycleStatus::Open, CycleStatus::Closed)
                | (CycleStatus::Closed, CycleStatus::Finalized)
                | (CycleStatus::Open, CycleStatus::Draft)
                | (CycleStatus::Closed, CycleStatus::Open)
        )
    }
}

/// Review state of a single nomination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NominationStatus {
    Pending,
    Approved,
    Rejected,
}

impl NominationStatus {
    pub const ALL: [NominationStatus; 3] = [
        NominationStatus::Pending,
        NominationStatus::Approved,
        NominationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            NominationStatus::Pending => "PENDING",
            NominationStatus::Approved => "APPROVED",
            NominationStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == raw)
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, NominationStatus::Pending)
    }
}

/// Time-boxed nomination period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub name: String,
    pub status: CycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Cycle {
    /// Move the cycle to `next`, rejecting changes the lifecycle does not permit.
    pub fn transition(&mut self, next: CycleStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Raised when a cycle status change is not part of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cycle cannot move from {} to {}", from.label(), to.label())]
pub struct TransitionError {
    pub from: CycleStatus,
    pub to: CycleStatus,
}

fn default_required() -> bool {
    true
}

fn default_active() -> bool {
    true
}

/// How a nominee answers a criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionConfig {
    Legacy {
        #[serde(default = "default_required")]
        required: bool,
    },
    Text {
        #[serde(default = "default_required")]
        required: bool,
    },
    SingleSelect {
        options: Vec<String>,
        #[serde(default = "default_required")]
        required: bool,
    },
    MultiSelect {
        options: Vec<String>,
        #[serde(default = "default_required")]
        required: bool,
    },
    TextWithImage {
        #[serde(default = "default_required")]
        required: bool,
        #[serde(default)]
        image_required: bool,
    },
}

impl QuestionConfig {
    pub fn required(&self) -> bool {
        match self {
            QuestionConfig::Legacy { required }
            | QuestionConfig::Text { required }
            | QuestionConfig::SingleSelect { required, .. }
            | QuestionConfig::MultiSelect { required, .. }
            | QuestionConfig::TextWithImage { required, .. } => *required,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            QuestionConfig::Legacy { .. } => "legacy",
            QuestionConfig::Text { .. } => "text",
            QuestionConfig::SingleSelect { .. } => "single_select",
            QuestionConfig::MultiSelect { .. } => "multi_select",
            QuestionConfig::TextWithImage { .. } => "text_with_image",
        }
    }
}

impl Default for QuestionConfig {
    fn default() -> Self {
        QuestionConfig::Legacy { required: true }
    }
}

/// Scored dimension of a nomination. `weight` is the maximum points a reviewer may assign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub name: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<QuestionConfig>,
}

impl Criterion {
    /// Weight usable as an upper bound; non-positive or non-finite weights count as zero.
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() && self.weight > 0.0 {
            self.weight
        } else {
            0.0
        }
    }

    pub fn question(&self) -> QuestionConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Reviewer's score for one criterion on one nomination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionReview {
    pub criteria_id: CriterionId,
    pub rating: f64,
}

/// Aggregate rating derived from per-criterion reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NominationRatingResult {
    pub total_rating: f64,
    pub total_weight: f64,
}

impl NominationRatingResult {
    pub const ZERO: NominationRatingResult = NominationRatingResult {
        total_rating: 0.0,
        total_weight: 0.0,
    };
}

/// Candidacy of an employee for a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nomination {
    pub id: NominationId,
    pub cycle_id: CycleId,
    pub nominee_user_id: UserId,
    pub submitted_by: UserId,
    pub status: NominationStatus,
    #[serde(default)]
    pub answers: Vec<NominationAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

/// Submitter's answer to one criterion. Legacy criteria use `score`/`comment`,
/// configured questions use `answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominationAnswer {
    pub criteria_id: CriterionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnswerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
