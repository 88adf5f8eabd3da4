//! Role and status rules for every mutating action.
//!
//! One table answers "may role R perform action A on an entity in state S".
//! Lookups are pure and total: anything the table does not grant, including
//! unknown roles and missing context, is simply `false`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{CycleStatus, NominationStatus, Role};

/// Mutating actions gated by the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CreateCycle,
    EditCycle,
    DeleteCycle,
    ManageCriteria,
    SubmitNomination,
    ApproveNomination,
    RejectNomination,
    ComputeRankings,
    FinalizeCycle,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::CreateCycle,
        Action::EditCycle,
        Action::DeleteCycle,
        Action::ManageCriteria,
        Action::SubmitNomination,
        Action::ApproveNomination,
        Action::RejectNomination,
        Action::ComputeRankings,
        Action::FinalizeCycle,
        Action::ManageUsers,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Action::CreateCycle => "CREATE_CYCLE",
            Action::EditCycle => "EDIT_CYCLE",
            Action::DeleteCycle => "DELETE_CYCLE",
            Action::ManageCriteria => "MANAGE_CRITERIA",
            Action::SubmitNomination => "SUBMIT_NOMINATION",
            Action::ApproveNomination => "APPROVE_NOMINATION",
            Action::RejectNomination => "REJECT_NOMINATION",
            Action::ComputeRankings => "COMPUTE_RANKINGS",
            Action::FinalizeCycle => "FINALIZE_CYCLE",
            Action::ManageUsers => "MANAGE_USERS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.label() == raw)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entity state relevant to an action. Only the field the action cares about is consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    #[serde(default)]
    pub cycle_status: Option<CycleStatus>,
    #[serde(default)]
    pub nomination_status: Option<NominationStatus>,
}

impl ActionContext {
    pub const fn none() -> Self {
        Self {
            cycle_status: None,
            nomination_status: None,
        }
    }

    pub const fn cycle(status: CycleStatus) -> Self {
        Self {
            cycle_status: Some(status),
            nomination_status: None,
        }
    }

    pub const fn nomination(status: NominationStatus) -> Self {
        Self {
            cycle_status: None,
            nomination_status: Some(status),
        }
    }

    /// Build a context from the verbatim API strings. Unrecognised values are treated as absent.
    pub fn from_labels(cycle_status: Option<&str>, nomination_status: Option<&str>) -> Self {
        Self {
            cycle_status: cycle_status.and_then(CycleStatus::parse),
            nomination_status: nomination_status.and_then(NominationStatus::parse),
        }
    }
}

/// State an entity must be in for an action to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRequirement {
    Any,
    Cycle(&'static [CycleStatus]),
    Nomination(&'static [NominationStatus]),
}

impl StatusRequirement {
    fn satisfied_by(self, context: &ActionContext) -> bool {
        match self {
            StatusRequirement::Any => true,
            StatusRequirement::Cycle(allowed) => context
                .cycle_status
                .map(|status| allowed.contains(&status))
                .unwrap_or(false),
            StatusRequirement::Nomination(allowed) => context
                .nomination_status
                .map(|status| allowed.contains(&status))
                .unwrap_or(false),
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRule {
    pub roles: &'static [Role],
    pub requirement: StatusRequirement,
}

const HR_ONLY: &[Role] = &[Role::Hr];
const REVIEWERS: &[Role] = &[Role::Manager, Role::Hr];
const NOMINATORS: &[Role] = &[Role::TeamLead, Role::Manager, Role::Hr];

const PENDING: &[NominationStatus] = &[NominationStatus::Pending];
const DRAFT: &[CycleStatus] = &[CycleStatus::Draft];
const OPEN: &[CycleStatus] = &[CycleStatus::Open];
const CLOSED: &[CycleStatus] = &[CycleStatus::Closed];
const EDITABLE: &[CycleStatus] = &[CycleStatus::Draft, CycleStatus::Open, CycleStatus::Closed];

/// The authoritative policy.
pub const fn rule_for(action: Action) -> PermissionRule {
    let (roles, requirement) = match action {
        Action::CreateCycle => (HR_ONLY, StatusRequirement::Any),
        Action::EditCycle => (HR_ONLY, StatusRequirement::Cycle(EDITABLE)),
        Action::DeleteCycle => (HR_ONLY, StatusRequirement::Cycle(DRAFT)),
        Action::ManageCriteria => (HR_ONLY, StatusRequirement::Cycle(DRAFT)),
        Action::SubmitNomination => (NOMINATORS, StatusRequirement::Cycle(OPEN)),
        Action::ApproveNomination => (REVIEWERS, StatusRequirement::Nomination(PENDING)),
        Action::RejectNomination => (REVIEWERS, StatusRequirement::Nomination(PENDING)),
        Action::ComputeRankings => (REVIEWERS, StatusRequirement::Cycle(CLOSED)),
        Action::FinalizeCycle => (HR_ONLY, StatusRequirement::Cycle(CLOSED)),
        Action::ManageUsers => (HR_ONLY, StatusRequirement::Any),
    };
    PermissionRule { roles, requirement }
}

/// Whether `role` is one of the roles the action is granted to, ignoring entity state.
pub fn role_permits(action: Action, role: Role) -> bool {
    rule_for(action).roles.contains(&role)
}

/// Whether `role` may perform `action` on an entity described by `context`.
pub fn is_allowed(action: Action, role: Role, context: &ActionContext) -> bool {
    let rule = rule_for(action);
    rule.roles.contains(&role) && rule.requirement.satisfied_by(context)
}

/// [`is_allowed`] for a role string straight from a token or request. Unknown roles are denied.
pub fn is_allowed_for(action: Action, role: &str, context: &ActionContext) -> bool {
    Role::parse(role)
        .map(|role| is_allowed(action, role, context))
        .unwrap_or(false)
}

/// Raised by callers that turn a denied lookup into an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("role {role} may not perform {action}")]
pub struct PermissionDenied {
    pub action: Action,
    pub role: String,
}

/// Fallible form of [`is_allowed`] for service code paths.
pub fn ensure_allowed(
    action: Action,
    role: Role,
    context: &ActionContext,
) -> Result<(), PermissionDenied> {
    if is_allowed(action, role, context) {
        Ok(())
    } else {
        Err(PermissionDenied {
            action,
            role: role.label().to_string(),
        })
    }
}

/// Actions a role may currently perform given `context`, in declaration order.
pub fn allowed_actions(role: Role, context: &ActionContext) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| is_allowed(*action, role, context))
        .collect()
}
