use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{Criterion, CriterionId, CycleStatus, QuestionConfig};

/// Largest weight accepted for a single criterion.
pub const MAX_CRITERION_WEIGHT: f64 = 10.0;

/// Errors raised while defining or changing criteria.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriterionError {
    #[error("criterion name must not be blank")]
    BlankName,
    #[error("criterion weight must be greater than zero (found {0})")]
    NonPositiveWeight(f64),
    #[error("criterion weight must be at most {max} (found {found})")]
    WeightOutOfRange { max: f64, found: f64 },
    #[error("{kind} question needs at least one option")]
    MissingOptions { kind: &'static str },
    #[error("option '{0}' is listed more than once")]
    DuplicateOption(String),
    #[error("criteria can only change while the cycle is DRAFT (cycle is {})", .0.label())]
    CycleLocked(CycleStatus),
    #[error("criterion is referenced by submitted nominations and cannot be deleted")]
    Referenced,
}

/// Inbound criterion definition as entered by HR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionDraft {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub config: Option<QuestionConfig>,
}

fn default_active() -> bool {
    true
}

impl CriterionDraft {
    /// Validate the draft into a criterion with the assigned id.
    pub fn validate(self, id: CriterionId) -> Result<Criterion, CriterionError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CriterionError::BlankName);
        }

        check_weight(self.weight)?;

        let config = self.config.map(normalize_config).transpose()?;
        let description = self
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        Ok(Criterion {
            id,
            name,
            weight: self.weight,
            description,
            is_active: self.is_active,
            config,
        })
    }
}

fn check_weight(weight: f64) -> Result<(), CriterionError> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(CriterionError::NonPositiveWeight(weight));
    }
    if weight > MAX_CRITERION_WEIGHT {
        return Err(CriterionError::WeightOutOfRange {
            max: MAX_CRITERION_WEIGHT,
            found: weight,
        });
    }
    Ok(())
}

fn normalize_config(config: QuestionConfig) -> Result<QuestionConfig, CriterionError> {
    let kind = config.kind();
    match config {
        QuestionConfig::SingleSelect { options, required } => Ok(QuestionConfig::SingleSelect {
            options: normalize_options(options, kind)?,
            required,
        }),
        QuestionConfig::MultiSelect { options, required } => Ok(QuestionConfig::MultiSelect {
            options: normalize_options(options, kind)?,
            required,
        }),
        other => Ok(other),
    }
}

fn normalize_options(options: Vec<String>, kind: &'static str) -> Result<Vec<String>, CriterionError> {
    let mut seen = BTreeSet::new();
    let mut normalized = Vec::with_capacity(options.len());
    for option in options {
        let option = option.trim().to_string();
        if option.is_empty() {
            continue;
        }
        if !seen.insert(option.clone()) {
            return Err(CriterionError::DuplicateOption(option));
        }
        normalized.push(option);
    }
    if normalized.is_empty() {
        return Err(CriterionError::MissingOptions { kind });
    }
    Ok(normalized)
}

/// Partial update for an existing criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionUpdate {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Criterion {
    /// Apply an update; weight and active flag may only change while the cycle is DRAFT.
    pub fn apply_update(
        &mut self,
        update: CriterionUpdate,
        cycle_status: CycleStatus,
    ) -> Result<(), CriterionError> {
        if cycle_status != CycleStatus::Draft {
            return Err(CriterionError::CycleLocked(cycle_status));
        }
        if let Some(weight) = update.weight {
            check_weight(weight)?;
            self.weight = weight;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        Ok(())
    }
}

/// Deletion is only possible in DRAFT cycles and never once nominations reference the criterion.
pub fn ensure_deletable(cycle_status: CycleStatus, referenced: bool) -> Result<(), CriterionError> {
    if cycle_status != CycleStatus::Draft {
        return Err(CriterionError::CycleLocked(cycle_status));
    }
    if referenced {
        return Err(CriterionError::Referenced);
    }
    Ok(())
}
