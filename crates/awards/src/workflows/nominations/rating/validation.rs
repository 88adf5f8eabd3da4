use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::super::domain::{Criterion, CriterionId, CriterionReview};
use super::input::{ParsedRating, ReviewInputs};

/// Why a submitted rating was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingProblem {
    NotNumeric,
    Negative,
    ExceedsWeight,
}

/// Field-level error for one criterion on the submit path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingViolation {
    pub criteria_id: CriterionId,
    pub criterion_name: String,
    pub value: String,
    pub min: f64,
    pub max: f64,
    pub problem: RatingProblem,
}

impl fmt::Display for RatingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match self.problem {
            RatingProblem::NotNumeric => "is not a number",
            RatingProblem::Negative => "is negative",
            RatingProblem::ExceedsWeight => "exceeds the criterion weight",
        };
        write!(
            f,
            "'{}' rating '{}' {}; expected a value in [{}, {}]",
            self.criterion_name, self.value, detail, self.min, self.max
        )
    }
}

/// Active criterion left without a rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingRating {
    pub criteria_id: CriterionId,
    pub criterion_name: String,
}

/// Submit-path validation failures. Nothing is clamped on this path.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewError {
    #[error("invalid rating input: {}", join_violations(.violations))]
    InvalidRatingInput { violations: Vec<RatingViolation> },
    #[error("incomplete review: missing ratings for {}", join_missing(.missing))]
    IncompleteReview { missing: Vec<MissingRating> },
    #[error("reviews reference criteria outside the active set: {}", join_ids(.criteria_ids))]
    UnknownCriteria { criteria_ids: Vec<CriterionId> },
}

fn join_violations(violations: &[RatingViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_missing(missing: &[MissingRating]) -> String {
    missing
        .iter()
        .map(|entry| format!("'{}'", entry.criterion_name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_ids(ids: &[CriterionId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate every active criterion's rating strictly against `[0, weight]`.
///
/// Violations are reported before missing ratings, and both before stray
/// reviews for criteria that are not part of the active set.
pub fn validate_reviews<'a, I>(
    criteria: I,
    reviews: &ReviewInputs,
) -> Result<Vec<CriterionReview>, ReviewError>
where
    I: IntoIterator<Item = &'a Criterion>,
{
    let mut accepted = Vec::new();
    let mut violations = Vec::new();
    let mut missing = Vec::new();
    let mut known = BTreeSet::new();

    for criterion in criteria.into_iter().filter(|c| c.is_active) {
        known.insert(&criterion.id);
        let max = criterion.effective_weight();
        let parsed = reviews
            .get(&criterion.id)
            .map(|input| (input.display(), input.parse()));

        let (raw, value) = match parsed {
            None | Some((_, ParsedRating::Unset)) => {
                missing.push(MissingRating {
                    criteria_id: criterion.id.clone(),
                    criterion_name: criterion.name.clone(),
                });
                continue;
            }
            Some((raw, ParsedRating::Invalid(_))) => {
                violations.push(violation(criterion, raw, max, RatingProblem::NotNumeric));
                continue;
            }
            Some((raw, ParsedRating::Value(value))) => (raw, value),
        };

        if value < 0.0 {
            violations.push(violation(criterion, raw, max, RatingProblem::Negative));
        } else if value > max {
            violations.push(violation(criterion, raw, max, RatingProblem::ExceedsWeight));
        } else {
            accepted.push(CriterionReview {
                criteria_id: criterion.id.clone(),
                rating: value,
            });
        }
    }

    if !violations.is_empty() {
        return Err(ReviewError::InvalidRatingInput { violations });
    }
    if !missing.is_empty() {
        return Err(ReviewError::IncompleteReview { missing });
    }

    let unknown: Vec<CriterionId> = reviews
        .keys()
        .filter(|id| !known.contains(id))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(ReviewError::UnknownCriteria {
            criteria_ids: unknown,
        });
    }

    Ok(accepted)
}

fn violation(
    criterion: &Criterion,
    value: String,
    max: f64,
    problem: RatingProblem,
) -> RatingViolation {
    RatingViolation {
        criteria_id: criterion.id.clone(),
        criterion_name: criterion.name.clone(),
        value,
        min: 0.0,
        max,
        problem,
    }
}
