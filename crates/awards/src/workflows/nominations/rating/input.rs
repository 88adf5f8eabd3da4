use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::CriterionId;

/// Raw rating as typed by a reviewer: a number, a numeric string, or unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingInput {
    Number(f64),
    Text(String),
    #[default]
    Unset,
}

/// Interpretation of a [`RatingInput`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRating {
    Unset,
    Value(f64),
    Invalid(String),
}

impl RatingInput {
    pub fn parse(&self) -> ParsedRating {
        match self {
            RatingInput::Unset => ParsedRating::Unset,
            RatingInput::Number(value) if value.is_finite() => ParsedRating::Value(*value),
            RatingInput::Number(value) => ParsedRating::Invalid(value.to_string()),
            RatingInput::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return ParsedRating::Unset;
                }
                match trimmed.parse::<f64>() {
                    Ok(value) if value.is_finite() => ParsedRating::Value(value),
                    _ => ParsedRating::Invalid(trimmed.to_string()),
                }
            }
        }
    }

    /// Display form used in validation messages.
    pub fn display(&self) -> String {
        match self {
            RatingInput::Number(value) => value.to_string(),
            RatingInput::Text(raw) => raw.trim().to_string(),
            RatingInput::Unset => String::new(),
        }
    }
}

impl From<f64> for RatingInput {
    fn from(value: f64) -> Self {
        RatingInput::Number(value)
    }
}

impl From<&str> for RatingInput {
    fn from(value: &str) -> Self {
        RatingInput::Text(value.to_string())
    }
}

impl From<String> for RatingInput {
    fn from(value: String) -> Self {
        RatingInput::Text(value)
    }
}

/// Reviewer inputs keyed by criterion.
pub type ReviewInputs = BTreeMap<CriterionId, RatingInput>;

/// Wire shape of a single review entry (`{ criteria_id, rating }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub criteria_id: CriterionId,
    #[serde(default)]
    pub rating: RatingInput,
}

impl ReviewEntry {
    pub fn new(criteria_id: impl Into<String>, rating: impl Into<RatingInput>) -> Self {
        Self {
            criteria_id: CriterionId(criteria_id.into()),
            rating: rating.into(),
        }
    }
}

/// Collapse wire entries into a lookup map. Later entries for the same criterion win.
pub fn collect_reviews<I>(entries: I) -> ReviewInputs
where
    I: IntoIterator<Item = ReviewEntry>,
{
    entries
        .into_iter()
        .map(|entry| (entry.criteria_id, entry.rating))
        .collect()
}
