use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{AnswerPayload, Criterion, CriterionId, NominationAnswer, QuestionConfig};

pub const LEGACY_SCORE_MIN: f64 = 1.0;
pub const LEGACY_SCORE_MAX: f64 = 10.0;

/// Problem found with one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerIssue {
    pub criteria_id: CriterionId,
    pub criterion_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum AnswerError {
    #[error("nomination answers invalid: {}", join_issues(.issues))]
    Invalid { issues: Vec<AnswerIssue> },
}

fn join_issues(issues: &[AnswerIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("'{}' {}", issue.criterion_name, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check every active criterion's answer against its question configuration.
pub fn validate_answers(
    criteria: &[Criterion],
    answers: &[NominationAnswer],
) -> Result<(), AnswerError> {
    let by_id: BTreeMap<&CriterionId, &NominationAnswer> = answers
        .iter()
        .map(|answer| (&answer.criteria_id, answer))
        .collect();

    let mut issues = Vec::new();
    for criterion in criteria.iter().filter(|c| c.is_active) {
        let answer = by_id.get(&criterion.id).copied();
        for message in check_answer(&criterion.question(), answer) {
            issues.push(AnswerIssue {
                criteria_id: criterion.id.clone(),
                criterion_name: criterion.name.clone(),
                message,
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AnswerError::Invalid { issues })
    }
}

fn check_answer(config: &QuestionConfig, answer: Option<&NominationAnswer>) -> Vec<String> {
    let payload = answer.and_then(|a| a.answer.as_ref());
    let mut messages = Vec::new();

    match config {
        QuestionConfig::Legacy { required } => match answer.and_then(|a| a.score) {
            None if *required => messages.push("score is required".to_string()),
            None => {}
            Some(score) => {
                if score.fract() != 0.0
                    || !(LEGACY_SCORE_MIN..=LEGACY_SCORE_MAX).contains(&score)
                {
                    messages.push(format!(
                        "score {score} must be a whole number from {LEGACY_SCORE_MIN} to {LEGACY_SCORE_MAX}"
                    ));
                }
            }
        },
        QuestionConfig::Text { required } => {
            if *required && blank(payload.and_then(|p| p.text.as_deref())) {
                messages.push("this field is required".to_string());
            }
        }
        QuestionConfig::SingleSelect { options, required } => {
            match payload.and_then(|p| p.selected.as_deref()).map(str::trim) {
                None | Some("") => {
                    if *required {
                        messages.push("please select an option".to_string());
                    }
                }
                Some(choice) => {
                    if !options.iter().any(|option| option == choice) {
                        messages.push(format!("'{choice}' is not one of the options"));
                    }
                }
            }
        }
        QuestionConfig::MultiSelect { options, required } => {
            let selected = payload.map(|p| p.selected_list.as_slice()).unwrap_or_default();
            if *required && selected.is_empty() {
                messages.push("please select at least one option".to_string());
            }
            for choice in selected {
                if !options.iter().any(|option| option == choice) {
                    messages.push(format!("'{choice}' is not one of the options"));
                }
            }
        }
        QuestionConfig::TextWithImage {
            required,
            image_required,
        } => {
            if *required && blank(payload.and_then(|p| p.text.as_deref())) {
                messages.push("this field is required".to_string());
            }
            check_image(payload, *image_required, &mut messages);
        }
    }

    messages
}

fn check_image(payload: Option<&AnswerPayload>, image_required: bool, messages: &mut Vec<String>) {
    match payload.and_then(|p| p.image_url.as_deref()).map(str::trim) {
        None | Some("") => {
            if image_required {
                messages.push("image URL is required".to_string());
            }
        }
        Some(url) => {
            let has_host = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .map(|rest| !rest.is_empty())
                .unwrap_or(false);
            if !has_host {
                messages.push(
                    "image URL must start with http:// or https://".to_string(),
                );
            }
        }
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map(|text| text.trim().is_empty()).unwrap_or(true)
}
