//! Behavioral checks for the rating aggregator and the permission matrix through
//! the crate's public API.

use awards::workflows::nominations::domain::{CycleStatus, NominationStatus};
use awards::workflows::nominations::permissions::{allowed_actions, rule_for};
use awards::workflows::nominations::{
    collect_reviews, compute_total_rating, is_allowed, is_allowed_for, Action, ActionContext,
    Criterion, CriterionId, NominationRatingResult, RatingAggregator, ReviewEntry, ReviewError,
    ReviewInputs, Role,
};

fn criterion(id: &str, weight: f64) -> Criterion {
    Criterion {
        id: CriterionId::new(id),
        name: id.to_uppercase(),
        weight,
        description: None,
        is_active: true,
        config: None,
    }
}

fn reviews(entries: &[(&str, f64)]) -> ReviewInputs {
    collect_reviews(
        entries
            .iter()
            .map(|(id, rating)| ReviewEntry::new(*id, *rating)),
    )
}

#[test]
fn in_bound_reviews_stay_within_zero_and_ten() {
    let weights = [0.5, 1.0, 2.0, 3.5, 10.0];
    let criteria: Vec<Criterion> = weights
        .iter()
        .enumerate()
        .map(|(index, weight)| criterion(&format!("c{index}"), *weight))
        .collect();

    for step in 0..=4 {
        let fraction = f64::from(step) / 4.0;
        let inputs: Vec<(String, f64)> = criteria
            .iter()
            .map(|c| (c.id.0.clone(), c.weight * fraction))
            .collect();
        let borrowed: Vec<(&str, f64)> =
            inputs.iter().map(|(id, value)| (id.as_str(), *value)).collect();

        let result = compute_total_rating(&criteria, &reviews(&borrowed));
        assert!(
            (0.0..=10.0).contains(&result.total_rating),
            "rating {} out of range at fraction {fraction}",
            result.total_rating
        );
        assert!((result.total_rating - fraction * 10.0).abs() < 1e-9);
    }
}

#[test]
fn no_criteria_yields_zero() {
    let result = compute_total_rating(&[], &reviews(&[("ghost", 4.0)]));
    assert_eq!(result, NominationRatingResult::ZERO);
}

#[test]
fn raising_one_rating_never_lowers_the_total() {
    let criteria = vec![criterion("a", 4.0), criterion("b", 6.0)];
    let mut previous = f64::NEG_INFINITY;
    for tenth in 0..=40 {
        let a = f64::from(tenth) / 10.0;
        let result = compute_total_rating(&criteria, &reviews(&[("a", a), ("b", 3.0)]));
        assert!(result.total_rating >= previous);
        previous = result.total_rating;
    }
}

#[test]
fn perfect_scores_reach_ten() {
    let criteria = vec![criterion("a", 5.0), criterion("b", 5.0)];
    let result = compute_total_rating(&criteria, &reviews(&[("a", 5.0), ("b", 5.0)]));
    assert_eq!(result.total_rating, 10.0);
    assert_eq!(result.total_weight, 10.0);
}

#[test]
fn weighted_average_scales_to_ten() {
    let criteria = vec![criterion("a", 4.0), criterion("b", 6.0)];
    let result = compute_total_rating(&criteria, &reviews(&[("a", 2.0), ("b", 3.0)]));
    assert_eq!(result.total_rating, 5.0);
}

#[test]
fn missing_review_is_zero_in_preview_and_incomplete_on_submit() {
    let criteria = vec![criterion("a", 10.0)];
    let empty = ReviewInputs::new();

    let preview = compute_total_rating(&criteria, &empty);
    assert_eq!(preview.total_rating, 0.0);
    assert_eq!(preview.total_weight, 10.0);

    match RatingAggregator::default().authoritative(&criteria, &empty) {
        Err(ReviewError::IncompleteReview { missing }) => {
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].criteria_id, CriterionId::new("a"));
        }
        other => panic!("expected incomplete review, got {other:?}"),
    }
}

#[test]
fn over_weight_rating_is_rejected_on_submit_and_clamped_in_preview() {
    let criteria = vec![criterion("a", 5.0)];
    let over = reviews(&[("a", 7.0)]);

    let preview = compute_total_rating(&criteria, &over);
    assert_eq!(preview.total_rating, 10.0);

    let error = RatingAggregator::default()
        .authoritative(&criteria, &over)
        .expect_err("rating above the weight is refused");
    assert!(error.to_string().contains("[0, 5]"));
    match error {
        ReviewError::InvalidRatingInput { violations } => {
            assert_eq!((violations[0].min, violations[0].max), (0.0, 5.0));
        }
        other => panic!("expected invalid rating input, got {other:?}"),
    }
}

#[test]
fn approval_requires_reviewer_role_and_pending_status() {
    let pending = ActionContext::from_labels(None, Some("PENDING"));
    let approved = ActionContext::from_labels(None, Some("APPROVED"));

    assert!(!is_allowed_for(Action::ApproveNomination, "EMPLOYEE", &pending));
    assert!(is_allowed_for(Action::ApproveNomination, "MANAGER", &pending));
    assert!(!is_allowed_for(Action::ApproveNomination, "MANAGER", &approved));
}

#[test]
fn labels_are_matched_verbatim() {
    let pending = ActionContext::from_labels(None, Some("PENDING"));
    for role in ["MANAGER ", " MANAGER", "manager", "Manager"] {
        assert_eq!(Role::parse(role), None, "{role:?}");
        assert!(!is_allowed_for(Action::ApproveNomination, role, &pending));
    }

    let padded = ActionContext::from_labels(None, Some(" PENDING"));
    assert_eq!(padded.nomination_status, None);
    assert!(!is_allowed_for(Action::ApproveNomination, "MANAGER", &padded));
    assert_eq!(Action::parse("APPROVE_NOMINATION "), None);
}

#[test]
fn permission_lookup_is_total() {
    let roles = ["EMPLOYEE", "TEAM_LEAD", "MANAGER", "HR", "", "hr", "ROOT", "MANAGER "];
    let cycle_labels = [None, Some("DRAFT"), Some("OPEN"), Some("CLOSED"), Some("FINALIZED"), Some("??")];
    let nomination_labels = [None, Some("PENDING"), Some("APPROVED"), Some("REJECTED"), Some("x")];

    let mut granted = 0;
    for action in Action::ALL {
        for role in roles {
            for cycle in cycle_labels {
                for nomination in nomination_labels {
                    let context = ActionContext::from_labels(cycle, nomination);
                    if is_allowed_for(action, role, &context) {
                        granted += 1;
                        let parsed = Role::parse(role).expect("only known roles are granted");
                        assert!(rule_for(action).roles.contains(&parsed));
                    }
                }
            }
        }
    }
    assert!(granted > 0);
}

#[test]
fn hr_owns_cycle_administration() {
    let draft = ActionContext::cycle(CycleStatus::Draft);
    assert_eq!(
        allowed_actions(Role::Hr, &draft),
        vec![
            Action::CreateCycle,
            Action::EditCycle,
            Action::DeleteCycle,
            Action::ManageCriteria,
            Action::ManageUsers,
        ]
    );
    assert!(allowed_actions(Role::TeamLead, &draft).is_empty());

    let closed = ActionContext::cycle(CycleStatus::Closed);
    assert!(is_allowed(Action::ComputeRankings, Role::Manager, &closed));
    assert!(!is_allowed(Action::FinalizeCycle, Role::Manager, &closed));
    assert!(is_allowed(Action::FinalizeCycle, Role::Hr, &closed));
    assert!(!is_allowed(
        Action::EditCycle,
        Role::Hr,
        &ActionContext::cycle(CycleStatus::Finalized)
    ));
    assert!(!is_allowed(
        Action::RejectNomination,
        Role::Hr,
        &ActionContext::nomination(NominationStatus::Rejected)
    ));
}
