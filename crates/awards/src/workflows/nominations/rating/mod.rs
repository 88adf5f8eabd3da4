//! Weighted rating aggregation.
//!
//! A reviewer assigns each active criterion a rating between zero and the
//! criterion's weight. The overall nomination rating is the sum of ratings
//! divided by the sum of weights, scaled to `0..=scale` (ten by default).
//!
//! Two entry points share the arithmetic:
//!
//! * [`RatingAggregator::preview`] never fails. Missing, blank, and
//!   unparseable inputs count as zero and out-of-range values are clamped,
//!   so forms can show a live score while the reviewer is typing.
//! * [`RatingAggregator::authoritative`] validates strictly first and
//!   refuses to produce a value when any rating is missing or out of range.

mod input;
mod validation;

pub use input::{collect_reviews, ParsedRating, RatingInput, ReviewEntry, ReviewInputs};
pub use validation::{
    validate_reviews, MissingRating, RatingProblem, RatingViolation, ReviewError,
};

use super::domain::{Criterion, CriterionReview, NominationRatingResult};

pub const DEFAULT_RATING_SCALE: f64 = 10.0;

/// Stateless aggregator parameterised by the upper bound of the overall rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregator {
    scale: f64,
}

impl Default for RatingAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_RATING_SCALE)
    }
}

impl RatingAggregator {
    pub fn new(scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            DEFAULT_RATING_SCALE
        };
        Self { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Lenient aggregate for live previews.
    pub fn preview<'a, I>(&self, criteria: I, reviews: &ReviewInputs) -> NominationRatingResult
    where
        I: IntoIterator<Item = &'a Criterion>,
    {
        self.aggregate(criteria, |criterion, weight| {
            let rating = match reviews.get(&criterion.id).map(RatingInput::parse) {
                Some(ParsedRating::Value(value)) => value,
                Some(ParsedRating::Unset | ParsedRating::Invalid(_)) | None => 0.0,
            };
            rating.min(weight).max(0.0)
        })
    }

    /// Strictly validated aggregate, used for the value recorded with an approval.
    pub fn authoritative<'a, I>(
        &self,
        criteria: I,
        reviews: &ReviewInputs,
    ) -> Result<(NominationRatingResult, Vec<CriterionReview>), ReviewError>
    where
        I: IntoIterator<Item = &'a Criterion> + Clone,
    {
        let accepted = validate_reviews(criteria.clone(), reviews)?;
        let result = self.aggregate(criteria, |criterion, _| {
            accepted
                .iter()
                .find(|review| review.criteria_id == criterion.id)
                .map(|review| review.rating)
                .unwrap_or(0.0)
        });
        Ok((result, accepted))
    }

    fn aggregate<'a, I, F>(&self, criteria: I, mut rating_for: F) -> NominationRatingResult
    where
        I: IntoIterator<Item = &'a Criterion>,
        F: FnMut(&Criterion, f64) -> f64,
    {
        let mut total_weighted_rating = 0.0;
        let mut total_weight = 0.0;

        for criterion in criteria.into_iter().filter(|c| c.is_active) {
            let weight = criterion.effective_weight();
            total_weighted_rating += rating_for(criterion, weight);
            total_weight += weight;
        }

        if total_weight == 0.0 {
            return NominationRatingResult::ZERO;
        }

        NominationRatingResult {
            total_rating: (total_weighted_rating / total_weight) * self.scale,
            total_weight,
        }
    }
}

/// Preview aggregate on the default 0-10 scale.
pub fn compute_total_rating(criteria: &[Criterion], reviews: &ReviewInputs) -> NominationRatingResult {
    RatingAggregator::default().preview(criteria, reviews)
}
