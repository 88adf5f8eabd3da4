use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::nominations::domain::{
    Criterion, CriterionId, Cycle, CycleId, CycleStatus, Nomination, NominationId,
    NominationStatus, UserId,
};
use crate::workflows::nominations::rating::{RatingAggregator, ReviewEntry};
use crate::workflows::nominations::repository::{
    ApprovalRecord, DecisionNotice, DecisionNotifier, NominationRepository, NotificationError,
    RepositoryError,
};
use crate::workflows::nominations::{nomination_router, NominationApprovalService};

pub(super) const OPEN_CYCLE: &str = "2025-h2";
pub(super) const CLOSED_CYCLE: &str = "2025-h1";
pub(super) const UNSCORED_CYCLE: &str = "2025-spot";
pub(super) const DRAFT_CYCLE: &str = "2026-h1";

pub(super) fn criterion(id: &str, weight: f64, is_active: bool) -> Criterion {
    Criterion {
        id: CriterionId::new(id),
        name: id.replace('-', " "),
        weight,
        description: None,
        is_active,
        config: None,
    }
}

pub(super) fn nomination(
    id: &str,
    cycle: &str,
    nominee: &str,
    status: NominationStatus,
    rating: Option<f64>,
) -> Nomination {
    Nomination {
        id: NominationId(id.to_string()),
        cycle_id: CycleId(cycle.to_string()),
        nominee_user_id: UserId(nominee.to_string()),
        submitted_by: UserId("lead-7".to_string()),
        status,
        answers: Vec::new(),
        rating,
    }
}

fn cycle(id: &str, status: CycleStatus) -> Cycle {
    Cycle {
        id: CycleId(id.to_string()),
        name: format!("Cycle {id}"),
        status,
        start_date: None,
        end_date: None,
    }
}

/// Complete reviews for the open cycle: (4 + 1.5 + 2) / 10 * 10 = 7.5.
pub(super) fn full_reviews() -> Vec<ReviewEntry> {
    vec![
        ReviewEntry::new("impact", 4.0),
        ReviewEntry::new("collaboration", 1.5),
        ReviewEntry::new("craft", "2"),
    ]
}

pub(super) fn seeded_repository() -> MemoryRepository {
    let repository = MemoryRepository::default();
    {
        let mut state = repository.state.lock().expect("repository mutex poisoned");
        for cycle in [
            cycle(OPEN_CYCLE, CycleStatus::Open),
            cycle(CLOSED_CYCLE, CycleStatus::Closed),
            cycle(UNSCORED_CYCLE, CycleStatus::Open),
            cycle(DRAFT_CYCLE, CycleStatus::Draft),
        ] {
            state.cycles.insert(cycle.id.clone(), cycle);
        }
        state.criteria.insert(
            CycleId(OPEN_CYCLE.to_string()),
            vec![
                criterion("impact", 5.0, true),
                criterion("collaboration", 3.0, true),
                criterion("craft", 2.0, true),
                criterion("retired-culture", 4.0, false),
            ],
        );
        state.criteria.insert(
            CycleId(DRAFT_CYCLE.to_string()),
            vec![criterion("impact", 6.0, true)],
        );
        for nomination in [
            nomination("nom-ana", OPEN_CYCLE, "ana", NominationStatus::Pending, None),
            nomination("nom-bo", OPEN_CYCLE, "bo", NominationStatus::Pending, None),
            nomination("nom-done", OPEN_CYCLE, "cy", NominationStatus::Approved, Some(6.0)),
            nomination("nom-spot", UNSCORED_CYCLE, "dee", NominationStatus::Pending, None),
            nomination("h1-ana", CLOSED_CYCLE, "ana", NominationStatus::Approved, Some(8.0)),
            nomination("h1-ana-2", CLOSED_CYCLE, "ana", NominationStatus::Approved, Some(6.0)),
            nomination("h1-bo", CLOSED_CYCLE, "bo", NominationStatus::Approved, Some(7.0)),
            nomination("h1-cy", CLOSED_CYCLE, "cy", NominationStatus::Approved, Some(9.5)),
            nomination("h1-eve", CLOSED_CYCLE, "eve", NominationStatus::Rejected, None),
        ] {
            state.nominations.insert(nomination.id.clone(), nomination);
        }
    }
    repository
}

pub(super) fn build_service() -> (
    NominationApprovalService<MemoryRepository, MemoryNotifier>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(seeded_repository());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = NominationApprovalService::new(
        repository.clone(),
        notifier.clone(),
        RatingAggregator::default(),
    );
    (service, repository, notifier)
}

#[derive(Default)]
pub(super) struct MemoryState {
    pub(super) cycles: HashMap<CycleId, Cycle>,
    pub(super) criteria: HashMap<CycleId, Vec<Criterion>>,
    pub(super) nominations: HashMap<NominationId, Nomination>,
    pub(super) approvals: Vec<ApprovalRecord>,
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &str) -> Option<Nomination> {
        let state = self.state.lock().expect("repository mutex poisoned");
        state.nominations.get(&NominationId(id.to_string())).cloned()
    }
}

impl NominationRepository for MemoryRepository {
    fn cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.cycles.get(id).cloned())
    }

    fn criteria(&self, cycle_id: &CycleId) -> Result<Vec<Criterion>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.criteria.get(cycle_id).cloned().unwrap_or_default())
    }

    fn nomination(&self, id: &NominationId) -> Result<Option<Nomination>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.nominations.get(id).cloned())
    }

    fn nominations_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Nomination>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .nominations
            .values()
            .filter(|nomination| &nomination.cycle_id == cycle_id)
            .cloned()
            .collect())
    }

    fn insert_nomination(&self, nomination: Nomination) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state.nominations.contains_key(&nomination.id) {
            return Err(RepositoryError::Conflict);
        }
        state.nominations.insert(nomination.id.clone(), nomination);
        Ok(())
    }

    fn record_decision(
        &self,
        nomination: Nomination,
        record: ApprovalRecord,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        match state.nominations.get(&nomination.id).map(|stored| stored.status) {
            None => return Err(RepositoryError::NotFound),
            Some(NominationStatus::Pending) => {}
            Some(_) => return Err(RepositoryError::Conflict),
        }
        state.nominations.insert(nomination.id.clone(), nomination);
        state.approvals.push(record);
        Ok(())
    }

    fn approvals(&self, nomination_id: &NominationId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .approvals
            .iter()
            .filter(|record| &record.nomination_id == nomination_id)
            .cloned()
            .collect())
    }

    fn update_cycle_status(
        &self,
        cycle_id: &CycleId,
        expected: CycleStatus,
        next: CycleStatus,
    ) -> Result<Cycle, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let cycle = state.cycles.get_mut(cycle_id).ok_or(RepositoryError::NotFound)?;
        if cycle.status != expected {
            return Err(RepositoryError::Conflict);
        }
        cycle.status = next;
        Ok(cycle.clone())
    }

    fn save_criterion(&self, cycle_id: &CycleId, criterion: Criterion) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let criteria = state.criteria.entry(cycle_id.clone()).or_default();
        criteria.retain(|existing| existing.id != criterion.id);
        criteria.push(criterion);
        Ok(())
    }

    fn remove_criterion(
        &self,
        cycle_id: &CycleId,
        criterion_id: &CriterionId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let criteria = state.criteria.get_mut(cycle_id).ok_or(RepositoryError::NotFound)?;
        criteria.retain(|criterion| &criterion.id != criterion_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    notices: Arc<Mutex<Vec<DecisionNotice>>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<DecisionNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl DecisionNotifier for MemoryNotifier {
    fn publish(&self, notice: DecisionNotice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct UnavailableRepository;

impl NominationRepository for UnavailableRepository {
    fn cycle(&self, _id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn criteria(&self, _cycle_id: &CycleId) -> Result<Vec<Criterion>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn nomination(&self, _id: &NominationId) -> Result<Option<Nomination>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn nominations_for_cycle(&self, _cycle_id: &CycleId) -> Result<Vec<Nomination>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_nomination(&self, _nomination: Nomination) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_decision(
        &self,
        _nomination: Nomination,
        _record: ApprovalRecord,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn approvals(&self, _nomination_id: &NominationId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_cycle_status(
        &self,
        _cycle_id: &CycleId,
        _expected: CycleStatus,
        _next: CycleStatus,
    ) -> Result<Cycle, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save_criterion(&self, _cycle_id: &CycleId, _criterion: Criterion) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove_criterion(
        &self,
        _cycle_id: &CycleId,
        _criterion_id: &CriterionId,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(
    service: NominationApprovalService<MemoryRepository, MemoryNotifier>,
) -> axum::Router {
    nomination_router(Arc::new(service))
}
