use awards::error::AppError;
use awards::workflows::nominations::{
    ApprovalRecord, Criterion, CriterionDraft, CriterionId, Cycle, CycleId, CycleStatus,
    DecisionNotice, DecisionNotifier, Nomination, NominationId, NominationRepository,
    NominationStatus, NotificationError, QuestionConfig, RepositoryError, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Store {
    cycles: HashMap<CycleId, Cycle>,
    criteria: HashMap<CycleId, Vec<Criterion>>,
    nominations: HashMap<NominationId, Nomination>,
    approvals: Vec<ApprovalRecord>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNominationRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryNominationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    pub(crate) fn insert_cycle(
        &self,
        cycle: Cycle,
        criteria: Vec<Criterion>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if store.cycles.contains_key(&cycle.id) {
            return Err(RepositoryError::Conflict);
        }
        store.criteria.insert(cycle.id.clone(), criteria);
        store.cycles.insert(cycle.id.clone(), cycle);
        Ok(())
    }
}

impl NominationRepository for InMemoryNominationRepository {
    fn cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        Ok(self.lock()?.cycles.get(id).cloned())
    }

    fn criteria(&self, cycle_id: &CycleId) -> Result<Vec<Criterion>, RepositoryError> {
        Ok(self
            .lock()?
            .criteria
            .get(cycle_id)
            .cloned()
            .unwrap_or_default())
    }

    fn nomination(&self, id: &NominationId) -> Result<Option<Nomination>, RepositoryError> {
        Ok(self.lock()?.nominations.get(id).cloned())
    }

    fn nominations_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Nomination>, RepositoryError> {
        let store = self.lock()?;
        let mut nominations: Vec<Nomination> = store
            .nominations
            .values()
            .filter(|nomination| &nomination.cycle_id == cycle_id)
            .cloned()
            .collect();
        nominations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nominations)
    }

    fn insert_nomination(&self, nomination: Nomination) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if store.nominations.contains_key(&nomination.id) {
            return Err(RepositoryError::Conflict);
        }
        store.nominations.insert(nomination.id.clone(), nomination);
        Ok(())
    }

    fn record_decision(
        &self,
        nomination: Nomination,
        record: ApprovalRecord,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        match store.nominations.get(&nomination.id) {
            None => return Err(RepositoryError::NotFound),
            Some(stored) if stored.status != NominationStatus::Pending => {
                return Err(RepositoryError::Conflict)
            }
            Some(_) => {}
        }
        store.nominations.insert(nomination.id.clone(), nomination);
        store.approvals.push(record);
        Ok(())
    }

    fn approvals(&self, nomination_id: &NominationId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        Ok(self
            .lock()?
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
        let mut store = self.lock()?;
        let cycle = store
            .cycles
            .get_mut(cycle_id)
            .ok_or(RepositoryError::NotFound)?;
        if cycle.status != expected {
            return Err(RepositoryError::Conflict);
        }
        cycle.status = next;
        Ok(cycle.clone())
    }

    fn save_criterion(&self, cycle_id: &CycleId, criterion: Criterion) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if !store.cycles.contains_key(cycle_id) {
            return Err(RepositoryError::NotFound);
        }
        let criteria = store.criteria.entry(cycle_id.clone()).or_default();
        match criteria.iter_mut().find(|existing| existing.id == criterion.id) {
            Some(existing) => *existing = criterion,
            None => criteria.push(criterion),
        }
        Ok(())
    }

    fn remove_criterion(
        &self,
        cycle_id: &CycleId,
        criterion_id: &CriterionId,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        let criteria = store
            .criteria
            .get_mut(cycle_id)
            .ok_or(RepositoryError::NotFound)?;
        let before = criteria.len();
        criteria.retain(|criterion| &criterion.id != criterion_id);
        if criteria.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Notifier that only logs; stands in for the mail/notification backend.
#[derive(Default, Clone)]
pub(crate) struct LoggingDecisionNotifier {
    sent: Arc<Mutex<Vec<DecisionNotice>>>,
}

impl LoggingDecisionNotifier {
    pub(crate) fn sent(&self) -> Vec<DecisionNotice> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl DecisionNotifier for LoggingDecisionNotifier {
    fn publish(&self, notice: DecisionNotice) -> Result<(), NotificationError> {
        info!(
            template = %notice.template,
            nomination = %notice.nomination_id.0,
            recipients = notice.recipients.len(),
            "decision notice queued"
        );
        self.sent
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

pub(crate) const DEMO_CYCLE: &str = "demo-2025";

/// Seed an open cycle with three weighted criteria and four pending nominations.
pub(crate) fn seed_demo_cycle(
    repository: &InMemoryNominationRepository,
) -> Result<CycleId, AppError> {
    let cycle_id = CycleId(DEMO_CYCLE.to_string());
    let drafts = [
        ("impact", "Business impact", 5.0),
        ("collaboration", "Collaboration", 3.0),
        ("craft", "Craft and quality", 2.0),
    ];
    let criteria = drafts
        .into_iter()
        .map(|(id, name, weight)| {
            CriterionDraft {
                name: name.to_string(),
                weight,
                description: None,
                is_active: true,
                config: Some(QuestionConfig::Text { required: true }),
            }
            .validate(CriterionId::new(id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cycle = Cycle {
        id: cycle_id.clone(),
        name: "2025 Excellence Awards".to_string(),
        status: CycleStatus::Open,
        start_date: None,
        end_date: None,
    };
    repository.insert_cycle(cycle, criteria)?;

    for (id, nominee) in [
        ("nom-101", "avery"),
        ("nom-102", "blake"),
        ("nom-103", "casey"),
        ("nom-104", "avery"),
    ] {
        repository
            .insert_nomination(Nomination {
                id: NominationId(id.to_string()),
                cycle_id: cycle_id.clone(),
                nominee_user_id: UserId(nominee.to_string()),
                submitted_by: UserId("lead-ops".to_string()),
                status: NominationStatus::Pending,
                answers: Vec::new(),
                rating: None,
            })?;
    }

    Ok(cycle_id)
}

/// Parse `id:number` pairs from the command line.
pub(crate) fn parse_weighted(raw: &str) -> Result<(String, f64), String> {
    let (id, value) = split_pair(raw)?;
    let weight = value
        .parse::<f64>()
        .map_err(|err| format!("failed to parse weight in '{raw}' ({err})"))?;
    Ok((id, weight))
}

/// Parse `id:value` pairs; the value stays raw so the aggregator decides how to read it.
pub(crate) fn parse_review(raw: &str) -> Result<(String, String), String> {
    split_pair(raw)
}

fn split_pair(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected ID:VALUE, got '{raw}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing criterion id in '{raw}'"));
    }
    Ok((id.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use awards::workflows::nominations::{
        Actor, ApprovalRequest, ApprovalServiceError, DecisionAction, NominationApprovalService,
        RatingAggregator, RejectionRequest, ReviewEntry, Role,
    };
    use std::sync::Barrier;

    #[test]
    fn parses_weighted_pairs() {
        assert_eq!(parse_weighted("impact:5"), Ok(("impact".to_string(), 5.0)));
        assert_eq!(
            parse_review(" craft : 1.5"),
            Ok(("craft".to_string(), "1.5".to_string()))
        );
        assert_eq!(parse_review("craft:"), Ok(("craft".to_string(), String::new())));
        assert!(parse_weighted("impact").is_err());
        assert!(parse_weighted(":4").is_err());
        assert!(parse_weighted("impact:heavy").is_err());
    }

    #[test]
    fn demo_seed_refuses_to_run_twice() {
        let repository = InMemoryNominationRepository::default();
        let cycle_id = seed_demo_cycle(&repository).expect("seed succeeds");

        assert_eq!(repository.criteria(&cycle_id).expect("criteria").len(), 3);
        assert_eq!(
            repository
                .nominations_for_cycle(&cycle_id)
                .expect("nominations")
                .len(),
            4
        );
        assert!(seed_demo_cycle(&repository).is_err());
    }

    #[test]
    fn decisions_for_unknown_nominations_are_not_found() {
        let repository = InMemoryNominationRepository::default();
        let nomination = Nomination {
            id: NominationId("ghost".to_string()),
            cycle_id: CycleId(DEMO_CYCLE.to_string()),
            nominee_user_id: UserId("x".to_string()),
            submitted_by: UserId("y".to_string()),
            status: NominationStatus::Approved,
            answers: Vec::new(),
            rating: Some(5.0),
        };
        let record = ApprovalRecord {
            nomination_id: nomination.id.clone(),
            action: DecisionAction::Approve,
            actor_id: UserId("mgr".to_string()),
            actor_role: Role::Manager,
            reason: "ok".to_string(),
            rating: Some(5.0),
            total_weight: None,
            criteria_reviews: Vec::new(),
            decided_at: chrono::Utc::now(),
        };

        assert!(matches!(
            repository.record_decision(nomination, record),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn decisions_on_an_already_decided_nomination_conflict() {
        let repository = InMemoryNominationRepository::default();
        seed_demo_cycle(&repository).expect("seed succeeds");
        let id = NominationId("nom-101".to_string());
        let pending = repository
            .nomination(&id)
            .expect("lookup")
            .expect("seeded nomination");

        let decide = |status: NominationStatus, action: DecisionAction| {
            let mut nomination = pending.clone();
            nomination.status = status;
            let record = ApprovalRecord {
                nomination_id: id.clone(),
                action,
                actor_id: UserId("hr-lee".to_string()),
                actor_role: Role::Hr,
                reason: "decided".to_string(),
                rating: None,
                total_weight: None,
                criteria_reviews: Vec::new(),
                decided_at: chrono::Utc::now(),
            };
            repository.record_decision(nomination, record)
        };

        decide(NominationStatus::Approved, DecisionAction::Approve).expect("first decision stored");
        assert!(matches!(
            decide(NominationStatus::Rejected, DecisionAction::Reject),
            Err(RepositoryError::Conflict)
        ));

        let stored = repository
            .nomination(&id)
            .expect("lookup")
            .expect("nomination kept");
        assert_eq!(stored.status, NominationStatus::Approved);
        assert_eq!(repository.approvals(&id).expect("approvals").len(), 1);
    }

    #[test]
    fn concurrent_approve_and_reject_record_exactly_one_decision() {
        for _ in 0..100 {
            let repository = Arc::new(InMemoryNominationRepository::default());
            seed_demo_cycle(&repository).expect("seed succeeds");
            let service = NominationApprovalService::new(
                repository.clone(),
                Arc::new(LoggingDecisionNotifier::default()),
                RatingAggregator::default(),
            );
            let barrier = Barrier::new(2);
            let nomination_id = NominationId("nom-101".to_string());

            let (approved, rejected) = std::thread::scope(|scope| {
                let approve = scope.spawn(|| {
                    barrier.wait();
                    service.approve(
                        &Actor::new("mgr-dana", Role::Manager),
                        ApprovalRequest {
                            nomination_id: nomination_id.clone(),
                            reason: "Strong quarter".to_string(),
                            rating: None,
                            criteria_reviews: vec![
                                ReviewEntry::new("impact", 4.0),
                                ReviewEntry::new("collaboration", 2.0),
                                ReviewEntry::new("craft", 2.0),
                            ],
                        },
                    )
                });
                let reject = scope.spawn(|| {
                    barrier.wait();
                    service.reject(
                        &Actor::new("hr-lee", Role::Hr),
                        RejectionRequest {
                            nomination_id: nomination_id.clone(),
                            reason: "Outside the cycle".to_string(),
                        },
                    )
                });
                (
                    approve.join().expect("approve thread"),
                    reject.join().expect("reject thread"),
                )
            });

            assert_eq!(
                u8::from(approved.is_ok()) + u8::from(rejected.is_ok()),
                1,
                "exactly one decision wins"
            );
            let loser = approved.err().or(rejected.err()).expect("one decision loses");
            assert!(matches!(
                loser,
                ApprovalServiceError::Repository(RepositoryError::Conflict)
                    | ApprovalServiceError::InvalidState { .. }
            ));
            assert_eq!(
                repository.approvals(&nomination_id).expect("approvals").len(),
                1
            );
        }
    }
}
