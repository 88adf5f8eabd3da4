use crate::infra::{
    parse_review, parse_weighted, seed_demo_cycle, InMemoryNominationRepository,
    LoggingDecisionNotifier,
};
use awards::error::AppError;
use awards::workflows::nominations::domain::CycleStatus;
use awards::workflows::nominations::permissions::allowed_actions;
use awards::workflows::nominations::{
    collect_reviews, Action, ActionContext, Actor, AnswerPayload, ApprovalRequest, CriterionDraft,
    CriterionId, NominationAnswer, NominationApprovalService, NominationId, NominationStatus,
    NominationSubmission, RatingAggregator, RatingInput, RejectionRequest, ReviewEntry, Role,
    UserId,
};
use clap::Args;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Upper bound of the overall rating (defaults to 10).
    #[arg(long)]
    pub(crate) scale: Option<f64>,
    /// Write the ranking CSV to this file instead of stdout.
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RatingPreviewArgs {
    /// Criterion as ID:WEIGHT (repeatable)
    #[arg(long = "criterion", value_parser = parse_weighted, required = true)]
    pub(crate) criteria: Vec<(String, f64)>,
    /// Review as ID:VALUE (repeatable); missing reviews count as zero in preview
    #[arg(long = "review", value_parser = parse_review)]
    pub(crate) reviews: Vec<(String, String)>,
    /// Validate like a submitted approval instead of clamping
    #[arg(long)]
    pub(crate) strict: bool,
    /// Upper bound of the overall rating (defaults to 10)
    #[arg(long)]
    pub(crate) scale: Option<f64>,
}

pub(crate) fn run_rating_preview(args: RatingPreviewArgs) -> Result<(), AppError> {
    let rendered = render_rating_preview(args)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn render_rating_preview(args: RatingPreviewArgs) -> Result<String, AppError> {
    let RatingPreviewArgs {
        criteria,
        reviews,
        strict,
        scale,
    } = args;

    let criteria = criteria
        .into_iter()
        .map(|(id, weight)| {
            CriterionDraft {
                name: id.clone(),
                weight,
                description: None,
                is_active: true,
                config: None,
            }
            .validate(CriterionId::new(id))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let reviews = collect_reviews(
        reviews
            .into_iter()
            .map(|(id, value)| ReviewEntry::new(id, RatingInput::from(value))),
    );
    let aggregator = scale.map(RatingAggregator::new).unwrap_or_default();

    let (mode, result) = if strict {
        let (result, _) = aggregator.authoritative(&criteria, &reviews)?;
        ("strict", result)
    } else {
        ("preview", aggregator.preview(&criteria, &reviews))
    };

    let mut lines = vec![format!("Rating {mode} (scale 0-{})", aggregator.scale())];
    for criterion in &criteria {
        let shown = reviews
            .get(&criterion.id)
            .map(RatingInput::display)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "  {:<16} weight {:>5.2}  rating {}",
            criterion.id.0, criterion.weight, shown
        ));
    }
    lines.push(format!(
        "Total rating: {:.2} (total weight {:.2})",
        result.total_rating, result.total_weight
    ));
    Ok(lines.join("\n"))
}

pub(crate) fn run_permission_matrix() -> Result<(), AppError> {
    println!("{}", render_permission_matrix());
    Ok(())
}

/// Role x action table. A cell lists the entity states in which the action is allowed.
pub(crate) fn render_permission_matrix() -> String {
    let contexts: Vec<(String, ActionContext)> = CycleStatus::ALL
        .into_iter()
        .map(|status| (format!("cycle {}", status.label()), ActionContext::cycle(status)))
        .chain(NominationStatus::ALL.into_iter().map(|status| {
            (
                format!("nomination {}", status.label()),
                ActionContext::nomination(status),
            )
        }))
        .collect();

    let mut output = format!("{:<20}", "ACTION");
    for role in Role::ALL {
        output.push_str(&format!(" {:<28}", role.label()));
    }
    output.push('\n');

    for action in Action::ALL {
        output.push_str(&format!("{:<20}", action.label()));
        for role in Role::ALL {
            let states: Vec<&str> = contexts
                .iter()
                .filter(|(_, context)| allowed_actions(role, context).contains(&action))
                .map(|(label, _)| label.rsplit(' ').next().unwrap_or(label.as_str()))
                .collect();
            let cell = if states.len() == contexts.len() {
                "any".to_string()
            } else if states.is_empty() {
                "-".to_string()
            } else {
                states.join("|")
            };
            output.push_str(&format!(" {:<28}", cell));
        }
        output.push('\n');
    }
    output
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { scale, output } = args;

    let repository = Arc::new(InMemoryNominationRepository::default());
    let notifier = Arc::new(LoggingDecisionNotifier::default());
    let aggregator = scale.map(RatingAggregator::new).unwrap_or_default();
    let service = NominationApprovalService::new(repository.clone(), notifier.clone(), aggregator);

    let cycle_id = seed_demo_cycle(&repository)?;
    println!("Nomination review demo for cycle {}", cycle_id.0);

    let manager = Actor::new("mgr-dana", Role::Manager);
    let hr = Actor::new("hr-lee", Role::Hr);
    let lead = Actor::new("lead-ops", Role::TeamLead);

    let answers = [
        ("impact", "Cut checkout latency in half"),
        ("collaboration", "Paired with support on every incident"),
        ("craft", "Introduced load tests for the payment path"),
    ]
    .into_iter()
    .map(|(criterion, text)| NominationAnswer {
        criteria_id: CriterionId::new(criterion),
        score: None,
        comment: None,
        answer: Some(AnswerPayload {
            text: Some(text.to_string()),
            ..AnswerPayload::default()
        }),
    })
    .collect();
    let submitted = service.submit(
        &lead,
        NominationSubmission {
            cycle_id: cycle_id.clone(),
            nominee_user_id: UserId("devon".to_string()),
            answers,
        },
    )?;
    println!(
        "  {} submitted for {} by {}",
        submitted.id.0, submitted.nominee_user_id.0, submitted.submitted_by.0
    );
    let decisions = [
        ("nom-101", &manager, [4.5, 2.5, 2.0]),
        ("nom-102", &hr, [3.0, 3.0, 1.0]),
        ("nom-104", &manager, [3.5, 2.0, 1.5]),
    ];

    for (nomination, actor, [impact, collaboration, craft]) in decisions {
        let record = service.approve(
            actor,
            ApprovalRequest {
                nomination_id: NominationId(nomination.to_string()),
                reason: "Clear, well-evidenced contribution".to_string(),
                rating: None,
                criteria_reviews: vec![
                    ReviewEntry::new("impact", impact),
                    ReviewEntry::new("collaboration", collaboration),
                    ReviewEntry::new("craft", craft),
                ],
            },
        )?;
        println!(
            "  {} approved by {} with rating {:.2}",
            record.nomination_id.0,
            record.actor_role.label(),
            record.rating.unwrap_or_default()
        );
    }

    let rejected = service.reject(
        &manager,
        RejectionRequest {
            nomination_id: NominationId("nom-103".to_string()),
            reason: "Achievement falls outside this cycle".to_string(),
        },
    )?;
    println!("  {} rejected: {}", rejected.nomination_id.0, rejected.reason);

    service.update_cycle_status(&hr, &cycle_id, CycleStatus::Closed)?;
    let table = service.rankings(&hr, &cycle_id)?;
    let finalized = service.finalize(&hr, &cycle_id)?;
    println!(
        "Rankings computed at {} ({} notices sent), cycle {}\n",
        table.computed_at.format("%Y-%m-%d %H:%M:%S"),
        notifier.sent().len(),
        finalized.status.label()
    );

    match output {
        Some(path) => {
            table.write_csv(File::create(&path)?)?;
            println!("Rankings written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            table.write_csv(&mut handle)?;
            handle.flush()?;
        }
    }

    Ok(())
}
