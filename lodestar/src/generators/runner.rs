//! Scatter-gather execution of candidate generators
//!
//! Every generator runs under its own budget. A generator that times out or fails contributes
//! nothing and is recorded in its [`GeneratorReport`]; the others are unaffected.

use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info_span, warn};

use super::{Candidate, CandidateGenerator, GenerationInput, GeneratorKind};
use crate::LodestarError;
use crate::query::RouterMode;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorStatus {
    Ok,
    Timeout,
    Error,
}

/// Outcome of one generator, surfaced in response diagnostics
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratorReport {
    pub name: GeneratorKind,
    pub status: GeneratorStatus,
    pub candidates: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratorOutcome {
    pub kind: GeneratorKind,
    pub candidates: Vec<Candidate>,
    pub report: GeneratorReport,
}

impl GeneratorOutcome {
    pub fn succeeded(&self) -> bool {
        self.report.status == GeneratorStatus::Ok
    }
}

/// Generators whose failure makes a mode's answer meaningless
///
/// Graph expansion is never required; it only boosts what the others found.
pub fn required_generators(mode: RouterMode) -> &'static [GeneratorKind] {
    match mode {
        RouterMode::Knowledge => &[GeneratorKind::Knowledge],
        RouterMode::Actor => &[GeneratorKind::Neural],
        RouterMode::Temporal => &[GeneratorKind::Temporal, GeneratorKind::Neural],
        RouterMode::Neural => &[GeneratorKind::Neural],
        RouterMode::Hybrid => &[GeneratorKind::Knowledge, GeneratorKind::Neural],
    }
}

/// True when every generator the mode requires ran and none succeeded
pub fn all_required_failed(mode: RouterMode, outcomes: &[GeneratorOutcome]) -> bool {
    let required = required_generators(mode);
    let ran: Vec<&GeneratorOutcome> = outcomes
        .iter()
        .filter(|o| required.contains(&o.kind))
        .collect();
    !ran.is_empty() && ran.iter().all(|o| !o.succeeded())
}

/// Run one generator under `budget`
pub async fn run_generator(
    generator: &dyn CandidateGenerator,
    input: GenerationInput<'_>,
    budget: Duration,
) -> GeneratorOutcome {
    let kind = generator.kind();
    let span = info_span!("generator", name = %kind, budget_ms = budget.as_millis() as u64);

    async move {
        let started = Instant::now();
        let result = tokio::time::timeout(budget, generator.generate(input)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (candidates, status, message) = match result {
            Ok(Ok(candidates)) => {
                debug!(candidates = candidates.len(), elapsed_ms, "Generator finished");
                (candidates, GeneratorStatus::Ok, None)
            }
            Ok(Err(e)) => {
                let err = LodestarError::GeneratorError {
                    generator: kind.to_string(),
                    message: e.to_string(),
                };
                warn!(error = %err, elapsed_ms, "Generator failed");
                (Vec::new(), GeneratorStatus::Error, Some(err.to_string()))
            }
            Err(_) => {
                let err = LodestarError::GeneratorTimeout {
                    generator: kind.to_string(),
                    budget_ms: budget.as_millis() as u64,
                };
                warn!(error = %err, "Generator timed out");
                (Vec::new(), GeneratorStatus::Timeout, Some(err.to_string()))
            }
        };

        GeneratorOutcome {
            kind,
            report: GeneratorReport {
                name: kind,
                status,
                candidates: candidates.len(),
                elapsed_ms,
                message,
            },
            candidates,
        }
    }
    .instrument(span)
    .await
}

/// Run generators concurrently, each with its own budget; outcomes keep the input order
pub async fn run_all(
    jobs: &[(&dyn CandidateGenerator, Duration)],
    input: GenerationInput<'_>,
) -> Vec<GeneratorOutcome> {
    join_all(
        jobs.iter()
            .map(|(generator, budget)| run_generator(*generator, input, *budget)),
    )
    .await
}
