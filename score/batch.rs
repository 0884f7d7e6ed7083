//! # Batch Runner
//!
//! Patient-hand units share nothing, so they are scored in parallel on the rayon pool.
//! Every unit produces exactly one tagged outcome, and the outcomes come back in
//! (patient, hand) order no matter which worker finished first.

use crate::config::AnalysisConfig;
use crate::pipeline::{HandAnalysis, UnitError, analyze_unit};
use crate::table::{MalformedInputError, partition_by_unit};
use crate::types::{BaselineKey, RawMeasurementRow, UnitId};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::fmt;
use std::io::IsTerminal;

/// One unit of work: the rows of one patient-hand and the baseline chosen for it.
#[derive(Debug, Clone)]
pub struct UnitRequest {
    pub unit: UnitId,
    pub rows: Vec<RawMeasurementRow>,
    pub baseline: BaselineKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub unit: UnitId,
    pub error: UnitError,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.error)
    }
}

#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Analyzed(Box<HandAnalysis>),
    Failed(UnitFailure),
}

impl UnitOutcome {
    pub fn unit(&self) -> &UnitId {
        match self {
            UnitOutcome::Analyzed(analysis) => &analysis.unit,
            UnitOutcome::Failed(failure) => &failure.unit,
        }
    }

    /// Turns the outcome into a failure of the same unit.
    pub fn fail(&mut self, error: UnitError) {
        let unit = self.unit().clone();
        *self = UnitOutcome::Failed(UnitFailure { unit, error });
    }
}

/// Work derived from a set of rows: units ready for analysis, units that already
/// failed before analysis, and rows that name no patient at all.
#[derive(Debug, Default)]
pub struct UnitPlan {
    pub requests: Vec<UnitRequest>,
    pub failed: Vec<UnitOutcome>,
    pub unattributed: Vec<MalformedInputError>,
}

/// Groups rows into patient-hand requests against `baseline`.
///
/// A row that names a patient but no usable hand could belong to either hand, so every
/// unit of that patient fails with the first such row. When the patient has no
/// attributable row at all, the errors land in `unattributed`.
pub fn plan_units(rows: Vec<RawMeasurementRow>, baseline: BaselineKey) -> UnitPlan {
    let mut partitioned = partition_by_unit(rows);
    let mut plan = UnitPlan {
        unattributed: partitioned.unassigned,
        ..UnitPlan::default()
    };
    for (unit, rows) in partitioned.units {
        match partitioned.handless.get(&unit.patient_id).and_then(|errors| errors.first()) {
            Some(err) => plan.failed.push(UnitOutcome::Failed(UnitFailure {
                unit,
                error: UnitError::Malformed(err.clone()),
            })),
            None => plan.requests.push(UnitRequest {
                unit,
                rows,
                baseline,
            }),
        }
    }
    partitioned
        .handless
        .retain(|patient, _| !plan.failed.iter().any(|o| &o.unit().patient_id == patient));
    plan.unattributed.extend(partitioned.handless.into_values().flatten());
    plan
}

/// Outcomes of a run plus the units the driver skipped before analysis.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<UnitOutcome>,
    pub skipped: Vec<(String, String)>,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = &HandAnalysis> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            UnitOutcome::Analyzed(analysis) => Some(analysis.as_ref()),
            UnitOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitFailure> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            UnitOutcome::Failed(failure) => Some(failure),
            UnitOutcome::Analyzed(_) => None,
        })
    }

    /// Records something the driver decided not to analyze (e.g. an existing output
    /// folder or an operator skip).
    pub fn skip(&mut self, subject: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push((subject.into(), reason.into()));
    }

    pub fn extend(&mut self, outcomes: Vec<UnitOutcome>) {
        self.outcomes.extend(outcomes);
        self.outcomes.sort_by(|a, b| a.unit().cmp(b.unit()));
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} unit(s) analyzed, {} failed, {} skipped",
            self.successes().count(),
            self.failures().count(),
            self.skipped.len()
        )];
        for analysis in self.successes() {
            lines.push(format!(
                "  ok     {}: best '{}' (DWIS {:.4})",
                analysis.unit,
                analysis.best.condition.label(),
                analysis.best.score
            ));
        }
        for failure in self.failures() {
            lines.push(format!("  failed {failure}"));
        }
        for (subject, reason) in &self.skipped {
            lines.push(format!("  skip   {subject}: {reason}"));
        }
        lines.join("\n")
    }
}

pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) =
        ProgressStyle::with_template("> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Analyzes every request and returns one outcome per request, sorted by unit.
pub fn run_units(
    requests: Vec<UnitRequest>,
    config: &AnalysisConfig,
    pb: &ProgressBar,
) -> Vec<UnitOutcome> {
    let mut outcomes: Vec<UnitOutcome> = requests
        .into_par_iter()
        .map(|request| {
            let outcome = match analyze_unit(&request.unit, &request.rows, &request.baseline, config)
            {
                Ok(analysis) => UnitOutcome::Analyzed(Box::new(analysis)),
                Err(error) => {
                    log::warn!("{}: skipped, {error}", request.unit);
                    UnitOutcome::Failed(UnitFailure {
                        unit: request.unit,
                        error,
                    })
                }
            };
            pb.inc(1);
            outcome
        })
        .collect();
    outcomes.sort_by(|a, b| a.unit().cmp(b.unit()));
    outcomes
}
