//! Flat tabular artifacts of one analyzed hand.

use crate::batch::UnitOutcome;
use crate::pipeline::{HandAnalysis, UnitError};
use crate::report::write_patient_report;
use crate::types::Hand;
use crate::weighting::WeightVector;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error while writing results: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error while writing results: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Serialize)]
struct ResponsivenessRecord {
    parameter: &'static str,
    variability: Option<f64>,
    weight: f64,
}

#[derive(Serialize)]
struct OptimalEffectRecord {
    parameter: &'static str,
    improvement: f64,
    raw_change: f64,
}

pub fn responsiveness_path(dir: &Path, hand: Hand) -> PathBuf {
    dir.join(format!("responsiveness_scores_{}.csv", hand.file_tag()))
}

pub fn optimal_effect_path(dir: &Path, hand: Hand) -> PathBuf {
    dir.join(format!("optimal_effect_vs_baseline_{}.csv", hand.file_tag()))
}

/// One row per matrix column: `parameter,variability,weight`.
pub fn write_responsiveness(path: &Path, weights: &WeightVector) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_path(path)?;
    for entry in weights.entries() {
        writer.serialize(ResponsivenessRecord {
            parameter: entry.parameter.canonical_name(),
            variability: entry.variability,
            weight: entry.weight,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// The best condition against the baseline, defined cells only:
/// `parameter,improvement,raw_change`. `raw_change` is best minus baseline without
/// polarity.
pub fn write_optimal_effect(path: &Path, analysis: &HandAnalysis) -> Result<(), OutputError> {
    let matrix = &analysis.improvement;
    let mut writer = csv::Writer::from_path(path)?;
    if let Some(row) = matrix.row_of(&analysis.best.condition) {
        for (col, parameter) in matrix.columns().iter().enumerate() {
            if let (Some(improvement), Some(raw_change)) =
                (matrix.value(row, col), matrix.raw_change(row, col))
            {
                writer.serialize(OptimalEffectRecord {
                    parameter: parameter.canonical_name(),
                    improvement,
                    raw_change,
                })?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes both tables of `analysis` into `dir`, creating it if needed.
pub fn write_hand_outputs(dir: &Path, analysis: &HandAnalysis) -> Result<Vec<PathBuf>, OutputError> {
    fs::create_dir_all(dir)?;
    let hand = analysis.unit.hand;
    let responsiveness = responsiveness_path(dir, hand);
    write_responsiveness(&responsiveness, &analysis.weights)?;
    let optimal = optimal_effect_path(dir, hand);
    write_optimal_effect(&optimal, analysis)?;
    Ok(vec![responsiveness, optimal])
}

/// Writes every artifact of one patient: the tables of each analyzed hand, then the
/// report. A write failure turns the affected outcomes into failures instead of
/// stopping the batch. Returns the report path when it was written.
pub fn write_patient_outputs(dir: &Path, patient_id: &str, outcomes: &mut [UnitOutcome]) -> Option<PathBuf> {
    for outcome in outcomes.iter_mut() {
        let UnitOutcome::Analyzed(analysis) = &*outcome else {
            continue;
        };
        if let Err(e) = write_hand_outputs(dir, analysis) {
            log::warn!("{}: {e}", analysis.unit);
            outcome.fail(UnitError::OutputWrite { reason: e.to_string() });
        }
    }

    let mut analyses = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes.iter() {
        match outcome {
            UnitOutcome::Analyzed(analysis) => analyses.push(analysis.as_ref()),
            UnitOutcome::Failed(failure) => failures.push(failure),
        }
    }
    let written = write_patient_report(dir, patient_id, &analyses, &failures);
    match written {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("patient {patient_id}: {e}");
            let reason = e.to_string();
            for outcome in outcomes.iter_mut() {
                if matches!(outcome, UnitOutcome::Analyzed(_)) {
                    outcome.fail(UnitError::OutputWrite { reason: reason.clone() });
                }
            }
            None
        }
    }
}
