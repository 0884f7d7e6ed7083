use crate::aggregate::{DwisTable, aggregate_scores};
use crate::baseline::{BaselineError, ImprovementMatrix, compute_improvement};
use crate::config::AnalysisConfig;
use crate::rank::{RankedCondition, Ranking, rank_conditions};
use crate::table::{DroppedParameter, MalformedInputError, MeasurementTable};
use crate::types::{BaselineKey, Condition, RawMeasurementRow, UnitId};
use crate::views::{ViewPair, build_views};
use crate::weighting::{WeightVector, WeightingError, responsiveness_weights};
use thiserror::Error;

// ========================================================================================
//                              Per-unit analysis contract
// ========================================================================================

/// Everything that can abandon one patient-hand unit. Nothing here is fatal beyond the
/// unit that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInputError),
    #[error(transparent)]
    Baseline(#[from] BaselineError),
    #[error(transparent)]
    Weighting(#[from] WeightingError),
    #[error("no condition other than baseline '{baseline}' can be compared against it")]
    NoCandidateConditions { baseline: String },
    #[error("results could not be written: {reason}")]
    OutputWrite { reason: String },
}

/// The complete result for one patient and one hand.
#[derive(Debug, Clone)]
pub struct HandAnalysis {
    pub unit: UnitId,
    pub baseline: Condition,
    pub improvement: ImprovementMatrix,
    pub weights: WeightVector,
    pub scores: DwisTable,
    pub ranking: Ranking,
    pub best: RankedCondition,
    pub views: ViewPair,
    /// Rows left out because their parameter name is not in the vocabulary.
    pub dropped: Vec<DroppedParameter>,
}

// ========================================================================================
//                                    Entry points
// ========================================================================================

/// Runs the scoring chain on an already validated table.
pub fn analyze_table(
    table: &MeasurementTable,
    baseline: &BaselineKey,
    config: &AnalysisConfig,
) -> Result<HandAnalysis, UnitError> {
    let improvement = compute_improvement(table, baseline, config.improvement_scale)?;
    let baseline_condition = *improvement.baseline();
    if improvement.candidate_rows().next().is_none() {
        return Err(UnitError::NoCandidateConditions {
            baseline: baseline_condition.label(),
        });
    }

    let weights = responsiveness_weights(&improvement, config)?;
    let scores = aggregate_scores(&improvement, &weights);
    let ranking = rank_conditions(&scores);
    let best = ranking
        .best()
        .cloned()
        .ok_or_else(|| UnitError::NoCandidateConditions {
            baseline: baseline_condition.label(),
        })?;
    let views = build_views(&improvement, &weights, &ranking);

    log::info!(
        "{}: best setting '{}' (DWIS {:.4}) among {} candidate(s)",
        table.unit(),
        best.condition.label(),
        best.score,
        scores.len()
    );

    Ok(HandAnalysis {
        unit: table.unit().clone(),
        baseline: baseline_condition,
        improvement,
        weights,
        scores,
        ranking,
        best,
        views,
        dropped: table.dropped().to_vec(),
    })
}

/// Validates the raw rows of `unit` and analyzes them.
pub fn analyze_unit(
    unit: &UnitId,
    rows: &[RawMeasurementRow],
    baseline: &BaselineKey,
    config: &AnalysisConfig,
) -> Result<HandAnalysis, UnitError> {
    log::debug!("{unit}: analyzing {} raw row(s) against '{baseline}'", rows.len());
    let table = MeasurementTable::from_rows(unit.clone(), rows)?;
    analyze_table(&table, baseline, config)
}
