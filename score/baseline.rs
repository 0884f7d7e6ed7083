//! # Baseline Engine
//!
//! Expresses every condition of a patient-hand table as an improvement over one
//! designated baseline condition. Polarity is applied here, so a positive cell always
//! means more therapeutic benefit regardless of the metric.

use crate::config::ImprovementScale;
use crate::table::{ConditionMeasurements, MeasurementTable};
use crate::types::{BaselineKey, Condition, Hand};
use crate::vocabulary::ParameterId;
use ndarray::Array2;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BaselineError {
    #[error("baseline '{key}' was not recorded; available conditions: {}", .available.join(", "))]
    MissingBaseline { key: BaselineKey, available: Vec<String> },
    #[error("baseline '{key}' is ambiguous, it matches: {}", .matches.join(", "))]
    AmbiguousBaseline { key: BaselineKey, matches: Vec<String> },
}

/// Improvement of every condition over the baseline, one row per condition.
///
/// Rows are in acquisition order and include the baseline, whose cells are all
/// exactly zero. `None` marks a cell where the condition or the baseline lacks the
/// parameter.
#[derive(Debug, Clone)]
pub struct ImprovementMatrix {
    hand: Hand,
    conditions: Vec<Condition>,
    baseline_row: usize,
    columns: Vec<ParameterId>,
    values: Array2<Option<f64>>,
    /// `value - baseline` before polarity and scaling.
    raw_changes: Array2<Option<f64>>,
}

impl ImprovementMatrix {
    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn baseline(&self) -> &Condition {
        &self.conditions[self.baseline_row]
    }

    pub fn baseline_row(&self) -> usize {
        self.baseline_row
    }

    pub fn columns(&self) -> &[ParameterId] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<Option<f64>> {
        &self.values
    }

    /// Row indices of every condition except the baseline, in acquisition order.
    pub fn candidate_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.conditions.len()).filter(move |&row| row != self.baseline_row)
    }

    pub fn row_of(&self, condition: &Condition) -> Option<usize> {
        self.conditions.iter().position(|c| c == condition)
    }

    pub fn column_of(&self, parameter: ParameterId) -> Option<usize> {
        self.columns.iter().position(|&p| p == parameter)
    }

    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        self.values[[row, column]]
    }

    pub fn raw_change(&self, row: usize, column: usize) -> Option<f64> {
        self.raw_changes[[row, column]]
    }
}

/// Finds the single condition of `table` selected by `key`.
pub fn locate_baseline(table: &MeasurementTable, key: &BaselineKey) -> Result<usize, BaselineError> {
    let matches: Vec<usize> = table
        .conditions()
        .iter()
        .enumerate()
        .filter(|(_, measured)| key.matches(&measured.condition.key))
        .map(|(idx, _)| idx)
        .collect();

    // An unnumbered recording is the exact match for an unnumbered key.
    let exact: Vec<usize> = matches
        .iter()
        .copied()
        .filter(|&idx| table.conditions()[idx].condition.key.program == key.program)
        .collect();

    match (matches.as_slice(), exact.as_slice()) {
        ([single], _) | (_, [single]) => Ok(*single),
        ([], _) => Err(BaselineError::MissingBaseline {
            key: *key,
            available: table
                .conditions()
                .iter()
                .map(|c| c.condition.label())
                .collect(),
        }),
        (several, _) => Err(BaselineError::AmbiguousBaseline {
            key: *key,
            matches: several
                .iter()
                .map(|&idx| table.conditions()[idx].condition.label())
                .collect(),
        }),
    }
}

fn transform(value: f64, baseline: f64, scale: ImprovementScale) -> Option<f64> {
    match scale {
        ImprovementScale::Delta => Some(value - baseline),
        ImprovementScale::Percent if baseline == 0.0 => None,
        ImprovementScale::Percent => Some(100.0 * (value - baseline) / baseline.abs()),
    }
}

/// Builds the improvement matrix of `table` against the condition selected by `key`.
///
/// Columns are every parameter measured for the hand, in canonical order. A candidate
/// condition sharing no parameter with the baseline has nothing to compare and is
/// left out of the matrix.
pub fn compute_improvement(
    table: &MeasurementTable,
    key: &BaselineKey,
    scale: ImprovementScale,
) -> Result<ImprovementMatrix, BaselineError> {
    let baseline_idx = locate_baseline(table, key)?;
    let baseline = &table.conditions()[baseline_idx];
    let columns = table.parameters();

    let mut kept: Vec<&ConditionMeasurements> = Vec::with_capacity(table.conditions().len());
    let mut rows: Vec<(Vec<Option<f64>>, Vec<Option<f64>>)> = Vec::new();
    let mut baseline_row = 0;

    for (idx, measured) in table.conditions().iter().enumerate() {
        if idx == baseline_idx {
            baseline_row = kept.len();
            kept.push(measured);
            rows.push((vec![Some(0.0); columns.len()], vec![Some(0.0); columns.len()]));
            continue;
        }

        let mut improvements = Vec::with_capacity(columns.len());
        let mut raw_changes = Vec::with_capacity(columns.len());
        for &parameter in &columns {
            let pair = measured.value(parameter).zip(baseline.value(parameter));
            raw_changes.push(pair.map(|(value, reference)| value - reference));
            improvements.push(pair.and_then(|(value, reference)| {
                // Adding 0.0 folds -0.0 into 0.0.
                transform(value, reference, scale).map(|x| parameter.polarity().sign() * x + 0.0)
            }));
        }

        if improvements.iter().all(Option::is_none) {
            log::warn!(
                "{}: '{}' shares no comparable parameter with baseline '{}', leaving it out",
                table.unit(),
                measured.condition.label(),
                baseline.condition.label()
            );
            continue;
        }
        kept.push(measured);
        rows.push((improvements, raw_changes));
    }

    let n_rows = rows.len();
    let n_cols = columns.len();
    let mut values = Array2::from_elem((n_rows, n_cols), None);
    let mut raw = Array2::from_elem((n_rows, n_cols), None);
    for (row, (improvements, raw_changes)) in rows.into_iter().enumerate() {
        for (col, (improvement, change)) in improvements.into_iter().zip(raw_changes).enumerate() {
            values[[row, col]] = improvement;
            raw[[row, col]] = change;
        }
    }

    Ok(ImprovementMatrix {
        hand: table.hand(),
        conditions: kept.iter().map(|m| m.condition).collect(),
        baseline_row,
        columns,
        values,
        raw_changes: raw,
    })
}
