//! # View Transformer
//!
//! Two re-orderings of the same improvement matrix:
//!
//! - Engineering: rows in acquisition order, columns in canonical order. Shows what was
//!   tested, in the order it was tested.
//! - Clinical: rows best-first with the baseline as the trailing zero reference,
//!   columns from most to least responsive. Puts the answer in the top-left corner.
//!
//! Values are copied cell for cell; a view never changes a number.

use crate::baseline::ImprovementMatrix;
use crate::rank::Ranking;
use crate::types::Condition;
use crate::vocabulary::ParameterId;
use crate::weighting::{WeightVector, weight_order};
use ndarray::Array2;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewKind {
    Engineering,
    Clinical,
}

impl ViewKind {
    pub fn title(self) -> &'static str {
        match self {
            ViewKind::Engineering => "Engineering view (chronological)",
            ViewKind::Clinical => "Clinical view (ranked by DWIS, parameters by responsiveness)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewMatrix {
    pub kind: ViewKind,
    pub row_conditions: Vec<Condition>,
    pub row_labels: Vec<String>,
    pub columns: Vec<ParameterId>,
    pub column_labels: Vec<String>,
    pub column_weights: Vec<f64>,
    pub values: Array2<Option<f64>>,
    /// Row of the best-ranked condition.
    pub highlighted_row: Option<usize>,
    pub baseline_row: usize,
}

impl ViewMatrix {
    /// Half-width of the symmetric color scale: the largest absolute value, or 0.1 for
    /// an all-zero matrix.
    pub fn color_limit(&self) -> f64 {
        let largest = self
            .values
            .iter()
            .flatten()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        if largest < 1e-6 { 0.1 } else { largest }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewPair {
    pub engineering: ViewMatrix,
    pub clinical: ViewMatrix,
}

fn arrange(
    kind: ViewKind,
    matrix: &ImprovementMatrix,
    weights: &WeightVector,
    rows: Vec<usize>,
    columns: Vec<usize>,
    highlighted_row: Option<usize>,
) -> ViewMatrix {
    let mut values = Array2::from_elem((rows.len(), columns.len()), None);
    for (i, &row) in rows.iter().enumerate() {
        for (j, &col) in columns.iter().enumerate() {
            values[[i, j]] = matrix.value(row, col);
        }
    }

    let parameters: Vec<ParameterId> = columns.iter().map(|&col| matrix.columns()[col]).collect();
    let row_conditions: Vec<Condition> = rows.iter().map(|&row| matrix.conditions()[row]).collect();
    let baseline_row = rows
        .iter()
        .position(|&row| row == matrix.baseline_row())
        .unwrap_or(rows.len());

    ViewMatrix {
        kind,
        row_labels: row_conditions.iter().map(Condition::label).collect(),
        row_conditions,
        column_labels: parameters.iter().map(|p| p.display_name().to_string()).collect(),
        column_weights: parameters.iter().map(|&p| weights.weight(p)).collect(),
        columns: parameters,
        values,
        highlighted_row,
        baseline_row,
    }
}

pub fn engineering_view(
    matrix: &ImprovementMatrix,
    weights: &WeightVector,
    ranking: &Ranking,
) -> ViewMatrix {
    let rows: Vec<usize> = (0..matrix.conditions().len()).collect();
    let columns: Vec<usize> = (0..matrix.columns().len()).collect();
    let highlighted = ranking
        .best()
        .and_then(|best| matrix.row_of(&best.condition));
    arrange(ViewKind::Engineering, matrix, weights, rows, columns, highlighted)
}

pub fn clinical_view(
    matrix: &ImprovementMatrix,
    weights: &WeightVector,
    ranking: &Ranking,
) -> ViewMatrix {
    let mut rows: Vec<usize> = ranking
        .entries()
        .iter()
        .filter_map(|entry| matrix.row_of(&entry.condition))
        .collect();
    rows.push(matrix.baseline_row());

    let mut columns: Vec<usize> = (0..matrix.columns().len()).collect();
    columns.sort_by(|&a, &b| weight_order(weights, matrix.columns()[a], matrix.columns()[b]));

    let highlighted = ranking.best().map(|_| 0);
    arrange(ViewKind::Clinical, matrix, weights, rows, columns, highlighted)
}

pub fn build_views(matrix: &ImprovementMatrix, weights: &WeightVector, ranking: &Ranking) -> ViewPair {
    ViewPair {
        engineering: engineering_view(matrix, weights, ranking),
        clinical: clinical_view(matrix, weights, ranking),
    }
}
