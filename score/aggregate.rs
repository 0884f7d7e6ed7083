use crate::baseline::ImprovementMatrix;
use crate::types::Condition;
use crate::weighting::WeightVector;
use serde::Serialize;

/// The weighted improvement score of one candidate condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub condition: Condition,
    pub score: f64,
    /// Total weight of the defined cells before renormalization. 1.0 when every
    /// weighted parameter was measured.
    pub coverage: f64,
    pub defined_parameters: usize,
}

impl ScoreEntry {
    /// Whether any defined cell carries weight. A score without weighted evidence is
    /// reported but never competes with supported scores.
    pub fn is_supported(&self) -> bool {
        self.coverage > 0.0
    }
}

/// Scores of every candidate condition of one hand, in acquisition order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwisTable {
    entries: Vec<ScoreEntry>,
}

impl DwisTable {
    pub fn from_entries(entries: Vec<ScoreEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn score_of(&self, condition: &Condition) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| &entry.condition == condition)
            .map(|entry| entry.score)
    }
}

/// Combines each candidate row of `matrix` with `weights`.
///
/// Weights of undefined cells are spread proportionally over the defined ones, so the
/// contributing weights of every score sum to one.
pub fn aggregate_scores(matrix: &ImprovementMatrix, weights: &WeightVector) -> DwisTable {
    let column_weights: Vec<f64> = matrix.columns().iter().map(|&p| weights.weight(p)).collect();

    let entries = matrix
        .candidate_rows()
        .map(|row| {
            let mut weighted = 0.0;
            let mut coverage = 0.0;
            let mut defined_parameters = 0;
            for (col, &weight) in column_weights.iter().enumerate() {
                if let Some(value) = matrix.value(row, col) {
                    weighted += weight * value;
                    coverage += weight;
                    defined_parameters += 1;
                }
            }

            let condition = matrix.conditions()[row];
            let score = if coverage > 0.0 {
                weighted / coverage + 0.0
            } else {
                log::warn!(
                    "{} hand: '{}' has no weighted parameter among its {} measured, scoring it 0 and ranking it last",
                    matrix.hand(),
                    condition.label(),
                    defined_parameters
                );
                0.0
            };

            ScoreEntry {
                condition,
                score,
                coverage,
                defined_parameters,
            }
        })
        .collect();

    DwisTable::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::compute_improvement;
    use crate::config::{AnalysisConfig, ImprovementScale};
    use crate::table::MeasurementTable;
    use crate::types::{BaselineKey, Hand, RawMeasurementRow, UnitId};
    use crate::weighting::responsiveness_weights;
    use approx::assert_abs_diff_eq;

    fn scored(cells: &[(u32, &str, f64)]) -> (ImprovementMatrix, WeightVector, DwisTable) {
        let rows: Vec<RawMeasurementRow> = cells
            .iter()
            .map(|&(index, name, value)| RawMeasurementRow {
                patient_id: Some("P".to_string()),
                hand: Some("Left".to_string()),
                medication_state: Some("Off".to_string()),
                stimulation_state: Some(if index == 0 { "Off" } else { "On" }.to_string()),
                program_id: Some(if index == 0 { String::new() } else { index.to_string() }),
                chronological_index: Some(index.to_string()),
                raw_parameter_name: Some(name.to_string()),
                value: Some(value.to_string()),
                origin: "test".to_string(),
            })
            .collect();
        let table = MeasurementTable::from_rows(UnitId::new("P", Hand::Left), &rows).unwrap();
        let matrix =
            compute_improvement(&table, &BaselineKey::MED_OFF_DBS_OFF, ImprovementScale::Delta)
                .unwrap();
        let weights = responsiveness_weights(&matrix, &AnalysisConfig::default()).unwrap();
        let table = aggregate_scores(&matrix, &weights);
        (matrix, weights, table)
    }

    #[test]
    fn fully_defined_rows_are_plain_dot_products() {
        let (matrix, weights, table) = scored(&[
            (0, "MeanAmplitude", 0.0),
            (0, "MeanSpeed", 0.0),
            (1, "MeanAmplitude", 1.0),
            (1, "MeanSpeed", 0.0),
            (2, "MeanAmplitude", 3.0),
            (2, "MeanSpeed", 3.0),
        ]);
        assert_eq!(table.len(), 2);
        for entry in table.entries() {
            let row = matrix.row_of(&entry.condition).unwrap();
            let expected: f64 = matrix
                .columns()
                .iter()
                .enumerate()
                .map(|(col, &p)| weights.weight(p) * matrix.value(row, col).unwrap())
                .sum();
            assert_abs_diff_eq!(entry.score, expected, epsilon = 1e-12);
            assert_abs_diff_eq!(entry.coverage, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn missing_cells_renormalize_the_remaining_weight() {
        let (matrix, weights, table) = scored(&[
            (0, "MeanAmplitude", 0.0),
            (0, "MeanSpeed", 0.0),
            (1, "MeanAmplitude", 1.0),
            (1, "MeanSpeed", 0.0),
            (2, "MeanAmplitude", 3.0),
            (2, "MeanSpeed", 3.0),
            (3, "MeanAmplitude", 2.0),
        ]);
        let partial = &table.entries()[2];
        assert_eq!(partial.defined_parameters, 1);
        assert_abs_diff_eq!(partial.score, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            partial.coverage,
            weights.weight(crate::vocabulary::ParameterId::MeanAmplitude),
            epsilon = 1e-12
        );
        assert!(matrix.row_of(&partial.condition).is_some());
    }

    #[test]
    fn baseline_is_never_scored() {
        let (matrix, _, table) = scored(&[
            (0, "MeanSpeed", 1.0),
            (1, "MeanSpeed", 2.0),
            (2, "MeanSpeed", 4.0),
        ]);
        assert_eq!(table.score_of(matrix.baseline()), None);
        assert_eq!(table.len(), matrix.conditions().len() - 1);
    }
}
