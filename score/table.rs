//! # Measurement Table
//!
//! Turns raw ingestion rows into the validated per patient-hand table the scoring
//! core works on.
//!
//! - Boundary validation: every required field must be present and parseable, and
//!   every value must be a finite number. Any violation is a `MalformedInputError`
//!   that abandons the unit.
//! - Standardization: raw parameter names are mapped onto the canonical vocabulary.
//!   Unknown names drop only their own row; the drop is recorded on the table.
//! - Trial aggregation: repeated measurements of the same parameter under the same
//!   condition are averaged, and the condition keeps its earliest chronological index.

use crate::standardize::{UnknownParameterError, standardize};
use crate::types::{
    Condition, ConditionKey, Hand, RawMeasurementRow, TherapyState, UnitId,
};
use crate::vocabulary::ParameterId;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Boundary validation failures. Each one is fatal for its unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedInputError {
    #[error("{origin}: required field '{field}' is missing")]
    MissingField {
        origin: String,
        field: &'static str,
    },
    #[error("{origin}: field '{field}' has unusable value '{value}' (expected {expected})")]
    InvalidField {
        origin: String,
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{origin}: value '{value}' of parameter '{parameter}' is not a finite number")]
    NonNumericValue {
        origin: String,
        parameter: String,
        value: String,
    },
    #[error("{origin}: row belongs to {found}, not to {expected}")]
    ForeignRow {
        origin: String,
        found: String,
        expected: String,
    },
    #[error("no measurement rows were supplied")]
    NoRows,
}

/// A row that was dropped because its parameter name is not in the vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedParameter {
    pub origin: String,
    pub condition: ConditionKey,
    pub reason: UnknownParameterError,
}

/// The averaged measurements of one condition.
#[derive(Debug, Clone)]
pub struct ConditionMeasurements {
    pub condition: Condition,
    /// Mean over trials, per parameter.
    pub values: BTreeMap<ParameterId, f64>,
    /// Number of trials averaged, per parameter.
    pub trials: BTreeMap<ParameterId, usize>,
}

impl ConditionMeasurements {
    pub fn value(&self, parameter: ParameterId) -> Option<f64> {
        self.values.get(&parameter).copied()
    }
}

/// Validated measurements of one patient and one hand.
#[derive(Debug, Clone)]
pub struct MeasurementTable {
    unit: UnitId,
    /// Sorted by chronological index, then condition key.
    conditions: Vec<ConditionMeasurements>,
    dropped: Vec<DroppedParameter>,
}

/// Rows grouped by patient-hand unit, plus the rows that could not be attributed.
#[derive(Debug, Default)]
pub struct PartitionedRows {
    pub units: BTreeMap<UnitId, Vec<RawMeasurementRow>>,
    /// Rows naming a patient but no usable hand. They may belong to any unit of that
    /// patient, so none of the patient's units is complete.
    pub handless: BTreeMap<String, Vec<MalformedInputError>>,
    /// Rows without a patient id.
    pub unassigned: Vec<MalformedInputError>,
}

/// Splits ingestion output into independent patient-hand units.
///
/// A row without a usable patient id or hand cannot belong to any unit. It is reported
/// in `handless` or `unassigned` instead of contaminating a unit.
pub fn partition_by_unit(rows: Vec<RawMeasurementRow>) -> PartitionedRows {
    let mut partitioned = PartitionedRows::default();
    for row in rows {
        let patient = match present(&row.patient_id) {
            Some(patient) => patient.to_string(),
            None => {
                partitioned.unassigned.push(MalformedInputError::MissingField {
                    origin: row.origin.clone(),
                    field: "patient_id",
                });
                continue;
            }
        };
        let hand = match parse_hand(&row) {
            Ok(hand) => hand,
            Err(err) => {
                partitioned.handless.entry(patient).or_default().push(err);
                continue;
            }
        };
        partitioned
            .units
            .entry(UnitId::new(patient, hand))
            .or_default()
            .push(row);
    }
    partitioned
}

#[derive(Default)]
struct ConditionAccumulator {
    first_index: u32,
    sums: BTreeMap<ParameterId, (f64, usize)>,
}

impl MeasurementTable {
    /// Validates, standardizes and aggregates the rows of one unit.
    pub fn from_rows(unit: UnitId, rows: &[RawMeasurementRow]) -> Result<Self, MalformedInputError> {
        if rows.is_empty() {
            return Err(MalformedInputError::NoRows);
        }

        let mut accumulators: BTreeMap<ConditionKey, ConditionAccumulator> = BTreeMap::new();
        let mut dropped = Vec::new();

        for row in rows {
            let patient = required(row, &row.patient_id, "patient_id")?;
            let hand = parse_hand(row)?;
            if patient != unit.patient_id || hand != unit.hand {
                return Err(MalformedInputError::ForeignRow {
                    origin: row.origin.clone(),
                    found: UnitId::new(patient, hand).to_string(),
                    expected: unit.to_string(),
                });
            }

            let medication = parse_state(row, &row.medication_state, "medication_state")?;
            let stimulation = parse_state(row, &row.stimulation_state, "stimulation_state")?;
            let program = match present(&row.program_id) {
                None => None,
                Some(text) => Some(text.parse::<u8>().map_err(|_| {
                    MalformedInputError::InvalidField {
                        origin: row.origin.clone(),
                        field: "program_id",
                        value: text.to_string(),
                        expected: "a small non-negative integer",
                    }
                })?),
            };
            let index_text = required(row, &row.chronological_index, "chronological_index")?;
            let chronological_index =
                index_text
                    .parse::<u32>()
                    .map_err(|_| MalformedInputError::InvalidField {
                        origin: row.origin.clone(),
                        field: "chronological_index",
                        value: index_text.to_string(),
                        expected: "a non-negative integer",
                    })?;
            let raw_name = required(row, &row.raw_parameter_name, "raw_parameter_name")?;
            let value_text = required(row, &row.value, "value")?;
            let value = value_text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| MalformedInputError::NonNumericValue {
                    origin: row.origin.clone(),
                    parameter: raw_name.to_string(),
                    value: value_text.to_string(),
                })?;

            let key = ConditionKey {
                medication,
                stimulation,
                hand,
                program,
            };

            let parameter = match standardize(raw_name) {
                Ok(parameter) => parameter,
                Err(reason) => {
                    log::debug!("{}: dropping row, {reason}", row.origin);
                    dropped.push(DroppedParameter {
                        origin: row.origin.clone(),
                        condition: key,
                        reason,
                    });
                    continue;
                }
            };

            let accumulator = accumulators.entry(key).or_insert_with(|| ConditionAccumulator {
                first_index: chronological_index,
                sums: BTreeMap::new(),
            });
            accumulator.first_index = accumulator.first_index.min(chronological_index);
            let slot = accumulator.sums.entry(parameter).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }

        let mut conditions: Vec<ConditionMeasurements> = accumulators
            .into_iter()
            .map(|(key, accumulator)| {
                let values = accumulator
                    .sums
                    .iter()
                    .map(|(&parameter, &(sum, count))| (parameter, sum / count as f64))
                    .collect();
                let trials = accumulator
                    .sums
                    .iter()
                    .map(|(&parameter, &(_, count))| (parameter, count))
                    .collect();
                ConditionMeasurements {
                    condition: Condition {
                        key,
                        chronological_index: accumulator.first_index,
                    },
                    values,
                    trials,
                }
            })
            .collect();
        conditions.sort_by(|a, b| a.condition.chronological_cmp(&b.condition));

        if !dropped.is_empty() {
            log::warn!(
                "{unit}: dropped {} row(s) with unrecognized parameter names",
                dropped.len()
            );
        }

        Ok(Self {
            unit,
            conditions,
            dropped,
        })
    }

    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    pub fn hand(&self) -> Hand {
        self.unit.hand
    }

    /// Conditions with at least one recognized measurement, in acquisition order.
    pub fn conditions(&self) -> &[ConditionMeasurements] {
        &self.conditions
    }

    pub fn dropped(&self) -> &[DroppedParameter] {
        &self.dropped
    }

    /// Every parameter measured under any condition, in canonical order.
    pub fn parameters(&self) -> Vec<ParameterId> {
        let present: BTreeSet<ParameterId> = self
            .conditions
            .iter()
            .flat_map(|c| c.values.keys().copied())
            .collect();
        present.into_iter().collect()
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(
    row: &RawMeasurementRow,
    field: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, MalformedInputError> {
    present(field).ok_or_else(|| MalformedInputError::MissingField {
        origin: row.origin.clone(),
        field: name,
    })
}

fn parse_hand(row: &RawMeasurementRow) -> Result<Hand, MalformedInputError> {
    let text = required(row, &row.hand, "hand")?;
    text.parse::<Hand>()
        .map_err(|_| MalformedInputError::InvalidField {
            origin: row.origin.clone(),
            field: "hand",
            value: text.to_string(),
            expected: "Left or Right",
        })
}

fn parse_state(
    row: &RawMeasurementRow,
    field: &Option<String>,
    name: &'static str,
) -> Result<TherapyState, MalformedInputError> {
    let text = required(row, field, name)?;
    text.parse::<TherapyState>()
        .map_err(|_| MalformedInputError::InvalidField {
            origin: row.origin.clone(),
            field: name,
            value: text.to_string(),
            expected: "Off or On",
        })
}
