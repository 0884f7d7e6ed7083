//! # Responsiveness Weighting
//!
//! A parameter that changes a lot across the tested settings tells us more about which
//! setting works than one that barely moves. Each parameter's weight is its spread
//! (sample standard deviation of the improvement values over the candidate
//! conditions) divided by the total spread, optionally shrunk toward a uniform
//! distribution over the responsive parameters.

use crate::baseline::ImprovementMatrix;
use crate::config::{AnalysisConfig, ZeroVariabilityPolicy};
use crate::vocabulary::ParameterId;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightingError {
    #[error(
        "none of the {parameters} parameter(s) varies across the {conditions} candidate condition(s); responsiveness weights are undefined"
    )]
    InsufficientVariability { conditions: usize, parameters: usize },
}

/// How the final weights were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeightBasis {
    /// Spread over total spread.
    DataDriven,
    /// Data-driven weights blended with a uniform distribution over responsive parameters.
    Regularized,
    /// No parameter varied; every column got the same weight.
    UniformFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterWeight {
    pub parameter: ParameterId,
    /// Sample standard deviation across candidate conditions, `None` when there were
    /// too few defined observations to estimate it.
    pub variability: Option<f64>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightVector {
    /// One entry per matrix column, in canonical order.
    entries: Vec<ParameterWeight>,
    basis: WeightBasis,
}

impl WeightVector {
    pub fn entries(&self) -> &[ParameterWeight] {
        &self.entries
    }

    pub fn basis(&self) -> WeightBasis {
        self.basis
    }

    /// Weight of `parameter`, 0.0 for a parameter that is not a column.
    pub fn weight(&self, parameter: ParameterId) -> f64 {
        self.entries
            .iter()
            .find(|entry| entry.parameter == parameter)
            .map_or(0.0, |entry| entry.weight)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|entry| entry.weight).sum()
    }

    /// Entries from most to least responsive; equal weights keep canonical order.
    pub fn by_weight_desc(&self) -> Vec<&ParameterWeight> {
        let mut sorted: Vec<&ParameterWeight> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.parameter.cmp(&b.parameter))
        });
        sorted
    }
}

/// Sample standard deviation with an `n - 1` denominator. `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((squares / (n - 1.0)).sqrt())
}

/// Derives the weight vector of `matrix` from its candidate rows.
pub fn responsiveness_weights(
    matrix: &ImprovementMatrix,
    config: &AnalysisConfig,
) -> Result<WeightVector, WeightingError> {
    let candidates: Vec<usize> = matrix.candidate_rows().collect();
    let columns = matrix.columns();

    let variability: Vec<Option<f64>> = (0..columns.len())
        .map(|col| {
            let defined: Vec<f64> = candidates
                .iter()
                .filter_map(|&row| matrix.value(row, col))
                .collect();
            if defined.len() < config.min_observations {
                None
            } else {
                sample_std(&defined)
            }
        })
        .collect();

    // Spread that counts toward the weights; at or below the floor is no spread.
    let spread: Vec<f64> = variability
        .iter()
        .map(|v| match v {
            Some(s) if *s > config.variability_floor => *s,
            _ => 0.0,
        })
        .collect();
    let total: f64 = spread.iter().sum();

    let (weights, basis) = if total > 0.0 {
        let data_driven = spread.iter().map(|s| s / total);
        let lambda = config.shrinkage_lambda;
        if lambda > 0.0 {
            let responsive = spread.iter().filter(|&&s| s > 0.0).count() as f64;
            let weights = data_driven
                .zip(&spread)
                .map(|(w, &s)| {
                    let uniform = if s > 0.0 { 1.0 / responsive } else { 0.0 };
                    (1.0 - lambda) * w + lambda * uniform
                })
                .collect();
            (weights, WeightBasis::Regularized)
        } else {
            (data_driven.collect(), WeightBasis::DataDriven)
        }
    } else {
        match config.zero_variability {
            ZeroVariabilityPolicy::Error => {
                return Err(WeightingError::InsufficientVariability {
                    conditions: candidates.len(),
                    parameters: columns.len(),
                });
            }
            ZeroVariabilityPolicy::Uniform => {
                log::warn!(
                    "{} hand: no parameter varies across {} candidate condition(s), using uniform weights",
                    matrix.hand(),
                    candidates.len()
                );
                let uniform = 1.0 / columns.len().max(1) as f64;
                (vec![uniform; columns.len()], WeightBasis::UniformFallback)
            }
        }
    };

    let entries = columns
        .iter()
        .zip(variability)
        .zip(weights)
        .map(|((&parameter, variability), weight)| ParameterWeight {
            parameter,
            variability,
            weight,
        })
        .collect();

    Ok(WeightVector { entries, basis })
}

/// Orders two parameters by descending weight. Shared by the clinical view.
pub fn weight_order(weights: &WeightVector, a: ParameterId, b: ParameterId) -> Ordering {
    weights
        .weight(b)
        .total_cmp(&weights.weight(a))
        .then_with(|| a.cmp(&b))
}
