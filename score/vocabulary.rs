//! # Canonical Kinematic Vocabulary
//!
//! The fixed set of kinematic parameters the engine understands, each tagged with the
//! direction in which the metric improves. Everything downstream (improvement sign,
//! column order, display names) is read from [`VOCABULARY`]; adding a parameter means
//! adding a variant and a table row, never touching computation code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identifier of a kinematic metric.
///
/// Variant order is the canonical column order and matches [`VOCABULARY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    MeanAmplitude,
    StdAmplitude,
    MeanSpeed,
    StdSpeed,
    #[serde(rename = "MeanRMSVelocity")]
    MeanRmsVelocity,
    #[serde(rename = "StdRMSVelocity")]
    StdRmsVelocity,
    MeanOpeningSpeed,
    StdOpeningSpeed,
    MeanClosingSpeed,
    StdClosingSpeed,
    MeanCycleDuration,
    StdCycleDuration,
    RangeCycleDuration,
    Frequency,
    AmplitudeDecay,
    VelocityDecay,
    RateDecay,
    #[serde(rename = "CVAmplitude")]
    CvAmplitude,
    #[serde(rename = "CVCycleDuration")]
    CvCycleDuration,
    #[serde(rename = "CVSpeed")]
    CvSpeed,
    #[serde(rename = "CVRMSVelocity")]
    CvRmsVelocity,
    #[serde(rename = "CVOpeningSpeed")]
    CvOpeningSpeed,
    #[serde(rename = "CVClosingSpeed")]
    CvClosingSpeed,
}

/// Whether a larger raw value of a metric means more therapeutic benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

impl Polarity {
    /// Multiplier that turns a raw change into an improvement.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Polarity::HigherIsBetter => 1.0,
            Polarity::LowerIsBetter => -1.0,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Polarity::HigherIsBetter => "higher is better",
            Polarity::LowerIsBetter => "lower is better",
        }
    }
}

/// One row of the vocabulary table.
#[derive(Debug)]
pub struct ParameterSpec {
    pub id: ParameterId,
    /// Canonical CamelCase name used in output files.
    pub canonical: &'static str,
    /// Name shown in rendered documents.
    pub display: &'static str,
    pub polarity: Polarity,
    /// Additional raw spellings, already in normalized (lowercase alphanumeric) form.
    pub aliases: &'static [&'static str],
}

use Polarity::{HigherIsBetter as Higher, LowerIsBetter as Lower};

const fn entry(
    id: ParameterId,
    canonical: &'static str,
    display: &'static str,
    polarity: Polarity,
    aliases: &'static [&'static str],
) -> ParameterSpec {
    ParameterSpec {
        id,
        canonical,
        display,
        polarity,
        aliases,
    }
}

pub static VOCABULARY: [ParameterSpec; 23] = [
    entry(ParameterId::MeanAmplitude, "MeanAmplitude", "Mean Amplitude", Higher, &[]),
    entry(ParameterId::StdAmplitude, "StdAmplitude", "SD of Amplitude", Lower, &[]),
    entry(ParameterId::MeanSpeed, "MeanSpeed", "Mean Speed", Higher, &[]),
    entry(ParameterId::StdSpeed, "StdSpeed", "SD of Speed", Lower, &[]),
    entry(ParameterId::MeanRmsVelocity, "MeanRMSVelocity", "Mean RMS Velocity", Higher, &[]),
    entry(ParameterId::StdRmsVelocity, "StdRMSVelocity", "SD of RMS Velocity", Lower, &[]),
    entry(ParameterId::MeanOpeningSpeed, "MeanOpeningSpeed", "Mean Opening Speed", Higher, &[]),
    entry(ParameterId::StdOpeningSpeed, "StdOpeningSpeed", "SD of Opening Speed", Lower, &[]),
    entry(ParameterId::MeanClosingSpeed, "MeanClosingSpeed", "Mean Closing Speed", Higher, &[]),
    entry(ParameterId::StdClosingSpeed, "StdClosingSpeed", "SD of Closing Speed", Lower, &[]),
    entry(ParameterId::MeanCycleDuration, "MeanCycleDuration", "Mean Cycle Duration", Lower, &[]),
    entry(ParameterId::StdCycleDuration, "StdCycleDuration", "SD of Cycle Duration", Lower, &[]),
    entry(ParameterId::RangeCycleDuration, "RangeCycleDuration", "Range of Cycle Duration", Lower, &[]),
    entry(ParameterId::Frequency, "Frequency", "Frequency", Higher, &["rate"]),
    entry(ParameterId::AmplitudeDecay, "AmplitudeDecay", "Amplitude Decay", Lower, &[]),
    entry(ParameterId::VelocityDecay, "VelocityDecay", "Velocity Decay", Lower, &[]),
    entry(ParameterId::RateDecay, "RateDecay", "Rate Decay", Lower, &[]),
    entry(ParameterId::CvAmplitude, "CVAmplitude", "CV of Amplitude", Lower, &[]),
    entry(ParameterId::CvCycleDuration, "CVCycleDuration", "CV of Cycle Duration", Lower, &[]),
    entry(ParameterId::CvSpeed, "CVSpeed", "CV of Speed", Lower, &[]),
    entry(ParameterId::CvRmsVelocity, "CVRMSVelocity", "CV of RMS Velocity", Lower, &[]),
    entry(ParameterId::CvOpeningSpeed, "CVOpeningSpeed", "CV of Opening Speed", Lower, &[]),
    entry(ParameterId::CvClosingSpeed, "CVClosingSpeed", "CV of Closing Speed", Lower, &[]),
];

impl ParameterId {
    /// Position in the canonical column order.
    #[inline]
    pub fn canonical_index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn entry(self) -> &'static ParameterSpec {
        &VOCABULARY[self.canonical_index()]
    }

    pub fn canonical_name(self) -> &'static str {
        self.entry().canonical
    }

    pub fn display_name(self) -> &'static str {
        self.entry().display
    }

    pub fn polarity(self) -> Polarity {
        self.entry().polarity
    }

    /// All parameters in canonical order.
    pub fn all() -> impl Iterator<Item = ParameterId> {
        VOCABULARY.iter().map(|entry| entry.id)
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}
