// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// A failure to interpret a textual label (hand, therapy state, baseline key).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot interpret '{input}' as {expected}")]
pub struct LabelParseError {
    pub input: String,
    pub expected: &'static str,
}

impl LabelParseError {
    fn new(input: &str, expected: &'static str) -> Self {
        Self {
            input: input.to_string(),
            expected,
        }
    }
}

/// The hand a measurement was taken from. Each hand is an independent scoring context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "Left",
            Hand::Right => "Right",
        }
    }

    /// Lowercase tag used in output file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hand {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Hand::Left),
            "right" | "r" => Ok(Hand::Right),
            _ => Err(LabelParseError::new(s, "a hand (Left or Right)")),
        }
    }
}

/// On/off state of a therapy (medication or stimulation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TherapyState {
    Off,
    On,
}

impl TherapyState {
    pub fn as_str(self) -> &'static str {
        match self {
            TherapyState::Off => "Off",
            TherapyState::On => "On",
        }
    }
}

impl fmt::Display for TherapyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TherapyState {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" | "false" => Ok(TherapyState::Off),
            "on" | "1" | "true" => Ok(TherapyState::On),
            _ => Err(LabelParseError::new(s, "a therapy state (Off or On)")),
        }
    }
}

/// The identity of a tested therapy setting: everything about a condition except
/// when it was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConditionKey {
    pub medication: TherapyState,
    pub stimulation: TherapyState,
    pub hand: Hand,
    pub program: Option<u8>,
}

impl ConditionKey {
    /// Human-readable label without the hand, e.g. `Med Off - DBS On - Pr2`.
    pub fn label(&self) -> String {
        let mut label = format!("Med {} - DBS {}", self.medication, self.stimulation);
        if let Some(program) = self.program {
            label.push_str(&format!(" - Pr{program}"));
        }
        label
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} hand)", self.label(), self.hand)
    }
}

/// A condition as it appears in one patient-hand table.
///
/// Equality and hashing only consider the [`ConditionKey`]; the chronological index
/// is acquisition metadata.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Condition {
    pub key: ConditionKey,
    pub chronological_index: u32,
}

impl Condition {
    pub fn label(&self) -> String {
        self.key.label()
    }

    /// Acquisition order: chronological index, then the key so the order is total.
    pub fn chronological_cmp(&self, other: &Condition) -> Ordering {
        self.chronological_index
            .cmp(&other.chronological_index)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Condition {}

impl Hash for Condition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Selects the reference condition of a patient-hand table.
///
/// Medication and stimulation state must match. Without a program selector every
/// program of that combination matches, which makes the key ambiguous when several
/// programs were recorded and none of them is unnumbered. An unnumbered recording is
/// an exact match and wins over numbered ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineKey {
    pub medication: TherapyState,
    pub stimulation: TherapyState,
    pub program: Option<u8>,
}

impl BaselineKey {
    /// The conventional reference: no medication, stimulation off.
    pub const MED_OFF_DBS_OFF: BaselineKey = BaselineKey {
        medication: TherapyState::Off,
        stimulation: TherapyState::Off,
        program: None,
    };

    pub fn matches(&self, key: &ConditionKey) -> bool {
        self.medication == key.medication
            && self.stimulation == key.stimulation
            && self.program.is_none_or(|program| key.program == Some(program))
    }

    /// The key selecting exactly this condition's therapy setting.
    pub fn for_condition(key: &ConditionKey) -> Self {
        Self {
            medication: key.medication,
            stimulation: key.stimulation,
            program: key.program,
        }
    }
}

impl fmt::Display for BaselineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Med {} - DBS {}", self.medication, self.stimulation)?;
        if let Some(program) = self.program {
            write!(f, " - Pr{program}")?;
        }
        Ok(())
    }
}

impl FromStr for BaselineKey {
    type Err = LabelParseError;

    /// Accepts labels such as `Med Off - DBS Off`, `med_on_dbs_on_pr3` or
    /// `Med Off - DBS On - Level 2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const EXPECTED: &str = "a baseline label such as 'Med Off - DBS Off'";

        let normalized: String = s
            .chars()
            .map(|c| match c {
                '-' | '_' => ' ',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        let mut medication = None;
        let mut stimulation = None;
        let mut program = None;
        let mut idx = 0;
        while idx < tokens.len() {
            let token = tokens[idx];
            let next = tokens.get(idx + 1).copied();
            match token {
                "med" | "medication" => {
                    let state = next.ok_or_else(|| LabelParseError::new(s, EXPECTED))?;
                    medication = Some(state.parse::<TherapyState>()?);
                    idx += 2;
                }
                "dbs" | "stim" | "stimulation" => {
                    let state = next.ok_or_else(|| LabelParseError::new(s, EXPECTED))?;
                    stimulation = Some(state.parse::<TherapyState>()?);
                    idx += 2;
                }
                "pr" | "level" => {
                    let number = next.ok_or_else(|| LabelParseError::new(s, EXPECTED))?;
                    program = Some(
                        number
                            .parse::<u8>()
                            .map_err(|_| LabelParseError::new(s, EXPECTED))?,
                    );
                    idx += 2;
                }
                other => {
                    let digits = other
                        .strip_prefix("level")
                        .or_else(|| other.strip_prefix("pr"))
                        .filter(|rest| !rest.is_empty())
                        .ok_or_else(|| LabelParseError::new(s, EXPECTED))?;
                    program = Some(
                        digits
                            .parse::<u8>()
                            .map_err(|_| LabelParseError::new(s, EXPECTED))?,
                    );
                    idx += 1;
                }
            }
        }

        match (medication, stimulation) {
            (Some(medication), Some(stimulation)) => Ok(BaselineKey {
                medication,
                stimulation,
                program,
            }),
            _ => Err(LabelParseError::new(s, EXPECTED)),
        }
    }
}

/// One patient-hand scoring unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitId {
    pub patient_id: String,
    pub hand: Hand,
}

impl UnitId {
    pub fn new(patient_id: impl Into<String>, hand: Hand) -> Self {
        Self {
            patient_id: patient_id.into(),
            hand,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patient {} ({} hand)", self.patient_id, self.hand)
    }
}

/// A measurement row exactly as delivered by ingestion, before validation.
///
/// Every field is optional so that absent or empty values surface as a
/// `MalformedInputError` for the affected unit instead of failing the whole read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawMeasurementRow {
    pub patient_id: Option<String>,
    pub hand: Option<String>,
    pub medication_state: Option<String>,
    pub stimulation_state: Option<String>,
    pub program_id: Option<String>,
    pub chronological_index: Option<String>,
    pub raw_parameter_name: Option<String>,
    pub value: Option<String>,
    /// Where the row came from (file and line), for diagnostics.
    #[serde(skip)]
    pub origin: String,
}
