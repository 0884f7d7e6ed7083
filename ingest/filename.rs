use crate::types::{Hand, TherapyState};
use regex::Regex;
use thiserror::Error;

/// Therapy setting and hand encoded in an acquisition file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilenameLabel {
    pub medication: TherapyState,
    pub stimulation: TherapyState,
    pub program: Option<u8>,
    /// `None` when the name mentions neither hand.
    pub hand: Option<Hand>,
}

impl FilenameLabel {
    /// Position of this setting in a typical session: every stimulation-off recording
    /// first, then the numbered programs by number, then an unnumbered stimulation-on
    /// recording. Medication state does not move a recording.
    pub fn acquisition_rank(&self) -> u32 {
        match (self.stimulation, self.program) {
            (TherapyState::Off, _) => 0,
            (TherapyState::On, Some(program)) => u32::from(program),
            (TherapyState::On, None) => 100,
        }
    }
}

/// A program token whose number does not fit a program id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("program number '{digits}' in '{file}' is not between 0 and 255")]
pub struct ProgramNumberError {
    pub file: String,
    pub digits: String,
}

/// Case-insensitive patterns for the tokens acquisition software puts in file names,
/// e.g. `P01_Med_Off_DBS_On_Pr3_left_trial2.csv`.
#[derive(Debug, Clone)]
pub struct FilenameParser {
    med_on: Regex,
    dbs_on: Regex,
    left: Regex,
    right: Regex,
    program: Regex,
}

impl FilenameParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            med_on: Regex::new(r"(?i)med[_\s]*on")?,
            dbs_on: Regex::new(r"(?i)dbs[_\s]*on")?,
            left: Regex::new(r"(?i)left")?,
            right: Regex::new(r"(?i)right")?,
            program: Regex::new(r"(?i)(?:pr|level[_\s]?)(\d+)")?,
        })
    }

    /// Absent tokens default to Off; a name with both hands counts as left. A program
    /// number that is out of range is an error rather than a missing program.
    pub fn parse(&self, file_name: &str) -> Result<FilenameLabel, ProgramNumberError> {
        let state = |re: &Regex| {
            if re.is_match(file_name) {
                TherapyState::On
            } else {
                TherapyState::Off
            }
        };
        let program = match self.program.captures(file_name).and_then(|caps| caps.get(1)) {
            Some(digits) => Some(digits.as_str().parse::<u8>().map_err(|_| ProgramNumberError {
                file: file_name.to_string(),
                digits: digits.as_str().to_string(),
            })?),
            None => None,
        };
        let hand = if self.left.is_match(file_name) {
            Some(Hand::Left)
        } else if self.right.is_match(file_name) {
            Some(Hand::Right)
        } else {
            None
        };

        Ok(FilenameLabel {
            medication: state(&self.med_on),
            stimulation: state(&self.dbs_on),
            program,
            hand,
        })
    }
}
