//! # Measurement Ingestion
//!
//! Produces raw measurement rows from two kinds of sources:
//!
//! - a data folder with one subfolder per patient, holding one `Attribute,Value` CSV per
//!   acquisition whose file name encodes the therapy setting and hand;
//! - a long-format table with one measurement per row.
//!
//! Ingestion never judges values. Validation happens when the rows of a patient-hand
//! unit are turned into a measurement table.

pub mod filename;
pub mod folder;
pub mod long_table;

use std::path::PathBuf;
use thiserror::Error;

pub use filename::{FilenameLabel, FilenameParser, ProgramNumberError};
pub use folder::{PatientData, SkippedFile, discover_patients, load_patient};
pub use long_table::read_long_table;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse CSV '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("'{}' lacks required column(s): {}", .path.display(), .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        IngestError::Csv {
            path: path.into(),
            source,
        }
    }
}
