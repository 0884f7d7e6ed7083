//! Renders the per-patient engineering vs clinical document.

pub mod render;

use crate::batch::UnitFailure;
use crate::pipeline::HandAnalysis;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use render::render_patient_report;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("patient {0} has no analyzed or failed hand to report")]
    NothingToReport(String),
}

pub fn report_path(dir: &Path, patient_id: &str) -> PathBuf {
    dir.join(format!("report_{patient_id}_engineering_vs_clinical.txt"))
}

/// Writes the report of one patient into `dir` and returns its path.
pub fn write_patient_report(
    dir: &Path,
    patient_id: &str,
    analyses: &[&HandAnalysis],
    failures: &[&UnitFailure],
) -> Result<PathBuf, ReportError> {
    if analyses.is_empty() && failures.is_empty() {
        return Err(ReportError::NothingToReport(patient_id.to_string()));
    }
    let path = report_path(dir, patient_id);
    let document = render_patient_report(patient_id, analyses, failures);
    fs::write(&path, document).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
