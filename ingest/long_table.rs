use super::IngestError;
use crate::types::RawMeasurementRow;
use std::path::Path;

/// Columns a long-format measurement table must carry. `program_id` is optional.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "patient_id",
    "hand",
    "medication_state",
    "stimulation_state",
    "chronological_index",
    "raw_parameter_name",
    "value",
];

/// Reads a long-format table, one measurement per line.
///
/// Each row keeps its `file:line` origin so that a validation failure later points at
/// the offending line.
pub fn read_long_table(path: &Path) -> Result<Vec<RawMeasurementRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| IngestError::csv(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| IngestError::csv(path, e))?
        .clone();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !headers.iter().any(|h| h == **name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::csv(path, e))?;
        let line = record.position().map_or(0, |p| p.line());
        let mut row: RawMeasurementRow = record
            .deserialize(Some(&headers))
            .map_err(|e| IngestError::csv(path, e))?;
        row.origin = format!("{source}:{line}");
        rows.push(row);
    }
    log::debug!("read {} measurement row(s) from '{}'", rows.len(), path.display());
    Ok(rows)
}
