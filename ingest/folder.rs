use super::IngestError;
use super::filename::{FilenameLabel, FilenameParser};
use crate::types::{BaselineKey, RawMeasurementRow};
use std::fs;
use std::path::{Path, PathBuf};

/// An acquisition file that contributed no rows, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Everything read from one patient folder.
#[derive(Debug, Clone)]
pub struct PatientData {
    pub patient_id: String,
    pub rows: Vec<RawMeasurementRow>,
    pub skipped_files: Vec<SkippedFile>,
    /// Distinct therapy settings with data, in acquisition order.
    pub available_conditions: Vec<BaselineKey>,
}

/// Patient subfolders of `data_dir`, in natural order (`P2` before `P10`).
pub fn discover_patients(data_dir: &Path) -> Result<Vec<(String, PathBuf)>, IngestError> {
    if !data_dir.is_dir() {
        return Err(IngestError::NotADirectory(data_dir.to_path_buf()));
    }
    let mut patients = Vec::new();
    for entry in fs::read_dir(data_dir).map_err(|e| IngestError::io(data_dir, e))? {
        let entry = entry.map_err(|e| IngestError::io(data_dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            patients.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    patients.sort_by(|a, b| natord::compare(&a.0, &b.0));
    Ok(patients)
}

struct Acquisition {
    name: String,
    path: PathBuf,
    label: FilenameLabel,
}

/// Reads every `*.csv` acquisition of one patient folder.
///
/// Files whose name carries no hand or an out-of-range program number, that cannot be
/// read, or that lack the `Attribute`/`Value` columns are skipped with a warning. Acquisitions are numbered in
/// session order (see [`FilenameLabel::acquisition_rank`]), ties broken by natural
/// file name order.
pub fn load_patient(
    patient_id: &str,
    dir: &Path,
    parser: &FilenameParser,
) -> Result<PatientData, IngestError> {
    let mut acquisitions = Vec::new();
    let mut skipped_files = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))? {
        let path = entry.map_err(|e| IngestError::io(dir, e))?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !path.is_file() || !is_csv {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = match parser.parse(&name) {
            Ok(label) => label,
            Err(err) => {
                log::warn!("{patient_id}: skipping '{name}', {err}");
                skipped_files.push(SkippedFile {
                    file: name,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if label.hand.is_none() {
            log::warn!("{patient_id}: '{name}' names no hand, skipping it");
            skipped_files.push(SkippedFile {
                file: name,
                reason: "file name names no hand".to_string(),
            });
            continue;
        }
        acquisitions.push(Acquisition { name, path, label });
    }

    acquisitions.sort_by(|a, b| {
        a.label
            .acquisition_rank()
            .cmp(&b.label.acquisition_rank())
            .then_with(|| natord::compare(&a.name, &b.name))
    });

    let mut rows = Vec::new();
    let mut available_conditions: Vec<BaselineKey> = Vec::new();
    for (index, acquisition) in acquisitions.iter().enumerate() {
        match read_attribute_file(patient_id, acquisition, index as u32) {
            Ok(file_rows) => {
                let key = BaselineKey {
                    medication: acquisition.label.medication,
                    stimulation: acquisition.label.stimulation,
                    program: acquisition.label.program,
                };
                if !file_rows.is_empty() && !available_conditions.contains(&key) {
                    available_conditions.push(key);
                }
                rows.extend(file_rows);
            }
            Err(err) => {
                log::warn!("{patient_id}: skipping '{}', {err}", acquisition.name);
                skipped_files.push(SkippedFile {
                    file: acquisition.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(PatientData {
        patient_id: patient_id.to_string(),
        rows,
        skipped_files,
        available_conditions,
    })
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn read_attribute_file(
    patient_id: &str,
    acquisition: &Acquisition,
    chronological_index: u32,
) -> Result<Vec<RawMeasurementRow>, IngestError> {
    let path = &acquisition.path;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestError::csv(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| IngestError::csv(path, e))?
        .clone();

    let (attribute, value) = match (column(&headers, "Attribute"), column(&headers, "Value")) {
        (Some(attribute), Some(value)) => (attribute, value),
        (attribute, value) => {
            let missing = [("Attribute", attribute), ("Value", value)]
                .iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(IngestError::MissingColumns {
                path: path.clone(),
                missing,
            });
        }
    };

    let label = acquisition.label;
    let hand = label.hand.map(|h| h.as_str().to_string());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::csv(path, e))?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push(RawMeasurementRow {
            patient_id: Some(patient_id.to_string()),
            hand: hand.clone(),
            medication_state: Some(label.medication.as_str().to_string()),
            stimulation_state: Some(label.stimulation.as_str().to_string()),
            program_id: label.program.map(|p| p.to_string()),
            chronological_index: Some(chronological_index.to_string()),
            raw_parameter_name: record.get(attribute).map(str::to_string),
            value: record.get(value).map(str::to_string),
            origin: format!("{}:{line}", acquisition.name),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn patients_are_discovered_in_natural_order() {
        let root = tempdir().unwrap();
        for name in ["P10", "P2", "P1"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        write(root.path(), "notes.txt", "not a patient");
        let names: Vec<String> = discover_patients(root.path())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["P1", "P2", "P10"]);
    }

    #[test]
    fn acquisitions_are_numbered_in_session_order() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Med_Off_DBS_On_Pr2_right.csv", "Attribute,Value\nMeanSpeed,3.0\n");
        write(dir.path(), "Med_Off_DBS_Off_right.csv", "Attribute,Value\nMeanSpeed,1.0\n");
        write(dir.path(), "Med_Off_DBS_On_Pr1_right.csv", "Attribute,Value\nMeanSpeed,2.0\nFrequency,4\n");
        write(dir.path(), "Med_Off_DBS_Off.csv", "Attribute,Value\nMeanSpeed,1.0\n");
        write(dir.path(), "Med_Off_DBS_On_Pr3_left.csv", "Name,Score\nMeanSpeed,1.0\n");

        let parser = FilenameParser::new().unwrap();
        let data = load_patient("P1", dir.path(), &parser).unwrap();

        assert_eq!(data.rows.len(), 4);
        assert_eq!(data.skipped_files.len(), 2);
        let programs: Vec<Option<u8>> = data.available_conditions.iter().map(|k| k.program).collect();
        assert_eq!(programs, vec![None, Some(1), Some(2)]);

        let pr1 = data
            .rows
            .iter()
            .find(|r| r.program_id.as_deref() == Some("1"))
            .unwrap();
        assert_eq!(pr1.chronological_index.as_deref(), Some("1"));
        assert_eq!(pr1.hand.as_deref(), Some("Right"));
        assert_eq!(pr1.origin, "Med_Off_DBS_On_Pr1_right.csv:2");
    }

    #[test]
    fn file_with_oversized_program_number_is_skipped() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Med_Off_DBS_Off_left.csv", "Attribute,Value\nMeanSpeed,1.0\n");
        write(dir.path(), "Med_Off_DBS_On_Pr300_left.csv", "Attribute,Value\nMeanSpeed,2.0\n");

        let parser = FilenameParser::new().unwrap();
        let data = load_patient("P1", dir.path(), &parser).unwrap();

        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.available_conditions, vec![BaselineKey::MED_OFF_DBS_OFF]);
        assert_eq!(data.skipped_files.len(), 1);
        assert_eq!(data.skipped_files[0].file, "Med_Off_DBS_On_Pr300_left.csv");
        assert!(data.skipped_files[0].reason.contains("'300'"));
    }
}
