use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

const BASELINE: &str = "Attribute,Value\nMeanAmplitude,10\nMeanSpeed,5\nAmplitudeDecay,0.30\n";
const PROGRAM_ONE: &str = "Attribute,Value\nMeanAmplitude,11\nMeanSpeed,8\nAmplitudeDecay,0.25\n";
const PROGRAM_TWO: &str = "Attribute,Value\nMeanAmplitude,15\nMeanSpeed,5\nAmplitudeDecay,0.10\n";

fn write_patient(root: &Path, patient: &str) {
    let dir = root.join(patient);
    fs::create_dir_all(&dir).expect("patient folder");
    for hand in ["right", "left"] {
        fs::write(dir.join(format!("Med_Off_DBS_Off_{hand}.csv")), BASELINE).expect("baseline csv");
        fs::write(dir.join(format!("Med_Off_DBS_On_Pr1_{hand}.csv")), PROGRAM_ONE).expect("pr1 csv");
        fs::write(dir.join(format!("Med_Off_DBS_On_Pr2_{hand}.csv")), PROGRAM_TWO).expect("pr2 csv");
    }
}

fn run(cwd: &Path, args: &[&str]) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_stimscore");
    Command::new(exe)
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("run stimscore cli")
}

#[test]
fn analyze_writes_tables_and_report_per_patient() {
    let tmp = tempdir().expect("temporary directory");
    write_patient(&tmp.path().join("data"), "P01");

    let output = run(
        tmp.path(),
        &["analyze", "data", "out", "--baseline", "Med Off - DBS Off"],
    );
    assert!(output.status.success(), "CLI exited with status {:?}", output.status);

    let patient_dir = tmp.path().join("out").join("P01");
    for name in [
        "responsiveness_scores_right.csv",
        "responsiveness_scores_left.csv",
        "optimal_effect_vs_baseline_right.csv",
        "optimal_effect_vs_baseline_left.csv",
        "report_P01_engineering_vs_clinical.txt",
    ] {
        assert!(patient_dir.join(name).exists(), "{name} missing");
    }

    let weights = fs::read_to_string(patient_dir.join("responsiveness_scores_right.csv")).expect("read weights");
    assert!(weights.starts_with("parameter,variability,weight"));
    assert!(weights.contains("MeanAmplitude"));

    let report = fs::read_to_string(patient_dir.join("report_P01_engineering_vs_clinical.txt")).expect("read report");
    assert!(report.contains("Med Off - DBS On - Pr2"));
    assert!(report.contains("(baseline)"));

    let summary = String::from_utf8_lossy(&output.stdout);
    assert!(summary.contains("2 unit(s) analyzed, 0 failed, 0 skipped"), "summary was: {summary}");
}

#[test]
fn existing_output_is_kept_without_overwrite() {
    let tmp = tempdir().expect("temporary directory");
    write_patient(&tmp.path().join("data"), "P01");
    let args = ["analyze", "data", "out", "--baseline", "Med Off - DBS Off"];

    assert!(run(tmp.path(), &args).status.success());
    let marker = tmp.path().join("out").join("P01").join("keep.txt");
    fs::write(&marker, "operator notes").expect("marker");

    let second = run(tmp.path(), &args);
    assert!(second.status.success());
    assert!(marker.exists(), "existing patient output must not be touched");
    assert!(String::from_utf8_lossy(&second.stdout).contains("1 skipped"));

    let mut overwrite = args.to_vec();
    overwrite.push("--overwrite");
    assert!(run(tmp.path(), &overwrite).status.success());
    assert!(!marker.exists(), "--overwrite must replace the patient folder");
}

#[test]
fn patient_without_requested_baseline_does_not_stop_the_batch() {
    let tmp = tempdir().expect("temporary directory");
    let data = tmp.path().join("data");
    write_patient(&data, "P01");
    let p02 = data.join("P02");
    fs::create_dir_all(&p02).expect("patient folder");
    fs::write(p02.join("Med_Off_DBS_On_Pr1_right.csv"), PROGRAM_ONE).expect("pr1 csv");
    fs::write(p02.join("Med_Off_DBS_On_Pr2_right.csv"), PROGRAM_TWO).expect("pr2 csv");

    let output = run(
        tmp.path(),
        &["analyze", "data", "out", "--baseline", "Med Off - DBS Off"],
    );
    assert!(output.status.success());
    assert!(tmp.path().join("out/P01/responsiveness_scores_right.csv").exists());
    assert!(!tmp.path().join("out/P02/responsiveness_scores_right.csv").exists());

    let report = fs::read_to_string(tmp.path().join("out/P02/report_P02_engineering_vs_clinical.txt"))
        .expect("failure report");
    assert!(report.contains("not analyzed"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 failed"));
}

fn long_table() -> String {
    let mut csv = String::from(
        "patient_id,hand,medication_state,stimulation_state,program_id,chronological_index,raw_parameter_name,value\n",
    );
    for (stim, program, index, amplitude, speed) in [
        ("Off", "", 0, 10.0, 5.0),
        ("On", "1", 1, 11.0, 8.0),
        ("On", "2", 2, 15.0, 5.0),
    ] {
        csv.push_str(&format!("P07,Left,Off,{stim},{program},{index},Mean Amplitude,{amplitude}\n"));
        csv.push_str(&format!("P07,Left,Off,{stim},{program},{index},mean_speed,{speed}\n"));
    }
    csv
}

#[test]
fn table_subcommand_scores_long_format_input() {
    let tmp = tempdir().expect("temporary directory");
    fs::write(tmp.path().join("measurements.csv"), long_table()).expect("write table");

    let output = run(tmp.path(), &["table", "measurements.csv", "out"]);
    assert!(output.status.success(), "CLI exited with status {:?}", output.status);

    let effect = fs::read_to_string(tmp.path().join("out/P07/optimal_effect_vs_baseline_left.csv"))
        .expect("optimal effect table");
    assert!(effect.starts_with("parameter,improvement,raw_change"));
    assert!(effect.contains("MeanAmplitude,5"));
}

#[test]
fn row_without_hand_fails_its_patient_visibly() {
    let tmp = tempdir().expect("temporary directory");
    let mut csv = long_table();
    csv.push_str("P07,,Off,On,1,1,MeanAmplitude,99\n");
    fs::write(tmp.path().join("measurements.csv"), csv).expect("write table");

    let output = run(tmp.path(), &["table", "measurements.csv", "out"]);
    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let summary = String::from_utf8_lossy(&output.stdout);
    assert!(summary.contains("0 unit(s) analyzed, 1 failed"), "summary was: {summary}");
    assert!(summary.contains("'hand' is missing"), "summary was: {summary}");

    assert!(!tmp.path().join("out/P07/optimal_effect_vs_baseline_left.csv").exists());
    let report = fs::read_to_string(tmp.path().join("out/P07/report_P07_engineering_vs_clinical.txt"))
        .expect("failure report");
    assert!(report.contains("not analyzed"));
}

#[test]
fn vocabulary_lists_parameters_with_polarity() {
    let tmp = tempdir().expect("temporary directory");
    let output = run(tmp.path(), &["vocabulary"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("MeanAmplitude"));
    assert!(text.contains("lower is better"));
}

#[test]
fn missing_data_folder_exits_with_error() {
    let tmp = tempdir().expect("temporary directory");
    let output = run(tmp.path(), &["analyze", "nowhere", "out", "--baseline", "Med Off - DBS Off"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}
