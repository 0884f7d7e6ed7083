use approx::assert_abs_diff_eq;
use indicatif::ProgressBar;
use stimscore::baseline::BaselineError;
use stimscore::batch::{UnitOutcome, UnitRequest, run_units};
use stimscore::config::{AnalysisConfig, ZeroVariabilityPolicy};
use stimscore::pipeline::{HandAnalysis, UnitError, analyze_unit};
use stimscore::types::{BaselineKey, Hand, RawMeasurementRow, UnitId};
use stimscore::vocabulary::ParameterId;
use stimscore::weighting::{WeightBasis, WeightingError};

/// `(program, parameter, value)`; program 0 is the stimulation-off baseline.
type Cell<'a> = (u8, &'a str, f64);

fn rows(patient: &str, hand: Hand, cells: &[Cell]) -> Vec<RawMeasurementRow> {
    cells
        .iter()
        .map(|&(program, name, value)| RawMeasurementRow {
            patient_id: Some(patient.to_string()),
            hand: Some(hand.as_str().to_string()),
            medication_state: Some("Off".to_string()),
            stimulation_state: Some(if program == 0 { "Off" } else { "On" }.to_string()),
            program_id: (program != 0).then(|| program.to_string()),
            chronological_index: Some(program.to_string()),
            raw_parameter_name: Some(name.to_string()),
            value: Some(value.to_string()),
            origin: format!("{patient}:{name}"),
        })
        .collect()
}

fn analyze(cells: &[Cell], config: &AnalysisConfig) -> Result<HandAnalysis, UnitError> {
    analyze_unit(
        &UnitId::new("P01", Hand::Right),
        &rows("P01", Hand::Right, cells),
        &BaselineKey::MED_OFF_DBS_OFF,
        config,
    )
}

fn score(analysis: &HandAnalysis, program: u8) -> f64 {
    analysis
        .scores
        .entries()
        .iter()
        .find(|e| e.condition.key.program == Some(program))
        .map(|e| e.score)
        .unwrap()
}

const TWO_CANDIDATES: [Cell; 6] = [
    (0, "MeanAmplitude", 10.0),
    (0, "MeanSpeed", 5.0),
    (1, "MeanAmplitude", 11.0),
    (1, "MeanSpeed", 8.0),
    (2, "MeanAmplitude", 15.0),
    (2, "MeanSpeed", 5.0),
];

#[test]
fn scenario_a_exact_weighted_scores_for_two_candidates() {
    let analysis = analyze(&TWO_CANDIDATES, &AnalysisConfig::default()).unwrap();

    // Improvements: Pr1 = (1, 3), Pr2 = (5, 0). Spreads 4/sqrt2 and 3/sqrt2. With two
    // candidates the weighted order always agrees with the plain average.
    assert_abs_diff_eq!(analysis.weights.weight(ParameterId::MeanAmplitude), 4.0 / 7.0, epsilon = 1e-12);
    assert_abs_diff_eq!(analysis.weights.weight(ParameterId::MeanSpeed), 3.0 / 7.0, epsilon = 1e-12);

    assert_abs_diff_eq!(score(&analysis, 1), 13.0 / 7.0, epsilon = 1e-12);
    assert_abs_diff_eq!(score(&analysis, 2), 20.0 / 7.0, epsilon = 1e-12);
    assert_eq!(analysis.best.condition.key.program, Some(2));
    assert_eq!(analysis.ranking.entries()[1].condition.key.program, Some(1));
}

#[test]
fn scenario_a_weighting_can_overturn_the_unweighted_average() {
    let cells = [
        (0, "MeanAmplitude", 10.0),
        (0, "MeanSpeed", 5.0),
        (1, "MeanAmplitude", 10.0),
        (1, "MeanSpeed", 9.0),
        (2, "MeanAmplitude", 13.0),
        (2, "MeanSpeed", 5.5),
        (3, "MeanAmplitude", 7.0),
        (3, "MeanSpeed", 8.5),
    ];
    let analysis = analyze(&cells, &AnalysisConfig::default()).unwrap();

    // Pr1 improves (0, 4), mean 2.0; Pr2 improves (3, 0.5), mean 1.75.
    let amplitude_sd = 3.0;
    let speed_mean = (4.0 + 0.5 + 3.5) / 3.0;
    let speed_sd: f64 = ([4.0, 0.5, 3.5].iter().map(|x: &f64| (x - speed_mean).powi(2)).sum::<f64>() / 2.0).sqrt();
    let w_amplitude = amplitude_sd / (amplitude_sd + speed_sd);
    let w_speed = speed_sd / (amplitude_sd + speed_sd);

    assert_abs_diff_eq!(score(&analysis, 1), w_speed * 4.0, epsilon = 1e-12);
    assert_abs_diff_eq!(score(&analysis, 2), w_amplitude * 3.0 + w_speed * 0.5, epsilon = 1e-12);
    assert!(score(&analysis, 2) > score(&analysis, 1));
    assert_eq!(analysis.best.condition.key.program, Some(2));
}

#[test]
fn scenario_b_missing_parameter_renormalizes_weight() {
    let mut cells = TWO_CANDIDATES.to_vec();
    cells.push((3, "MeanAmplitude", 12.0));
    let analysis = analyze(&cells, &AnalysisConfig::default()).unwrap();

    let partial = analysis
        .scores
        .entries()
        .iter()
        .find(|e| e.condition.key.program == Some(3))
        .unwrap();
    assert_eq!(partial.defined_parameters, 1);
    assert_abs_diff_eq!(partial.score, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
        partial.coverage,
        analysis.weights.weight(ParameterId::MeanAmplitude),
        epsilon = 1e-12
    );
}

#[test]
fn setting_without_weighted_evidence_is_never_best() {
    let cells = [
        (0, "MeanSpeed", 5.0),
        (0, "Frequency", 2.0),
        (1, "MeanSpeed", 4.0),
        (2, "MeanSpeed", 2.0),
        (3, "Frequency", 1.0),
    ];
    let analysis = analyze(&cells, &AnalysisConfig::default()).unwrap();

    // Frequency is measured by one candidate only, so it carries no weight.
    assert_eq!(analysis.weights.weight(ParameterId::Frequency), 0.0);
    let programs: Vec<Option<u8>> = analysis
        .ranking
        .entries()
        .iter()
        .map(|r| r.condition.key.program)
        .collect();
    assert_eq!(programs, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(analysis.best.condition.key.program, Some(1));
    assert_abs_diff_eq!(analysis.best.score, -1.0, epsilon = 1e-12);
}

#[test]
fn scenario_c_missing_baseline_is_isolated_to_its_unit() {
    let healthy = UnitRequest {
        unit: UnitId::new("P01", Hand::Right),
        rows: rows("P01", Hand::Right, &TWO_CANDIDATES),
        baseline: BaselineKey::MED_OFF_DBS_OFF,
    };
    let without_baseline: Vec<Cell> = TWO_CANDIDATES.iter().copied().filter(|c| c.0 != 0).collect();
    let broken = UnitRequest {
        unit: UnitId::new("P02", Hand::Left),
        rows: rows("P02", Hand::Left, &without_baseline),
        baseline: BaselineKey::MED_OFF_DBS_OFF,
    };
    let other_hand = UnitRequest {
        unit: UnitId::new("P02", Hand::Right),
        rows: rows("P02", Hand::Right, &TWO_CANDIDATES),
        baseline: BaselineKey::MED_OFF_DBS_OFF,
    };

    let outcomes = run_units(
        vec![broken, healthy, other_hand],
        &AnalysisConfig::default(),
        &ProgressBar::hidden(),
    );
    assert_eq!(outcomes.len(), 3);

    match &outcomes[1] {
        UnitOutcome::Failed(failure) => {
            assert_eq!(failure.unit, UnitId::new("P02", Hand::Left));
            assert!(matches!(
                failure.error,
                UnitError::Baseline(BaselineError::MissingBaseline { .. })
            ));
        }
        UnitOutcome::Analyzed(_) => panic!("unit without baseline must fail"),
    }

    let alone = analyze(&TWO_CANDIDATES, &AnalysisConfig::default()).unwrap();
    for idx in [0, 2] {
        match &outcomes[idx] {
            UnitOutcome::Analyzed(analysis) => {
                assert_eq!(analysis.weights, alone.weights);
                assert_eq!(analysis.best.score, alone.best.score);
            }
            UnitOutcome::Failed(failure) => panic!("unexpected failure: {failure}"),
        }
    }
}

#[test]
fn scenario_d_zero_variability_falls_back_to_uniform() {
    let cells = [
        (0, "MeanAmplitude", 10.0),
        (0, "MeanSpeed", 5.0),
        (0, "Frequency", 2.0),
        (1, "MeanAmplitude", 11.0),
        (1, "MeanSpeed", 6.0),
        (1, "Frequency", 3.0),
        (2, "MeanAmplitude", 11.0),
        (2, "MeanSpeed", 6.0),
        (2, "Frequency", 3.0),
    ];
    let analysis = analyze(&cells, &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.weights.basis(), WeightBasis::UniformFallback);
    for entry in analysis.weights.entries() {
        assert_abs_diff_eq!(entry.weight, 1.0 / 3.0, epsilon = 1e-15);
        assert_eq!(entry.variability, Some(0.0));
    }
    assert!(analysis.scores.entries().iter().all(|e| e.score.is_finite()));
    assert_abs_diff_eq!(score(&analysis, 1), 1.0, epsilon = 1e-12);

    let strict = AnalysisConfig {
        zero_variability: ZeroVariabilityPolicy::Error,
        ..AnalysisConfig::default()
    };
    assert!(matches!(
        analyze(&cells, &strict),
        Err(UnitError::Weighting(WeightingError::InsufficientVariability { .. }))
    ));
}

#[test]
fn baseline_row_is_exactly_zero_and_weights_sum_to_one() {
    let mut cells = TWO_CANDIDATES.to_vec();
    cells.extend([(0, "AmplitudeDecay", 0.3), (1, "AmplitudeDecay", 0.1), (2, "AmplitudeDecay", 0.4)]);
    let analysis = analyze(&cells, &AnalysisConfig::default()).unwrap();

    let matrix = &analysis.improvement;
    for col in 0..matrix.columns().len() {
        assert_eq!(matrix.value(matrix.baseline_row(), col), Some(0.0));
    }
    assert_abs_diff_eq!(analysis.weights.sum(), 1.0, epsilon = 1e-12);
    assert!(analysis.weights.entries().iter().all(|e| e.weight >= 0.0));
}

#[test]
fn repeated_runs_are_identical() {
    let config = AnalysisConfig {
        shrinkage_lambda: 0.1,
        ..AnalysisConfig::default()
    };
    let first = analyze(&TWO_CANDIDATES, &config).unwrap();
    let second = analyze(&TWO_CANDIDATES, &config).unwrap();

    assert_eq!(
        serde_json::to_string(&first.scores).unwrap(),
        serde_json::to_string(&second.scores).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.weights).unwrap(),
        serde_json::to_string(&second.weights).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.ranking).unwrap(),
        serde_json::to_string(&second.ranking).unwrap()
    );
    assert_eq!(first.views, second.views);
}

#[test]
fn hands_are_scored_independently() {
    let mut mixed = rows("P01", Hand::Right, &TWO_CANDIDATES);
    mixed.extend(rows("P01", Hand::Left, &[(0, "MeanSpeed", 1.0), (1, "MeanSpeed", 100.0)]));
    let partitioned = stimscore::table::partition_by_unit(mixed);
    assert_eq!(partitioned.units.len(), 2);

    let right = &partitioned.units[&UnitId::new("P01", Hand::Right)];
    let analysis = analyze_unit(
        &UnitId::new("P01", Hand::Right),
        right,
        &BaselineKey::MED_OFF_DBS_OFF,
        &AnalysisConfig::default(),
    )
    .unwrap();
    let alone = analyze(&TWO_CANDIDATES, &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.weights, alone.weights);
}
