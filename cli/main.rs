#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

mod prompt;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Once;
use std::time::Instant;

use stimscore::batch::{BatchReport, UnitPlan, create_progress_bar, plan_units, run_units};
use stimscore::config::{AnalysisConfig, ConfigError, ImprovementScale, ZeroVariabilityPolicy};
use stimscore::ingest::{FilenameParser, discover_patients, load_patient, read_long_table};
use stimscore::output::write_patient_outputs;
use stimscore::types::BaselineKey;
use stimscore::vocabulary::VOCABULARY;

#[derive(Clone, Copy, ValueEnum)]
pub enum ZeroVariabilityCli {
    /// Spread weight evenly over every measured parameter
    Uniform,
    /// Abandon the hand
    Error,
}

impl From<ZeroVariabilityCli> for ZeroVariabilityPolicy {
    fn from(value: ZeroVariabilityCli) -> Self {
        match value {
            ZeroVariabilityCli::Uniform => ZeroVariabilityPolicy::Uniform,
            ZeroVariabilityCli::Error => ZeroVariabilityPolicy::Error,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScaleCli {
    /// Condition minus baseline, in the metric's unit
    Delta,
    /// Change relative to the baseline, in percent
    Percent,
}

impl From<ScaleCli> for ImprovementScale {
    fn from(value: ScaleCli) -> Self {
        match value {
            ScaleCli::Delta => ImprovementScale::Delta,
            ScaleCli::Percent => ImprovementScale::Percent,
        }
    }
}

#[derive(Args)]
pub struct ScoringArgs {
    /// TOML file with analysis settings; flags below override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Shrinkage of responsiveness weights toward uniform, between 0 and 1
    #[arg(long, value_name = "LAMBDA")]
    pub shrinkage: Option<f64>,

    /// What to do when no parameter varies across the tested settings
    #[arg(long, value_enum)]
    pub zero_variability: Option<ZeroVariabilityCli>,

    /// How a setting is compared against the baseline
    #[arg(long, value_enum)]
    pub scale: Option<ScaleCli>,

    /// Worker threads for scoring (defaults to all cores)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

impl ScoringArgs {
    fn resolve(&self) -> Result<AnalysisConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(lambda) = self.shrinkage {
            config.shrinkage_lambda = lambda;
        }
        if let Some(policy) = self.zero_variability {
            config.zero_variability = policy.into();
        }
        if let Some(scale) = self.scale {
            config.improvement_scale = scale.into();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Folder holding one subfolder of acquisition CSVs per patient
    #[arg(value_name = "DATA_FOLDER")]
    pub data_folder: PathBuf,

    /// Folder receiving one results subfolder per patient
    #[arg(value_name = "OUTPUT_FOLDER")]
    pub output_folder: PathBuf,

    /// Baseline setting such as "Med Off - DBS Off", or "interactive" to ask per patient
    #[arg(long, default_value = "interactive")]
    pub baseline: String,

    /// Re-process patients whose output folder already exists
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Args)]
pub struct TableArgs {
    /// Long-format CSV with one measurement per row
    #[arg(value_name = "MEASUREMENTS_CSV")]
    pub input: PathBuf,

    /// Folder receiving one results subfolder per patient
    #[arg(value_name = "OUTPUT_FOLDER")]
    pub output_folder: PathBuf,

    /// Baseline setting applied to every patient
    #[arg(long, default_value = "Med Off - DBS Off")]
    pub baseline: String,

    /// Re-process patients whose output folder already exists
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Parser)]
#[command(
    name = "stimscore",
    about = "Rank deep brain stimulation settings by dynamically weighted kinematic improvement",
    long_about = "Scores every recorded therapy setting of a patient against a baseline, weighting \
                 each kinematic parameter by how strongly it responds to the settings, and renders \
                 engineering and clinical views of the result."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every patient folder of a data folder
    #[command(about = "Score per-patient acquisition folders (outputs: CSVs and a report per patient)")]
    Analyze(AnalyzeArgs),

    /// Score a long-format measurement table
    #[command(about = "Score a long-format measurement table")]
    Table(TableArgs),

    /// List the recognized kinematic parameters
    #[command(about = "List recognized kinematic parameters and their polarity")]
    Vocabulary,

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

static RAYON_INIT: Once = Once::new();

fn init_thread_pool(threads: Option<usize>) {
    RAYON_INIT.call_once(|| {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        if let Err(e) = builder.build_global() {
            log::warn!("could not configure the scoring thread pool: {e}");
        }
    });
}

enum BaselineChoice {
    Interactive,
    Fixed(BaselineKey),
}

fn parse_baseline_choice(text: &str) -> Result<BaselineChoice, Box<dyn Error>> {
    if text.trim().eq_ignore_ascii_case("interactive") {
        return Ok(BaselineChoice::Interactive);
    }
    Ok(BaselineChoice::Fixed(text.parse::<BaselineKey>()?))
}

/// Decides whether a patient's output folder may be written. Returns `None` when the
/// patient must be skipped because the folder exists and overwriting is off.
fn claim_patient_dir(
    output_folder: &Path,
    patient_id: &str,
    overwrite: bool,
) -> io::Result<Option<PathBuf>> {
    let dir = output_folder.join(patient_id);
    if dir.is_dir() {
        if !overwrite {
            return Ok(None);
        }
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(Some(dir))
}

/// Reports rows that name no patient, since they belong to no unit.
fn skip_unattributed(plan: &mut UnitPlan, report: &mut BatchReport) {
    for err in plan.unattributed.drain(..) {
        log::warn!("row not attributable to a patient-hand, ignored: {err}");
        report.skip("unattributed row", err.to_string());
    }
}

/// Scores the planned units and writes each patient's tables and report. A patient
/// whose outputs cannot be written fails on its own.
fn score_and_write(
    plan: UnitPlan,
    patient_dirs: &BTreeMap<String, PathBuf>,
    config: &AnalysisConfig,
    report: &mut BatchReport,
) {
    let started = Instant::now();
    eprintln!("> Scoring {} patient-hand unit(s)...", plan.requests.len());
    let pb = create_progress_bar(plan.requests.len() as u64, "Scoring units");
    let mut outcomes = run_units(plan.requests, config, &pb);
    pb.finish_and_clear();
    eprintln!("> Scoring finished in {:.2?}", started.elapsed());

    outcomes.extend(plan.failed);
    outcomes.sort_by(|a, b| a.unit().cmp(b.unit()));
    for group in outcomes.chunk_by_mut(|a, b| a.unit().patient_id == b.unit().patient_id) {
        let patient_id = group[0].unit().patient_id.clone();
        let Some(dir) = patient_dirs.get(&patient_id) else {
            continue;
        };
        if let Some(path) = write_patient_outputs(dir, &patient_id, group) {
            eprintln!("> Wrote '{}'", path.display());
        }
    }

    report.extend(outcomes);
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), Box<dyn Error>> {
    let config = args.scoring.resolve()?;
    init_thread_pool(args.scoring.threads);
    let choice = parse_baseline_choice(&args.baseline)?;

    let patients = discover_patients(&args.data_folder)?;
    if patients.is_empty() {
        return Err(format!(
            "no patient subfolders found in '{}'",
            args.data_folder.display()
        )
        .into());
    }
    fs::create_dir_all(&args.output_folder)?;
    eprintln!("> Data source: {}", args.data_folder.display());
    eprintln!("> Output destination: {}", args.output_folder.display());

    let parser = FilenameParser::new()?;
    let mut report = BatchReport::default();
    let mut plan = UnitPlan::default();
    let mut patient_dirs = BTreeMap::new();

    for (patient_id, patient_path) in patients {
        let subject = format!("patient {patient_id}");
        let out_dir = args.output_folder.join(&patient_id);
        if out_dir.is_dir() && !args.overwrite {
            eprintln!("> Skipping {subject}: output folder exists. Use --overwrite to re-process.");
            report.skip(subject, "output folder already exists");
            continue;
        }

        eprintln!("> Loading {subject}");
        let data = match load_patient(&patient_id, &patient_path, &parser) {
            Ok(data) => data,
            Err(e) => {
                report.skip(subject, e.to_string());
                continue;
            }
        };
        if data.rows.is_empty() {
            eprintln!("> Skipping {subject}: no usable acquisition CSV.");
            report.skip(subject, "no usable acquisition CSV");
            continue;
        }
        let labels = data.available_conditions.iter().join(", ");
        eprintln!("> Identified conditions: {labels}");

        let baseline = match &choice {
            BaselineChoice::Fixed(key) => *key,
            BaselineChoice::Interactive => {
                let stdin = io::stdin();
                let mut input = stdin.lock();
                let mut output = io::stderr();
                match prompt::select_baseline(&mut input, &mut output, &patient_id, &data.available_conditions)? {
                    Some(key) => key,
                    None => {
                        eprintln!("> Skipping {subject} at operator request.");
                        report.skip(subject, "no baseline selected");
                        continue;
                    }
                }
            }
        };

        let Some(dir) = claim_patient_dir(&args.output_folder, &patient_id, args.overwrite)? else {
            report.skip(subject, "output folder already exists");
            continue;
        };
        patient_dirs.insert(patient_id, dir);
        let patient_plan = plan_units(data.rows, baseline);
        plan.requests.extend(patient_plan.requests);
        plan.failed.extend(patient_plan.failed);
        plan.unattributed.extend(patient_plan.unattributed);
    }

    skip_unattributed(&mut plan, &mut report);
    if !plan.requests.is_empty() || !plan.failed.is_empty() {
        score_and_write(plan, &patient_dirs, &config, &mut report);
    }
    println!("{}", report.summary());
    Ok(())
}

fn run_table(args: TableArgs) -> Result<(), Box<dyn Error>> {
    let config = args.scoring.resolve()?;
    init_thread_pool(args.scoring.threads);
    let baseline: BaselineKey = args.baseline.parse()?;

    eprintln!("> Reading measurements from '{}'", args.input.display());
    let rows = read_long_table(&args.input)?;
    fs::create_dir_all(&args.output_folder)?;

    let mut report = BatchReport::default();
    let mut plan = plan_units(rows, baseline);
    skip_unattributed(&mut plan, &mut report);

    let mut patient_dirs = BTreeMap::new();
    let mut skipped_patients = Vec::new();
    let patients: Vec<String> = plan
        .requests
        .iter()
        .map(|request| request.unit.patient_id.clone())
        .chain(plan.failed.iter().map(|outcome| outcome.unit().patient_id.clone()))
        .unique()
        .collect();
    for patient_id in patients {
        match claim_patient_dir(&args.output_folder, &patient_id, args.overwrite)? {
            Some(dir) => {
                patient_dirs.insert(patient_id, dir);
            }
            None => skipped_patients.push(patient_id),
        }
    }
    for request in plan.requests.iter().filter(|r| skipped_patients.contains(&r.unit.patient_id)) {
        report.skip(request.unit.to_string(), "output folder already exists");
    }
    for outcome in plan.failed.iter().filter(|o| skipped_patients.contains(&o.unit().patient_id)) {
        report.skip(outcome.unit().to_string(), "output folder already exists");
    }
    plan.requests.retain(|r| patient_dirs.contains_key(&r.unit.patient_id));
    plan.failed.retain(|o| patient_dirs.contains_key(&o.unit().patient_id));

    if !plan.requests.is_empty() || !plan.failed.is_empty() {
        score_and_write(plan, &patient_dirs, &config, &mut report);
    }
    println!("{}", report.summary());
    Ok(())
}

fn print_vocabulary() {
    println!("{:<20} {:<26} {:<17} aliases", "parameter", "display name", "polarity");
    for entry in VOCABULARY.iter() {
        println!(
            "{:<20} {:<26} {:<17} {}",
            entry.canonical,
            entry.display,
            entry.polarity.describe(),
            entry.aliases.join(", ")
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Analyze(args)) => run_analyze(args),
        Some(Commands::Table(args)) => run_table(args),
        Some(Commands::Vocabulary) => {
            print_vocabulary();
            Ok(())
        }
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: u64 = option_env!("STIMSCORE_BUILD_TIMESTAMP")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    println!("stimscore {version}");
    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        println!("Built: {}", format_duration_ago(now.saturating_sub(build_timestamp)));
    }
}

fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    if seconds < MINUTE {
        "just now".to_string()
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    }
}
