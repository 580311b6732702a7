//! CLI entry point for the LR vs NN housing experiment.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use exper_learning::{
    ArtifactStore, Experiment, ExperimentConfig, ExperimentConfigBuilder, ExperimentError,
    ExperimentMetrics, HoldoutScores, HypothesisReport, LinearModel, MlpParams, NeuralNetwork,
};
use exper_processing::{
    ApiHandler, ColumnTransformer, DataHandler, HttpFetcher, SplitSummary, StratificationConfig,
    StratificationKey,
};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Linear vs neural regression experiment on California housing",
    long_about = "Sweeps a hyperparameter for a linear and a neural regressor, records \
                  train/validation error curves and tests whether the favoured model \
                  has a lower error.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  EXPER_DATA_URL    Dataset URL used when --url is not given\n  \
                  RUST_LOG          Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Full experiment with defaults\n  \
                  exper run\n\n  \
                  # Small networks and a short sweep\n  \
                  exper run --quick --output results/\n\n  \
                  # Machine-readable output\n  \
                  exper run --config experiment.json --json | jq .hypothesis\n\n  \
                  # Look at the dataset\n  \
                  exper inspect --data-path data/housing.csv"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the result)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the experiment and save its artifacts
    Run(RunArgs),
    /// Load the dataset and print its shape, columns and income strata
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON experiment configuration; unset fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local dataset path (downloaded here when missing)
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Dataset URL
    #[arg(long)]
    url: Option<String>,

    /// Download the dataset even if the local copy exists
    #[arg(long)]
    force_retrieve: bool,

    /// Directory under which a timestamped artifact directory is created
    #[arg(short, long, default_value = "./artifacts")]
    output: PathBuf,

    /// Small networks and a 1..=5 sweep, for smoke runs
    #[arg(long)]
    quick: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logging; only the final JSON document is written.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local dataset path (downloaded here when missing)
    #[arg(long)]
    data_path: PathBuf,

    /// Dataset URL
    #[arg(long)]
    url: Option<String>,
}

/// Everything `exper run --json` prints.
#[derive(Serialize)]
struct RunOutput<'a> {
    experiment: &'a str,
    models: Vec<String>,
    split: Option<&'a SplitSummary>,
    metrics: ExperimentMetrics,
    holdout: HoldoutScores,
    hypothesis: Option<HypothesisReport>,
    artifacts: PathBuf,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let json = matches!(&cli.command, Command::Run(args) if args.json);
    init_logging(&cli.log_level, cli.quiet, json);

    // Load environment variables from .env file
    dotenv().ok();

    match cli.command {
        Command::Run(args) => run(&args, cli.quiet),
        Command::Inspect(args) => inspect(&args),
    }
}

fn default_url(explicit: Option<&str>, configured: &str) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| env::var("EXPER_DATA_URL").ok())
        .unwrap_or_else(|| configured.to_string())
}

/// Defaults, then the config file, then command-line overrides.
fn load_config(args: &RunArgs) -> Result<ExperimentConfig> {
    let base = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Parsing config file {}", path.display()))?
        }
        None => ExperimentConfig::default(),
    };

    let url = default_url(args.url.as_deref(), &base.data.url);
    let mut builder = ExperimentConfigBuilder::from_config(base).data_url(url);
    if let Some(path) = &args.data_path {
        builder = builder.data_path(path.clone());
    }
    if args.force_retrieve {
        builder = builder.force_retrieve(true);
    }
    if args.quick {
        builder = builder.param_range((1..=5).map(f64::from).collect());
    }
    Ok(builder.build()?)
}

fn neural_params(quick: bool) -> MlpParams {
    if quick {
        MlpParams {
            hidden_layers: vec![32, 32],
            hidden_l2: vec![0.001, 0.001],
            dropout: 0.1,
            ..MlpParams::default()
        }
    } else {
        MlpParams::default()
    }
}

fn build_experiment(config: ExperimentConfig, quick: bool, quiet: bool) -> Result<Experiment> {
    let handler = ApiHandler::new(HttpFetcher::new()?, config.target_column.as_str())
        .force_retrieve(config.data.force_retrieve);
    let neural = NeuralNetwork::with_params(neural_params(quick));

    let mut builder = Experiment::builder()
        .config(config)
        .data_handler(handler)
        .preprocessor(ColumnTransformer::california())
        .model(LinearModel::new())
        .model(neural);

    if !quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

fn run(args: &RunArgs, quiet: bool) -> Result<()> {
    let config = load_config(args)?;
    let mut experiment = build_experiment(config, args.quick, quiet)?;

    info!("{}", "=".repeat(80));
    info!("Running {}", experiment.config().name);
    info!("{}", "=".repeat(80));

    if let Err(e) = experiment.run() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&e)?);
        }
        return Err(e.into());
    }

    let hypothesis = match experiment.hypothesis_testing() {
        Ok(report) => Some(report),
        Err(e @ ExperimentError::Configuration(_)) => {
            warn!("Skipping hypothesis test: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };
    let holdout = experiment.holdout_scores()?;

    let store = ArtifactStore::timestamped(&args.output, &experiment.config().name);
    let manifest = store.save_experiment(&experiment, hypothesis.as_ref())?;
    info!(
        "Saved {} artifacts to {}",
        manifest.artifacts.len(),
        store.root().display()
    );

    if args.json {
        let output = RunOutput {
            experiment: &experiment.config().name,
            models: experiment.model_names(),
            split: experiment.split_summary(),
            metrics: experiment.metrics(),
            holdout,
            hypothesis,
            artifacts: store.root().to_path_buf(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&experiment, &holdout, hypothesis.as_ref(), store.root());
    }
    Ok(())
}

/// Print the run summary.
///
/// Uses `println!` intentionally: this is the command's output, not logging.
fn print_summary(
    experiment: &Experiment,
    holdout: &HoldoutScores,
    hypothesis: Option<&HypothesisReport>,
    artifacts: &Path,
) {
    let config = experiment.config();
    println!("\n{}", "=".repeat(80));
    println!("{}", config.name.to_uppercase());
    println!("{}\n", "=".repeat(80));

    if let Some(split) = experiment.split_summary() {
        println!("DATA");
        println!("{}", "-".repeat(40));
        println!("  Train rows: {}", split.train_rows);
        println!("  Test rows: {}", split.test_rows);
        println!(
            "  Max stratum share deviation: {:.4}",
            split.max_share_deviation()
        );
        println!("  Features: {}", experiment.feature_names().len());
        println!();
    }

    println!("VALIDATION CURVES ({} = {} values)", config.param_name, config.param_range.len());
    println!("{}", "-".repeat(40));
    println!(
        "{:<20} {:<8} {:>14} {:>14} {:>14}",
        "Model", "Metric", "Final train", "Final test", "Best test"
    );
    println!("{}", "-".repeat(74));
    for (metric, per_model) in experiment.metrics() {
        for (model, curve) in per_model {
            let last_train = curve.train.last().copied().unwrap_or(f64::NAN);
            let last_test = curve.test.last().copied().unwrap_or(f64::NAN);
            let best_test = curve.test.iter().copied().fold(f64::INFINITY, f64::min);
            println!(
                "{:<20} {:<8} {:>14.4} {:>14.4} {:>14.4}",
                model, metric, last_train, last_test, best_test
            );
        }
    }
    println!();

    println!("HOLDOUT ERROR");
    println!("{}", "-".repeat(40));
    for (model, scores) in holdout {
        let line: Vec<String> = scores
            .iter()
            .map(|(metric, value)| format!("{} {:.4}", metric, value))
            .collect();
        println!("  {:<20} {}", model, line.join("  "));
    }
    println!();

    if let Some(report) = hypothesis {
        let welch = if report.equal_var { "Student" } else { "Welch" };
        println!("HYPOTHESIS TEST ({} t-test, alpha = {})", welch, report.alpha);
        println!("{}", "-".repeat(40));
        for test in &report.tests {
            println!(
                "  {:<6} {} {:.4} vs {} {:.4}: t = {:.3}, df = {:.1}, p = {:.4}, p(one-sided) = {:.4}",
                test.metric,
                test.model_a,
                test.mean_a,
                test.model_b,
                test.mean_b,
                test.statistic,
                test.df,
                test.p_value,
                test.p_value_greater
            );
            let verdict = match (test.rejects_null, test.favours_alternative) {
                (_, true) => format!("{} has the lower error", test.model_a),
                (true, false) => "errors differ, not in favour of the first model".to_string(),
                (false, false) => "no significant difference".to_string(),
            };
            println!("         {}", verdict);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    println!("Artifacts: {}", artifacts.display());
    println!("{}", "=".repeat(80));
}

/// Load the dataset and describe it.
fn inspect(args: &InspectArgs) -> Result<()> {
    let defaults = ExperimentConfig::default();
    let url = default_url(args.url.as_deref(), &defaults.data.url);
    let handler = ApiHandler::new(HttpFetcher::new()?, defaults.target_column.as_str());

    let data = handler.load_data(&args.data_path, &url)?;

    println!("\n{}", "=".repeat(80));
    println!("DATASET OVERVIEW");
    println!("{}\n", "=".repeat(80));
    println!("  File: {}", args.data_path.display());
    println!("  Rows: {}", data.height());
    println!("  Columns: {}", data.width());
    println!("  Target: {}", data.target().unwrap_or("-"));
    println!();

    println!("COLUMNS");
    println!("{}", "-".repeat(40));
    for name in data.column_names() {
        let category = data.column_category(&name)?;
        println!("  {:<24} {:?}", name, category);
    }
    println!();

    let stratification = StratificationConfig::california_income();
    if data.has_column(&stratification.column) {
        let key = StratificationKey::from_dataset(&data, &stratification)?;
        println!("STRATA ({})", stratification.column);
        println!("{}", "-".repeat(40));
        for (label, share) in key.proportions() {
            println!("  {:<4} {:>6.2}%", label, share * 100.0);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    Ok(())
}
