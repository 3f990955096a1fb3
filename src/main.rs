use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use canopy_io::{DatasetReader, ExperimentName, LabeledMatrix, ResultWriter, Schema};
use canopy_rf::Criterion;
use canopy_tune::backends::{LinfaBackend, NativeBackend};
use canopy_tune::{
    BackendKind, ClassifierBackend, CurvePoint, EnsembleSweep, GridSearch, HyperParams, ParamGrid,
    Partition, SplitDataset, SplitScheme, StratifiedSplitter, SweepStrategy,
};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Stratified split, grid search and ensemble-size sweeps for Random Forests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for splitting, folds and model training
    #[arg(long, default_value_t = 1, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Threads in the global pool used for forest training (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Where the table comes from and how it is laid out.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Delimited table, optionally gzip-compressed
    #[arg(long, default_value = "data/dataset.csv.gz")]
    data: PathBuf,

    /// Name of the label column
    #[arg(long, default_value = "label")]
    label_column: String,

    /// Feature columns to keep, comma separated (default: every other column)
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<String>>,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long, default_value = "canopy")]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct SplitArgs {
    /// Per-class share of rows assigned to the learn partition
    #[arg(long, default_value_t = 0.8)]
    learn_fraction: f64,

    /// Use the 0.70/0.85 learn/valid/test scheme instead of a holdout split
    #[arg(long, default_value_t = false)]
    three_way: bool,
}

#[derive(Args, Debug, Clone)]
struct GridArgs {
    /// Candidate features per split, comma separated
    #[arg(long, value_delimiter = ',', default_value = "5,7")]
    max_features: Vec<usize>,

    /// Candidate minimum leaf sizes, comma separated
    #[arg(long, value_delimiter = ',', default_value = "2,5")]
    min_leaf: Vec<usize>,

    /// Candidate split criteria (gini, entropy), comma separated
    #[arg(long, value_delimiter = ',', default_value = "gini")]
    criterion: Vec<Criterion>,

    /// Cross-validation folds
    #[arg(long, default_value_t = 4)]
    folds: usize,

    /// Trees per cross-validated model
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Worker threads for the search (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct RefitArgs {
    /// Features per split for the refit model
    #[arg(long, default_value_t = 5)]
    refit_max_features: usize,

    /// Minimum leaf size for the refit model
    #[arg(long, default_value_t = 2)]
    refit_min_leaf: usize,

    /// Split criterion for the refit model
    #[arg(long, default_value = "gini")]
    refit_criterion: Criterion,

    /// Largest ensemble in the sweep
    #[arg(long, default_value_t = 50)]
    max_trees: usize,

    /// How the curve is produced
    #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
    strategy: StrategyArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Native,
    Linfa,
    Both,
}

impl BackendArg {
    fn kinds(self) -> Vec<BackendKind> {
        match self {
            BackendArg::Native => vec![BackendKind::Native],
            BackendArg::Linfa => vec![BackendKind::Linfa],
            BackendArg::Both => vec![BackendKind::Native, BackendKind::Linfa],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Auto,
    Batch,
    Incremental,
}

impl StrategyArg {
    fn resolve(self) -> Option<SweepStrategy> {
        match self {
            StrategyArg::Auto => None,
            StrategyArg::Batch => Some(SweepStrategy::Batch),
            StrategyArg::Incremental => Some(SweepStrategy::Incremental),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Split the dataset and write per-class partition counts
    Split {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        split: SplitArgs,
    },

    /// Cross-validated grid search on the learn partition
    Search {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        split: SplitArgs,

        #[command(flatten)]
        grid: GridArgs,

        /// Backend(s) to search
        #[arg(long, value_enum, default_value_t = BackendArg::Both)]
        backend: BackendArg,
    },

    /// Refit one setting and trace test accuracy against ensemble size
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        split: SplitArgs,

        #[command(flatten)]
        refit: RefitArgs,

        /// Backend(s) to sweep
        #[arg(long, value_enum, default_value_t = BackendArg::Both)]
        backend: BackendArg,
    },

    /// Split, search both backends, then sweep both with the refit setting
    Run {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        split: SplitArgs,

        #[command(flatten)]
        grid: GridArgs,

        #[command(flatten)]
        refit: RefitArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct SplitOutput {
    experiment: String,
    scheme: String,
    n_samples: usize,
    n_features: usize,
    classes: Vec<String>,
    learn: usize,
    valid: usize,
    test: usize,
}

#[derive(Serialize)]
struct BestOutput {
    params: String,
    mean_accuracy: f64,
    std_accuracy: f64,
}

#[derive(Serialize)]
struct SearchOutput {
    backend: BackendKind,
    n_points: usize,
    n_folds: usize,
    elapsed_secs: f64,
    best: Option<BestOutput>,
}

#[derive(Serialize)]
struct SweepOutput {
    backend: BackendKind,
    strategy: SweepStrategy,
    params: String,
    max_trees: usize,
    final_accuracy: f64,
    peak_accuracy: f64,
    peak_tree_count: usize,
}

#[derive(Serialize)]
struct RunOutput {
    split: SplitOutput,
    searches: Vec<SearchOutput>,
    sweeps: Vec<SweepOutput>,
}

fn load_and_split(
    data: &DataArgs,
    split: &SplitArgs,
    seed: u64,
) -> Result<(SplitDataset, ResultWriter)> {
    let experiment = ExperimentName::new(data.experiment.clone())?;
    let delimiter = u8::try_from(data.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| format!("delimiter {:?} is not a single ASCII byte", data.delimiter))?;

    let mut schema = Schema::new(data.label_column.as_str()).with_delimiter(delimiter);
    if let Some(features) = &data.features {
        schema = schema.with_features(features.clone());
    }
    let dataset = DatasetReader::new(&data.data, schema)
        .read()
        .with_context(|| format!("failed to read dataset {}", data.data.display()))?;

    let scheme = if split.three_way {
        SplitScheme::three_way(0.70, 0.85)?
    } else {
        SplitScheme::holdout(split.learn_fraction)?
    };
    let split = StratifiedSplitter::new(seed)
        .with_scheme(scheme)
        .split(dataset)
        .context("stratified split failed")?;

    let writer = ResultWriter::new(&data.output_dir, experiment)?;
    writer.write_split(&split.report())?;
    Ok((split, writer))
}

fn split_output(experiment: &str, split: &SplitDataset) -> SplitOutput {
    let dataset = split.dataset();
    SplitOutput {
        experiment: experiment.to_string(),
        scheme: split.report().scheme,
        n_samples: dataset.n_samples(),
        n_features: dataset.n_features(),
        classes: dataset.classes().to_vec(),
        learn: split.rows(Partition::Learn).len(),
        valid: split.rows(Partition::Valid).len(),
        test: split.rows(Partition::Test).len(),
    }
}

fn grid_search(args: &GridArgs, seed: u64) -> GridSearch {
    let grid = ParamGrid::new(args.max_features.clone(), args.min_leaf.clone())
        .with_criteria(args.criterion.clone());
    GridSearch::new(grid)
        .with_n_trees(args.n_trees)
        .with_folds(args.folds)
        .with_seed(seed)
        .with_workers(args.workers)
}

fn ensemble_sweep(args: &RefitArgs, seed: u64) -> EnsembleSweep {
    let params = HyperParams::new(
        args.refit_max_features,
        args.refit_min_leaf,
        args.refit_criterion,
    );
    EnsembleSweep::new(params)
        .with_max_trees(args.max_trees)
        .with_seed(seed)
        .with_strategy(args.strategy.resolve())
}

fn search_with<B: ClassifierBackend>(
    backend: &B,
    search: &GridSearch,
    learn: &LabeledMatrix,
    writer: &ResultWriter,
) -> Result<SearchOutput> {
    let result = search
        .run(backend, learn)
        .with_context(|| format!("{} grid search failed", backend.kind()))?;
    writer.write_search(&result.report())?;
    Ok(SearchOutput {
        backend: result.backend(),
        n_points: result.records().len(),
        n_folds: result.n_folds(),
        elapsed_secs: result.elapsed().as_secs_f64(),
        best: result.best().map(|r| BestOutput {
            params: r.params.to_string(),
            mean_accuracy: r.mean_accuracy,
            std_accuracy: r.std_accuracy,
        }),
    })
}

fn sweep_with<B: ClassifierBackend>(
    backend: &B,
    sweep: &EnsembleSweep,
    split: &SplitDataset,
    writer: &ResultWriter,
) -> Result<SweepOutput> {
    let learn = split.matrix(Partition::Learn);
    let test = split.matrix(Partition::Test);
    let curve = sweep
        .run(backend, &learn, &test)
        .with_context(|| format!("{} ensemble-size sweep failed", backend.kind()))?;
    writer.write_curve(&curve.report(split.dataset().classes()))?;

    // First maximum wins, so the smallest ensemble reaching the peak is reported.
    let peak = curve
        .points()
        .iter()
        .fold(None, |best: Option<&CurvePoint>, p| match best {
            Some(b) if b.accuracy >= p.accuracy => Some(b),
            _ => Some(p),
        });
    Ok(SweepOutput {
        backend: curve.backend(),
        strategy: curve.strategy(),
        params: curve.params().to_string(),
        max_trees: curve.points().len(),
        final_accuracy: curve.final_accuracy(),
        peak_accuracy: peak.map_or(0.0, |p| p.accuracy),
        peak_tree_count: peak.map_or(0, |p| p.tree_count),
    })
}

fn search_all(
    kinds: &[BackendKind],
    search: &GridSearch,
    learn: &LabeledMatrix,
    writer: &ResultWriter,
) -> Result<Vec<SearchOutput>> {
    kinds
        .iter()
        .map(|kind| match kind {
            BackendKind::Native => search_with(&NativeBackend, search, learn, writer),
            BackendKind::Linfa => search_with(&LinfaBackend, search, learn, writer),
        })
        .collect()
}

fn sweep_all(
    kinds: &[BackendKind],
    sweep: &EnsembleSweep,
    split: &SplitDataset,
    writer: &ResultWriter,
) -> Result<Vec<SweepOutput>> {
    kinds
        .iter()
        .map(|kind| match kind {
            BackendKind::Native => sweep_with(&NativeBackend, sweep, split, writer),
            BackendKind::Linfa => sweep_with(&LinfaBackend, sweep, split, writer),
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Split { data, split } => {
            let (split_ds, _) = load_and_split(&data, &split, cli.seed)?;
            let output = split_output(&data.experiment, &split_ds);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Search {
            data,
            split,
            grid,
            backend,
        } => {
            let (split_ds, writer) = load_and_split(&data, &split, cli.seed)?;
            let learn = split_ds.matrix(Partition::Learn);
            let search = grid_search(&grid, cli.seed);
            let output = search_all(&backend.kinds(), &search, &learn, &writer)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Sweep {
            data,
            split,
            refit,
            backend,
        } => {
            let (split_ds, writer) = load_and_split(&data, &split, cli.seed)?;
            let sweep = ensemble_sweep(&refit, cli.seed);
            let output = sweep_all(&backend.kinds(), &sweep, &split_ds, &writer)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Run {
            data,
            split,
            grid,
            refit,
        } => {
            let (split_ds, writer) = load_and_split(&data, &split, cli.seed)?;
            let kinds = BackendArg::Both.kinds();
            let learn = split_ds.matrix(Partition::Learn);

            let searches = search_all(&kinds, &grid_search(&grid, cli.seed), &learn, &writer)?;
            for s in &searches {
                if let Some(best) = &s.best {
                    info!(
                        backend = %s.backend,
                        best = %best.params,
                        mean = best.mean_accuracy,
                        "search best; refit uses the explicit flags"
                    );
                }
            }
            let sweeps = sweep_all(&kinds, &ensemble_sweep(&refit, cli.seed), &split_ds, &writer)?;

            let output = RunOutput {
                split: split_output(&data.experiment, &split_ds),
                searches,
                sweeps,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
