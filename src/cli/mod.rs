use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rnaprobe: multi-modal RNA chemical probing prediction
#[derive(Parser, Debug)]
#[command(name = "rnaprobe")]
#[command(about = "Predict DMS/SHAPE reactivity and pairing structure for RNA sequences")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a new model
    Train(TrainArgs),

    /// Make predictions using a trained model
    Predict(PredictArgs),

    /// Evaluate a trained model against labeled data
    Evaluate(EvaluateArgs),
}

/// Training arguments
#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Input data file (JSON-lines, optionally gzipped)
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Declared data kind of the input (dms, shape, structure, multimodal)
    #[arg(short = 'k', long, default_value = "multimodal")]
    pub data_kind: String,

    /// Output directory for checkpoints
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Number of training epochs
    #[arg(short, long, default_value = "100")]
    pub epochs: usize,

    /// Batch size
    #[arg(short, long, default_value = "32")]
    pub batch_size: usize,

    /// Learning rate
    #[arg(long, default_value = "0.001")]
    pub learning_rate: f64,

    /// Learning rate scheduler (constant, exponential, cosine)
    #[arg(long, default_value = "exponential")]
    pub lr_scheduler: String,

    /// Random seed
    #[arg(long, default_value = "2026")]
    pub seed: u64,

    /// Validation ratio
    #[arg(long, default_value = "0.1")]
    pub val_ratio: f32,

    /// Test ratio
    #[arg(long, default_value = "0.1")]
    pub test_ratio: f32,

    /// Early stopping patience (0 = disabled)
    #[arg(long, default_value = "15")]
    pub patience: usize,

    /// Fixed padding length for every batch
    #[arg(long)]
    pub pad_to: Option<usize>,

    /// Disable quality-weighted training
    #[arg(long)]
    pub no_quality: bool,

    /// Quick test mode (few epochs, small model)
    #[arg(long)]
    pub quick: bool,
}

/// Prediction arguments
#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// Input data file (JSON-lines, optionally gzipped)
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Model checkpoint file (.mpk with its .json side-file)
    #[arg(short, long, required = true)]
    pub model: PathBuf,

    /// Output file for predictions
    #[arg(short, long, default_value = "predictions.csv")]
    pub output: PathBuf,

    /// Output format (csv, json)
    #[arg(short, long, default_value = "csv")]
    pub format: String,

    /// Modalities to predict (dms, shape)
    #[arg(short = 't', long, value_delimiter = ',', default_value = "dms,shape")]
    pub targets: Vec<String>,

    /// Batch size for prediction
    #[arg(short, long, default_value = "32")]
    pub batch_size: usize,

    /// Fixed padding length for every batch
    #[arg(long)]
    pub pad_to: Option<usize>,
}

/// Evaluation arguments
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Input data file with ground truth annotations
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Model checkpoint file
    #[arg(short, long, required = true)]
    pub model: PathBuf,

    /// Output file for the JSON evaluation report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Declared data kind of the input
    #[arg(short = 'k', long, default_value = "multimodal")]
    pub data_kind: String,

    /// Batch size for evaluation
    #[arg(short, long, default_value = "32")]
    pub batch_size: usize,

    /// Number of best/worst references to report per modality
    #[arg(long, default_value = "10")]
    pub n_best_worst: usize,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
