use anyhow::{Context, Result};
use burn::backend::Autodiff;
use rnaprobe::cli::{parse_args, setup_logging, Commands, EvaluateArgs, PredictArgs, TrainArgs};
use rnaprobe::data::loader::{DataLoader, LoaderConfig};
use rnaprobe::data::preprocessing::{convert_to_datapoints, load_dataset, split_dataset, DatasetKind};
use rnaprobe::data::{Modality, SplitConfig};
use rnaprobe::model::ModelConfig;
use rnaprobe::predict::{
    attach_prediction_targets, collect_signal_predictions, save_predictions_to_csv,
    save_predictions_to_json, PredictionSummary, Predictor,
};
use rnaprobe::training::callbacks::{BestWorstTracker, MetricAccumulator};
use rnaprobe::training::{trainer::Trainer, TrainingConfig};
use rnaprobe::DefaultBackend;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info};

type TrainingBackend = Autodiff<DefaultBackend>;

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", rnaprobe::info());

    let result = match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Predict(args) => run_predict(args),
        Commands::Evaluate(args) => run_evaluate(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn parse_kind(name: &str) -> Result<DatasetKind> {
    match name.to_lowercase().as_str() {
        "dms" => Ok(DatasetKind::Dms),
        "shape" => Ok(DatasetKind::Shape),
        "structure" => Ok(DatasetKind::Structure),
        "multimodal" => Ok(DatasetKind::Multimodal),
        other => anyhow::bail!("unknown data kind: {other}"),
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    info!("Starting training...");
    info!("Input file: {:?}", args.input);
    info!("Output directory: {:?}", args.output);

    rnaprobe::utils::ensure_dir(&args.output)?;

    let kind = parse_kind(&args.data_kind)?;
    let datapoints = load_dataset(&args.input, kind, &LoaderConfig::default())
        .with_context(|| format!("Failed to load data from {:?}", args.input))?;

    let split_config = SplitConfig {
        train_ratio: 1.0 - args.val_ratio - args.test_ratio,
        val_ratio: args.val_ratio,
        test_ratio: args.test_ratio,
        seed: args.seed,
    };
    let dataset = split_dataset(datapoints, &split_config);

    let training_config = TrainingConfig {
        epochs: if args.quick { 3 } else { args.epochs },
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        lr_scheduler: args.lr_scheduler.clone(),
        early_stopping_patience: args.patience,
        zero_padding_to: args.pad_to,
        use_quality: !args.no_quality,
        seed: args.seed,
        ..TrainingConfig::default()
    };
    let model_config = if args.quick {
        ModelConfig::small()
    } else {
        ModelConfig::new()
    };

    let device = burn_ndarray::NdArrayDevice::default();
    let checkpoint_dir = args.output.join("checkpoints");

    let trainer = Trainer::<TrainingBackend>::new(training_config, model_config, device)
        .with_checkpoint_dir(&checkpoint_dir)?;

    let result = trainer.train(&dataset).context("Training failed")?;

    info!("=== Training Results ===");
    info!("Total epochs: {}", result.state.epoch);
    info!("Best val loss: {:.5}", result.state.best_loss);
    info!(
        "Training time: {}",
        rnaprobe::utils::format_duration(result.duration_secs)
    );
    if let Some(mae) = result.final_metrics.dms_mae {
        info!("Final DMS mae: {:.4}", mae);
    }
    if let Some(mae) = result.final_metrics.shape_mae {
        info!("Final SHAPE mae: {:.4}", mae);
    }
    if let Some(f1) = result.final_metrics.structure_f1 {
        info!("Final structure F1: {:.4}", f1);
    }
    if let Some(ref checkpoint) = result.best_checkpoint {
        info!("Best model saved to: {:?}", checkpoint);
    }

    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    info!("Starting prediction...");
    info!("Input file: {:?}", args.input);
    info!("Model: {:?}", args.model);

    let targets: Vec<Modality> = args
        .targets
        .iter()
        .map(|t| {
            t.parse::<Modality>()
                .map_err(|e| anyhow::anyhow!(e))
                .and_then(|m| {
                    anyhow::ensure!(m.is_signal(), "only dms and shape can be exported");
                    Ok(m)
                })
        })
        .collect::<Result<_>>()?;

    let records = DataLoader::new().load(&args.input)?;
    let datapoints = convert_to_datapoints(&records)?
        .into_iter()
        .map(|dp| attach_prediction_targets(dp, &targets))
        .collect::<Result<Vec<_>>>()?;

    let device = burn_ndarray::NdArrayDevice::default();
    let predictor = Predictor::<DefaultBackend>::from_checkpoint(&args.model, device)?
        .with_batch_size(args.batch_size)
        .with_padding(args.pad_to);

    info!("Running prediction over {} sequences...", datapoints.len());
    let scored = predictor.predict(&datapoints)?;
    let predictions = collect_signal_predictions(&scored)?;

    PredictionSummary::from_predictions(&predictions).print();

    match args.format.as_str() {
        "csv" => save_predictions_to_csv(&predictions, &args.output)?,
        "json" => save_predictions_to_json(&predictions, &args.output)?,
        other => anyhow::bail!("Unsupported output format: {other}"),
    }

    info!("Predictions saved to: {:?}", args.output);

    Ok(())
}

/// JSON evaluation report written by the evaluate subcommand
#[derive(Debug, Serialize)]
struct EvaluationReport {
    num_datapoints: usize,
    /// modality -> metric -> masked mean over the evaluated datapoints
    metrics: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    /// modality -> best references by the reference metric
    best: BTreeMap<String, Vec<(String, f64)>>,
    /// modality -> worst references by the reference metric
    worst: BTreeMap<String, Vec<(String, f64)>>,
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    info!("Starting evaluation...");
    info!("Input file: {:?}", args.input);
    info!("Model: {:?}", args.model);

    let kind = parse_kind(&args.data_kind)?;
    let datapoints = load_dataset(&args.input, kind, &LoaderConfig::default())?;

    let device = burn_ndarray::NdArrayDevice::default();
    let predictor = Predictor::<DefaultBackend>::from_checkpoint(&args.model, device)?
        .with_batch_size(args.batch_size)
        .with_postprocess(false);

    info!("Scoring {} datapoints...", datapoints.len());
    let mut scored = predictor.predict(&datapoints)?;

    let mut accumulator = MetricAccumulator::new();
    let mut trackers: Vec<BestWorstTracker> = Modality::ALL
        .into_iter()
        .map(|m| BestWorstTracker::new(m, args.n_best_worst))
        .collect();

    for dp in &mut scored {
        let pack = dp.compute_error_metrics_pack().clone();
        accumulator.accumulate(&pack);
        for tracker in &mut trackers {
            let modality = tracker.modality();
            tracker.record(dp.reference(), dp.read_reference_metric(modality));
        }
    }

    info!("=== Evaluation Results ===");
    for (modality, metric_means) in accumulator.means() {
        for (metric, mean) in metric_means {
            match mean {
                Some(value) => info!("{}/{}: {:.4}", modality, metric, value),
                None => info!("{}/{}: no signal", modality, metric),
            }
        }
    }

    if let Some(output) = args.output {
        let report = EvaluationReport {
            num_datapoints: scored.len(),
            metrics: accumulator
                .means()
                .into_iter()
                .map(|(modality, means)| {
                    let means = means
                        .into_iter()
                        .map(|(name, mean)| (name.to_string(), mean))
                        .collect();
                    (modality.to_string(), means)
                })
                .collect(),
            best: trackers
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| (t.modality().to_string(), t.best()))
                .collect(),
            worst: trackers
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| (t.modality().to_string(), t.worst()))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&output, json)?;
        info!("Evaluation report saved to: {:?}", output);
    }

    Ok(())
}
