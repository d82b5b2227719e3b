//! End-to-end extraction: dataset -> batches -> model -> records -> table.
use crate::aggregate::{output_csv_path, AggregateOutcome, Aggregator};
use crate::alphabet::Alphabet;
use crate::config::{ExtractConfig, LayerSelection};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::fasta::SequenceDataset;
use crate::model::{ModelSpec, RepresentationModel};
use crate::models::esm2::OnnxESM;
use crate::runner::{InferenceRunner, RunSummary};
use crate::writer::ResultWriter;
use itertools::Itertools;

/// Start token overhead per sequence when sizing batches.
pub const EXTRA_TOKS_PER_SEQ: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub run: RunSummary,
    pub aggregate: Option<AggregateOutcome>,
}

/// Validates everything, loads the model and runs the extraction.
pub fn extract(config: &ExtractConfig) -> Result<ExtractSummary> {
    config.validate()?;
    let spec = ModelSpec::resolve(&config.model_location)?;
    spec.check_supported()?;
    if let Some(num_layers) = spec.num_layers() {
        let layers = LayerSelection::normalize(&config.repr_layers, num_layers)?;
        if config.concatenate_dir.is_some() {
            config.aggregate_layer(&layers, num_layers)?;
        }
    }

    let dataset = SequenceDataset::from_file(&config.fasta_file)?;
    let ctx = ExecutionContext::new(config.nogpu)?;
    let alphabet = Alphabet::esm2()?;
    let model = OnnxESM::load(&spec, &ctx, alphabet.padding_idx)?;
    if ctx.is_accelerated() {
        tracing::info!("Transferred model to {:?}", ctx.device());
    }
    extract_with_model(config, &dataset, &model, &spec.name(), &ctx)
}

/// Runs the extraction with an already loaded model.
pub fn extract_with_model(
    config: &ExtractConfig,
    dataset: &SequenceDataset,
    model: &dyn RepresentationModel,
    model_name: &str,
    ctx: &ExecutionContext,
) -> Result<ExtractSummary> {
    config.validate()?;
    let num_layers = model.num_layers();
    let layers = LayerSelection::normalize(&config.repr_layers, num_layers)?;
    let aggregate_layer = match config.concatenate_dir {
        Some(_) => Some(config.aggregate_layer(&layers, num_layers)?),
        None => None,
    };
    let runner = InferenceRunner::new(model, model_name, ctx, &layers, config.include)?;

    let alphabet = Alphabet::esm2()?;
    let converter = alphabet.batch_converter(Some(config.truncation_seq_length));
    let batches = dataset.batch_indices(&alphabet, config.toks_per_batch, EXTRA_TOKS_PER_SEQ)?;
    tracing::info!(
        "Read {} with {} sequences",
        config.fasta_file.display(),
        dataset.len()
    );
    tracing::info!(
        "Extracting layers [{}] from {model_name}",
        layers.as_vec().iter().join(", ")
    );

    let writer = ResultWriter::new(
        &config.output_dir,
        config.include,
        config.truncation_seq_length,
    );
    writer.create_output_dir()?;
    let run = runner.run(dataset, &batches, &converter, &writer)?;
    tracing::info!("Saved representations to {}", config.output_dir.display());

    let aggregate = match (&config.concatenate_dir, aggregate_layer) {
        (Some(concat_dir), Some(layer)) => {
            let csv = output_csv_path(concat_dir, &config.fasta_file, model_name);
            Some(Aggregator::new(layer).write_csv(&config.output_dir, &csv)?)
        }
        _ => {
            tracing::info!("Skipping concatenation as --concatenate-dir was not set.");
            None
        }
    };

    Ok(ExtractSummary { run, aggregate })
}
