use anyhow::Context;
use clap::Parser;
use ferritin_extract::config::{DEFAULT_TOKS_PER_BATCH, DEFAULT_TRUNCATION_SEQ_LENGTH};
use ferritin_extract::{
    extract, AggregateOutcome, ExtractConfig, IncludeSet, LayerRequest, OutputKind,
};
use std::path::PathBuf;

/// Extract per-token representations and model outputs for sequences in a FASTA file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// ONNX export to run. Name it after a checkpoint (`esm2_t6_8M_UR50D.onnx`) to check
    /// layer requests before it is loaded
    model_location: String,

    /// FASTA file on which to extract representations
    fasta_file: PathBuf,

    /// Output directory for extracted representations
    output_dir: PathBuf,

    /// Maximum number of tokens per batch
    #[arg(long, default_value_t = DEFAULT_TOKS_PER_BATCH)]
    toks_per_batch: usize,

    /// Layer indices from which to extract representations (0 to num_layers, inclusive).
    /// Negative indices count from the end; `last` is the final layer.
    #[arg(long, num_args = 1.., allow_negative_numbers = true, default_value = "last")]
    repr_layers: Vec<LayerRequest>,

    /// Which representations to return
    #[arg(long, num_args = 1.., required = true)]
    include: Vec<OutputKind>,

    /// Truncate sequences longer than the given value
    #[arg(long, default_value_t = DEFAULT_TRUNCATION_SEQ_LENGTH)]
    truncation_seq_length: usize,

    /// Do not use GPU even if available
    #[arg(long)]
    nogpu: bool,

    /// Output directory for concatenated mean representations
    #[arg(long)]
    concatenate_dir: Option<PathBuf>,

    /// Layer whose mean representation is concatenated (defaults to the deepest extracted layer)
    #[arg(long, allow_negative_numbers = true)]
    concatenate_layer: Option<LayerRequest>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ExtractConfig> {
        Ok(ExtractConfig {
            model_location: self.model_location,
            fasta_file: self.fasta_file,
            output_dir: self.output_dir,
            toks_per_batch: self.toks_per_batch,
            repr_layers: self.repr_layers,
            include: IncludeSet::from_kinds(&self.include)?,
            truncation_seq_length: self.truncation_seq_length,
            nogpu: self.nogpu,
            concatenate_dir: self.concatenate_dir,
            concatenate_layer: self.concatenate_layer,
        })
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.into_config()?;
        let summary = extract(&config)
            .with_context(|| format!("extracting from {}", config.fasta_file.display()))?;
        match summary.aggregate {
            Some(AggregateOutcome::Written { path, rows, columns }) => {
                tracing::info!("Wrote {rows} x {columns} table to {}", path.display())
            }
            Some(AggregateOutcome::NoData) => tracing::warn!("No data to concatenate."),
            None => {}
        }
        Ok(())
    }
}
