//! Drives encoded batches through a model and hands host copies of the outputs
//! to the writer.
use crate::alphabet::BatchConverter;
use crate::batching::Batch;
use crate::config::{IncludeSet, LayerSelection};
use crate::context::ExecutionContext;
use crate::error::{ExtractError, Result};
use crate::fasta::SequenceDataset;
use crate::model::{ModelOutput, RepresentationModel};
use crate::writer::ResultWriter;
use candle_core::Tensor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub sequences: usize,
}

pub struct InferenceRunner<'a> {
    model: &'a dyn RepresentationModel,
    ctx: &'a ExecutionContext,
    repr_layers: Vec<usize>,
    return_contacts: bool,
}

impl<'a> InferenceRunner<'a> {
    /// Fails when the model cannot serve the requested outputs. Runs once,
    /// before any batch.
    pub fn new(
        model: &'a dyn RepresentationModel,
        model_name: &str,
        ctx: &'a ExecutionContext,
        layers: &LayerSelection,
        include: IncludeSet,
    ) -> Result<Self> {
        if model.accepts_alignments() {
            return Err(ExtractError::UnsupportedModel {
                model: model_name.to_string(),
                reason: "models with MSA input are not handled".to_string(),
            });
        }
        if include.contacts && !model.supports_contacts() {
            return Err(ExtractError::UnsupportedModel {
                model: model_name.to_string(),
                reason: "contacts were requested but the model does not predict them".to_string(),
            });
        }
        if let Some(layer) = layers.max().filter(|&l| l > model.num_layers()) {
            return Err(ExtractError::LayerOutOfRange {
                index: layer as i64,
                num_layers: model.num_layers(),
            });
        }
        Ok(Self {
            model,
            ctx,
            repr_layers: layers.as_vec(),
            return_contacts: include.contacts,
        })
    }

    pub fn forward(&self, tokens: &Tensor) -> Result<ModelOutput> {
        let tokens = tokens.to_device(self.ctx.device())?;
        self.model
            .forward(&tokens, &self.repr_layers, self.return_contacts)?
            .to_host()
    }

    pub fn run(
        &self,
        dataset: &SequenceDataset,
        batches: &[Batch],
        converter: &BatchConverter<'_>,
        writer: &ResultWriter,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for (batch_idx, batch) in batches.iter().enumerate() {
            let records = dataset.select(batch);
            let encoded = converter.convert(&records, self.ctx)?;
            tracing::info!(
                "Processing {} of {} batches ({} sequences)",
                batch_idx + 1,
                batches.len(),
                records.len()
            );
            tracing::debug!("Device: {:?}", encoded.tokens.device());

            let output = self.forward(&encoded.tokens)?;
            writer.write_batch(&encoded, &output)?;

            summary.batches += 1;
            summary.sequences += records.len();
        }
        Ok(summary)
    }
}
