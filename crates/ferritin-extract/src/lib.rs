//! ferritin-extract
//!
//! Batched extraction of per-residue, mean-pooled and start-token
//! representations (and optional contact maps) from protein language models.
//!
//! ```shell
//! ferritin-extract exports/esm2_t6_8M_UR50D.onnx proteins.fasta out/ --include mean per_tok
//! ferritin-extract exports/esm2_t6_8M_UR50D.onnx proteins.fasta out/ --include mean \
//!     --concatenate-dir tables/
//! ```
//!
//! Models are local ONNX exports with a `hidden_states` output; see
//! [`models::esm2`] for the interface.
//!
//! Each sequence is written to `out/<escaped identifier>.safetensors`; see
//! [`ResultRecord`] for the layout.
pub mod aggregate;
pub mod alphabet;
pub mod batching;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod fasta;
pub mod model;
pub mod models;
pub mod record;
pub mod runner;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{AggregateOutcome, Aggregator};
pub use alphabet::{Alphabet, EncodedBatch};
pub use batching::{plan_batches, Batch};
pub use config::{ExtractConfig, IncludeSet, LayerRequest, LayerSelection, OutputKind};
pub use context::ExecutionContext;
pub use error::{ExtractError, Result};
pub use extract::{extract, extract_with_model, ExtractSummary};
pub use fasta::{SequenceDataset, SequenceRecord};
pub use model::{ESMModels, ModelOutput, ModelSpec, RepresentationModel};
pub use models::esm2::OnnxESM;
pub use record::ResultRecord;
pub use runner::{InferenceRunner, RunSummary};
pub use writer::ResultWriter;
