use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("layer index {index} is outside [-{}, {num_layers}]", .num_layers + 1)]
    LayerOutOfRange { index: i64, num_layers: usize },

    #[error("unsupported model `{model}`: {reason}")]
    UnsupportedModel { model: String, reason: String },

    #[error("{}:{line}: {reason}", .path.display())]
    Fasta {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("sequence `{0}` is empty")]
    EmptySequence(String),

    #[error("duplicate sequence identifier `{0}`")]
    DuplicateIdentifier(String),

    #[error("identifier `{0}` cannot be used as an output file name")]
    InvalidIdentifier(String),

    #[error("tokenizer: {0}")]
    Tokenizer(String),

    #[error("malformed result record {}: {reason}", .path.display())]
    Record { path: PathBuf, reason: String },

    #[error("record `{label}` has a {found}-dimensional mean representation, expected {expected}")]
    DimensionMismatch {
        label: String,
        expected: usize,
        found: usize,
    },

    #[error("record `{label}` holds no mean representation for layer {layer}")]
    MissingLayer { label: String, layer: usize },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Ort(#[from] ort::Error),

    #[error(transparent)]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl ExtractError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
