//! Run configuration.
//!
//! Everything here is validated before the model is loaded or any batch runs.
use crate::error::{ExtractError, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use strum::{Display, EnumString};

pub const DEFAULT_TOKS_PER_BATCH: usize = 4096;
pub const DEFAULT_TRUNCATION_SEQ_LENGTH: usize = 1022;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    clap::ValueEnum,
)]
#[strum(serialize_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum OutputKind {
    Mean,
    PerTok,
    Bos,
    Contacts,
}

/// One flag per output kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeSet {
    pub mean: bool,
    pub per_tok: bool,
    pub bos: bool,
    pub contacts: bool,
}

impl IncludeSet {
    pub fn from_kinds(kinds: &[OutputKind]) -> Result<Self> {
        if kinds.is_empty() {
            return Err(ExtractError::Config(
                "at least one output kind must be included".to_string(),
            ));
        }
        let mut set = Self::default();
        for kind in kinds {
            match kind {
                OutputKind::Mean => set.mean = true,
                OutputKind::PerTok => set.per_tok = true,
                OutputKind::Bos => set.bos = true,
                OutputKind::Contacts => set.contacts = true,
            }
        }
        Ok(set)
    }

    /// True when any per-layer representation is requested.
    pub fn needs_representations(&self) -> bool {
        self.mean || self.per_tok || self.bos
    }
}

/// A requested layer, either absolute or counted from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRequest {
    /// The final layer.
    Last,
    /// `0..=num_layers` counts from the embedding output; `-1` is the last
    /// layer, `-(num_layers + 1)` the embedding output.
    Index(i64),
}

impl std::str::FromStr for LayerRequest {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "last" => Ok(Self::Last),
            other => other.parse().map(Self::Index),
        }
    }
}

/// Absolute layer indices in `[0, num_layers]`, ascending and unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSelection {
    layers: BTreeSet<usize>,
}

impl LayerSelection {
    pub fn normalize(requests: &[LayerRequest], num_layers: usize) -> Result<Self> {
        let total = num_layers as i64 + 1;
        let requests = if requests.is_empty() {
            &[LayerRequest::Last][..]
        } else {
            requests
        };
        let mut layers = BTreeSet::new();
        for request in requests {
            let absolute = match *request {
                LayerRequest::Last => num_layers,
                LayerRequest::Index(index) => {
                    if !(-total..total).contains(&index) {
                        return Err(ExtractError::LayerOutOfRange { index, num_layers });
                    }
                    if index < 0 {
                        (index + total) as usize
                    } else {
                        index as usize
                    }
                }
            };
            layers.insert(absolute);
        }
        Ok(Self { layers })
    }

    pub fn as_vec(&self) -> Vec<usize> {
        self.layers.iter().copied().collect()
    }

    pub fn contains(&self, layer: usize) -> bool {
        self.layers.contains(&layer)
    }

    pub fn max(&self) -> Option<usize> {
        self.layers.last().copied()
    }
}

/// Validated settings for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub model_location: String,
    pub fasta_file: PathBuf,
    pub output_dir: PathBuf,
    pub toks_per_batch: usize,
    pub repr_layers: Vec<LayerRequest>,
    pub include: IncludeSet,
    pub truncation_seq_length: usize,
    pub nogpu: bool,
    pub concatenate_dir: Option<PathBuf>,
    pub concatenate_layer: Option<LayerRequest>,
}

impl ExtractConfig {
    /// Checks that do not need the model.
    pub fn validate(&self) -> Result<()> {
        if self.toks_per_batch == 0 {
            return Err(ExtractError::Config(
                "toks_per_batch must be at least 1".to_string(),
            ));
        }
        if self.truncation_seq_length == 0 {
            return Err(ExtractError::Config(
                "truncation_seq_length must be at least 1".to_string(),
            ));
        }
        if self.concatenate_dir.is_some() && !self.include.mean {
            return Err(ExtractError::Config(format!(
                "--concatenate-dir needs `{}` among the included outputs",
                OutputKind::Mean
            )));
        }
        if self.concatenate_layer.is_some() && self.concatenate_dir.is_none() {
            return Err(ExtractError::Config(
                "--concatenate-layer is only meaningful with --concatenate-dir".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the layer the aggregator reads. Defaults to the deepest
    /// requested layer.
    pub fn aggregate_layer(&self, layers: &LayerSelection, num_layers: usize) -> Result<usize> {
        match self.concatenate_layer {
            Some(request) => {
                let layer = LayerSelection::normalize(&[request], num_layers)?
                    .max()
                    .unwrap_or(num_layers);
                if !layers.contains(layer) {
                    return Err(ExtractError::Config(format!(
                        "concatenate layer {layer} is not among the extracted layers {:?}",
                        layers.as_vec()
                    )));
                }
                Ok(layer)
            }
            None => layers.max().ok_or_else(|| {
                ExtractError::Config("no representation layers selected".to_string())
            }),
        }
    }
}
