//! The model seam.
//!
//! Extraction only needs a forward pass that returns hidden states for chosen
//! layers (and optionally contacts). Anything that can do that implements
//! [`RepresentationModel`].
use crate::error::{ExtractError, Result};
use candle_core::{Device, Tensor};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Output of one forward pass.
#[derive(Debug)]
pub struct ModelOutput {
    /// layer -> `[batch, tokens, hidden]`, position 0 is the start token.
    pub representations: BTreeMap<usize, Tensor>,
    /// `[batch, tokens - 2, tokens - 2]`
    pub contacts: Option<Tensor>,
}

impl ModelOutput {
    /// Copies every tensor into host memory.
    pub fn to_host(self) -> Result<Self> {
        let mut representations = BTreeMap::new();
        for (layer, t) in self.representations {
            representations.insert(layer, t.to_device(&Device::Cpu)?);
        }
        let contacts = match self.contacts {
            Some(c) => Some(c.to_device(&Device::Cpu)?),
            None => None,
        };
        Ok(Self {
            representations,
            contacts,
        })
    }
}

pub trait RepresentationModel {
    /// Number of transformer layers. Layer 0 is the embedding output, so valid
    /// representation indices are `0..=num_layers()`.
    fn num_layers(&self) -> usize;

    /// Models that consume multiple sequence alignments instead of single
    /// sequences cannot be driven by this pipeline.
    fn accepts_alignments(&self) -> bool {
        false
    }

    fn supports_contacts(&self) -> bool;

    fn forward(
        &self,
        tokens: &Tensor,
        repr_layers: &[usize],
        return_contacts: bool,
    ) -> Result<ModelOutput>;
}

/// Published ESM checkpoints.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum ESMModels {
    esm2_t6_8M_UR50D,
    esm2_t12_35M_UR50D,
    esm2_t30_150M_UR50D,
    esm2_t33_650M_UR50D,
    esm2_t36_3B_UR50D,
    esm2_t48_15B_UR50D,
    esm_msa1b_t12_100M_UR50S,
}

impl ESMModels {
    pub fn num_layers(&self) -> usize {
        match self {
            Self::esm2_t6_8M_UR50D => 6,
            Self::esm2_t12_35M_UR50D => 12,
            Self::esm2_t30_150M_UR50D => 30,
            Self::esm2_t33_650M_UR50D => 33,
            Self::esm2_t36_3B_UR50D => 36,
            Self::esm2_t48_15B_UR50D => 48,
            Self::esm_msa1b_t12_100M_UR50S => 12,
        }
    }

    pub fn accepts_alignments(&self) -> bool {
        matches!(self, Self::esm_msa1b_t12_100M_UR50S)
    }

}

/// A model reference resolved without touching weights.
///
/// Weights are always a local ONNX export. A file named after a checkpoint
/// (`esm2_t6_8M_UR50D.onnx`) carries that checkpoint's layer count, so layer
/// requests are checked before the export is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSpec {
    /// A bare checkpoint name: known shape, nothing to load.
    Registry(ESMModels),
    LocalOnnx {
        path: PathBuf,
        known: Option<ESMModels>,
    },
}

impl ModelSpec {
    pub fn resolve(location: &str) -> Result<Self> {
        if let Ok(model) = location.parse::<ESMModels>() {
            return Ok(Self::Registry(model));
        }
        let path = Path::new(location);
        if path.extension().is_some_and(|ext| ext == "onnx") {
            let known = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<ESMModels>().ok());
            return Ok(Self::LocalOnnx {
                path: path.to_path_buf(),
                known,
            });
        }
        let known = ESMModels::iter().map(|m| m.to_string()).collect::<Vec<_>>();
        Err(ExtractError::Config(format!(
            "unknown model `{location}`; expected a `.onnx` file or one of {}",
            known.join(", ")
        )))
    }

    pub fn checkpoint(&self) -> Option<ESMModels> {
        match self {
            Self::Registry(model) => Some(*model),
            Self::LocalOnnx { known, .. } => *known,
        }
    }

    /// Layer count when it is known up front.
    pub fn num_layers(&self) -> Option<usize> {
        self.checkpoint().map(|m| m.num_layers())
    }

    /// Short name used when naming the aggregate table.
    pub fn name(&self) -> String {
        match self {
            Self::Registry(model) => model.to_string(),
            Self::LocalOnnx { path, .. } => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".to_string()),
        }
    }

    /// Fails for checkpoints that cannot be used here, before anything is loaded.
    pub fn check_supported(&self) -> Result<()> {
        if let Some(model) = self.checkpoint().filter(|m| m.accepts_alignments()) {
            return Err(ExtractError::UnsupportedModel {
                model: model.to_string(),
                reason: "models with MSA input are not handled".to_string(),
            });
        }
        Ok(())
    }

    /// The export to open.
    pub fn onnx_path(&self) -> Result<&Path> {
        match self {
            Self::LocalOnnx { path, .. } => Ok(path),
            Self::Registry(model) => Err(ExtractError::UnsupportedModel {
                model: model.to_string(),
                reason: format!(
                    "pass the path to an ONNX export with a `hidden_states` output, \
                     e.g. `{model}.onnx`"
                ),
            }),
        }
    }
}
