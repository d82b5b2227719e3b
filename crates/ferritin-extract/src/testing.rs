//! Deterministic stand-in for a protein language model.
use crate::error::Result;
use crate::model::{ModelOutput, RepresentationModel};
use candle_core::{DType, Tensor};
use std::collections::BTreeMap;

/// `rep[layer][b, t, d] = token + 100 * layer + 1000 * d`
///
/// `contacts[b, i, j] = token[i + 1] + token[j + 1]`
pub(crate) struct MockModel {
    pub num_layers: usize,
    pub hidden: usize,
    pub contacts: bool,
    pub alignments: bool,
}

impl MockModel {
    pub fn new(num_layers: usize, hidden: usize) -> Self {
        Self {
            num_layers,
            hidden,
            contacts: true,
            alignments: false,
        }
    }
}

impl RepresentationModel for MockModel {
    fn num_layers(&self) -> usize {
        self.num_layers
    }

    fn accepts_alignments(&self) -> bool {
        self.alignments
    }

    fn supports_contacts(&self) -> bool {
        self.contacts
    }

    fn forward(
        &self,
        tokens: &Tensor,
        repr_layers: &[usize],
        return_contacts: bool,
    ) -> Result<ModelOutput> {
        let device = tokens.device();
        let (_, width) = tokens.dims2()?;
        let toks = tokens.to_dtype(DType::F32)?;
        let dims = Tensor::arange(0u32, self.hidden as u32, device)?
            .to_dtype(DType::F32)?
            .affine(1000.0, 0.0)?
            .reshape((1, 1, self.hidden))?;

        let mut representations = BTreeMap::new();
        for &layer in repr_layers {
            let rep = toks
                .unsqueeze(2)?
                .broadcast_add(&dims)?
                .affine(1.0, 100.0 * layer as f64)?;
            representations.insert(layer, rep);
        }

        let contacts = if return_contacts {
            let inner = toks.narrow(1, 1, width - 2)?;
            Some(inner.unsqueeze(2)?.broadcast_add(&inner.unsqueeze(1)?)?)
        } else {
            None
        };
        Ok(ModelOutput {
            representations,
            contacts,
        })
    }
}
