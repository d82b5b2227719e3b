//! ESM2 via ONNX Runtime.
//!
//! Any local export with this interface can be used:
//!
//! * input `input_ids` `[batch, tokens]` (i64), optional `attention_mask`
//! * output `hidden_states` `[num_layers + 1, batch, tokens, hidden]` (f32)
//! * optional output `contacts` `[batch, tokens - 2, tokens - 2]` (f32)
//!
//! The depth comes from the checkpoint the file is named after, a
//! `num_layers` metadata entry, or a static leading dimension on
//! `hidden_states`. When more than one is present they must agree.
use crate::context::ExecutionContext;
use crate::error::{ExtractError, Result};
use crate::model::{ModelOutput, ModelSpec, RepresentationModel};
use candle_core::{Device, Tensor};
use ndarray::{Array2, ArrayViewD, Axis};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::ValueType,
};
use std::collections::BTreeMap;

const INPUT_IDS: &str = "input_ids";
const ATTENTION_MASK: &str = "attention_mask";
const HIDDEN_STATES: &str = "hidden_states";
const CONTACTS: &str = "contacts";

pub struct OnnxESM {
    name: String,
    session: Session,
    num_layers: usize,
    padding_idx: i64,
    has_attention_mask: bool,
    has_contacts: bool,
}

impl OnnxESM {
    pub fn load(spec: &ModelSpec, ctx: &ExecutionContext, padding_idx: u32) -> Result<Self> {
        let model_path = spec.onnx_path()?;
        let name = spec.name();
        tracing::info!("Loading {name} from {}", model_path.display());

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_intra_threads(1)?;
        if ctx.is_cuda() {
            builder =
                builder.with_execution_providers([CUDAExecutionProvider::default().build()])?;
        }
        let session = builder.commit_from_file(model_path)?;

        for input in &session.inputs {
            tracing::debug!("Input name: {} type: {:?}", input.name, input.input_type);
        }
        let unsupported = |reason: String| ExtractError::UnsupportedModel {
            model: name.clone(),
            reason,
        };
        if !session.outputs.iter().any(|o| o.name == HIDDEN_STATES) {
            return Err(unsupported(format!(
                "the export has no `{HIDDEN_STATES}` output"
            )));
        }
        let has_contacts = session.outputs.iter().any(|o| o.name == CONTACTS);
        let has_attention_mask = session.inputs.iter().any(|i| i.name == ATTENTION_MASK);

        let declared = Self::declared_num_layers(&session).map_err(unsupported)?;
        let num_layers = match (spec.num_layers(), declared) {
            (Some(expected), Some(found)) if expected != found => {
                return Err(unsupported(format!(
                    "the export has {found} layers, the checkpoint has {expected}"
                )))
            }
            (Some(n), _) | (None, Some(n)) => n,
            (None, None) => {
                return Err(unsupported(
                    "cannot determine the number of layers; add `num_layers` metadata"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            name,
            session,
            num_layers,
            padding_idx: padding_idx as i64,
            has_attention_mask,
            has_contacts,
        })
    }

    /// Depth from `num_layers` metadata, else from the static leading
    /// dimension of `hidden_states`.
    fn declared_num_layers(session: &Session) -> std::result::Result<Option<usize>, String> {
        let metadata = session
            .metadata()
            .and_then(|m| m.custom("num_layers"))
            .map_err(|e| e.to_string())?;
        if let Some(value) = metadata {
            return value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| format!("`num_layers` metadata `{value}` is not an integer"));
        }
        let leading = session
            .outputs
            .iter()
            .find(|o| o.name == HIDDEN_STATES)
            .and_then(|o| match &o.output_type {
                ValueType::Tensor { dimensions, .. } => dimensions.first().copied(),
                _ => None,
            });
        Ok(leading.filter(|&dim| dim > 0).map(|dim| dim as usize - 1))
    }
}

fn view_to_tensor(view: ArrayViewD<'_, f32>) -> Result<Tensor> {
    let shape = view.shape().to_vec();
    let data: Vec<f32> = view.iter().copied().collect();
    Ok(Tensor::from_vec(data, shape, &Device::Cpu)?)
}

impl RepresentationModel for OnnxESM {
    fn num_layers(&self) -> usize {
        self.num_layers
    }

    fn supports_contacts(&self) -> bool {
        self.has_contacts
    }

    fn forward(
        &self,
        tokens: &Tensor,
        repr_layers: &[usize],
        return_contacts: bool,
    ) -> Result<ModelOutput> {
        let (batch, width) = tokens.dims2()?;
        let flat: Vec<i64> = tokens.flatten_all()?.to_vec1::<i64>()?;
        let input_ids = Array2::from_shape_vec((batch, width), flat)?;

        let outputs = if self.has_attention_mask {
            let padding_idx = self.padding_idx;
            let attention_mask = input_ids.mapv(|t| i64::from(t != padding_idx));
            self.session.run(ort::inputs![
                INPUT_IDS => input_ids,
                ATTENTION_MASK => attention_mask
            ]?)?
        } else {
            self.session.run(ort::inputs![INPUT_IDS => input_ids]?)?
        };

        let hidden = outputs[HIDDEN_STATES].try_extract_tensor::<f32>()?;
        let available = hidden.shape().first().copied().unwrap_or(0);
        let mut representations = BTreeMap::new();
        for &layer in repr_layers {
            if layer >= available {
                return Err(ExtractError::UnsupportedModel {
                    model: self.name.clone(),
                    reason: format!(
                        "layer {layer} requested but only {available} hidden states returned"
                    ),
                });
            }
            representations.insert(layer, view_to_tensor(hidden.index_axis(Axis(0), layer))?);
        }

        let contacts = if return_contacts {
            if !self.has_contacts {
                return Err(ExtractError::UnsupportedModel {
                    model: self.name.clone(),
                    reason: format!("the export has no `{CONTACTS}` output"),
                });
            }
            let contacts = outputs[CONTACTS].try_extract_tensor::<f32>()?;
            Some(view_to_tensor(contacts.view())?)
        } else {
            None
        };

        Ok(ModelOutput {
            representations,
            contacts,
        })
    }
}
