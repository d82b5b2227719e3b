//! Per-sequence result records.
//!
//! Each record is one safetensors file. Tensors are named
//! `representations.<layer>`, `mean_representations.<layer>`,
//! `bos_representations.<layer>` and `contacts`; the sequence identifier is
//! stored in the `label` metadata entry.
use crate::error::{ExtractError, Result};
use candle_core::{Device, Tensor};
use safetensors::SafeTensors;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const RECORD_EXTENSION: &str = "safetensors";
const LABEL_KEY: &str = "label";
const MAX_STEM_BYTES: usize = 240;

const PER_TOK_PREFIX: &str = "representations";
const MEAN_PREFIX: &str = "mean_representations";
const BOS_PREFIX: &str = "bos_representations";
const CONTACTS_KEY: &str = "contacts";

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub label: String,
    /// layer -> `[len, hidden]`
    pub representations: Option<BTreeMap<usize, Tensor>>,
    /// layer -> `[hidden]`
    pub mean_representations: Option<BTreeMap<usize, Tensor>>,
    /// layer -> `[hidden]`
    pub bos_representations: Option<BTreeMap<usize, Tensor>>,
    /// `[len, len]`
    pub contacts: Option<Tensor>,
}

impl ResultRecord {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            representations: None,
            mean_representations: None,
            bos_representations: None,
            contacts: None,
        }
    }

    /// File name for an identifier. Identifiers are percent-escaped so they
    /// can never introduce directories or climb out of the output directory.
    pub fn file_name(label: &str) -> Result<String> {
        let stem = urlencoding::encode(label);
        if label.is_empty() || stem.len() > MAX_STEM_BYTES {
            return Err(ExtractError::InvalidIdentifier(label.to_string()));
        }
        Ok(format!("{stem}.{RECORD_EXTENSION}"))
    }

    pub fn path_in(&self, dir: &Path) -> Result<PathBuf> {
        Ok(dir.join(Self::file_name(&self.label)?))
    }

    fn named_tensors(&self) -> Vec<(String, Tensor)> {
        let mut named = Vec::new();
        let groups = [
            (PER_TOK_PREFIX, &self.representations),
            (MEAN_PREFIX, &self.mean_representations),
            (BOS_PREFIX, &self.bos_representations),
        ];
        for (prefix, group) in groups {
            if let Some(layers) = group {
                for (layer, t) in layers {
                    named.push((format!("{prefix}.{layer}"), t.clone()));
                }
            }
        }
        if let Some(contacts) = &self.contacts {
            named.push((CONTACTS_KEY.to_string(), contacts.clone()));
        }
        named
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let metadata = HashMap::from([(LABEL_KEY.to_string(), self.label.clone())]);
        safetensors::serialize_to_file(self.named_tensors(), &Some(metadata), path)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |reason: String| ExtractError::Record {
            path: path.to_path_buf(),
            reason,
        };
        let buffer = std::fs::read(path)
            .map_err(|e| ExtractError::io(format!("reading {}", path.display()), e))?;

        let (_, metadata) = SafeTensors::read_metadata(&buffer)?;
        let label = metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(LABEL_KEY))
            .cloned()
            .ok_or_else(|| malformed(format!("missing `{LABEL_KEY}` metadata")))?;

        let mut record = Self::new(label);
        let tensors = candle_core::safetensors::load_buffer(&buffer, &Device::Cpu)?;
        for (name, tensor) in tensors {
            if name == CONTACTS_KEY {
                record.contacts = Some(tensor);
                continue;
            }
            let (prefix, layer) = name
                .rsplit_once('.')
                .and_then(|(p, l)| l.parse::<usize>().ok().map(|l| (p, l)))
                .ok_or_else(|| malformed(format!("unexpected tensor `{name}`")))?;
            let group = match prefix {
                PER_TOK_PREFIX => &mut record.representations,
                MEAN_PREFIX => &mut record.mean_representations,
                BOS_PREFIX => &mut record.bos_representations,
                _ => return Err(malformed(format!("unexpected tensor `{name}`"))),
            };
            group.get_or_insert_with(BTreeMap::new).insert(layer, tensor);
        }
        Ok(record)
    }
}
