//! Slices batch outputs into per-sequence records and persists them.
use crate::alphabet::EncodedBatch;
use crate::config::IncludeSet;
use crate::error::{ExtractError, Result};
use crate::model::ModelOutput;
use crate::record::ResultRecord;
use candle_core::{IndexOp, Tensor};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct ResultWriter {
    output_dir: PathBuf,
    include: IncludeSet,
    truncation_seq_length: usize,
}

impl ResultWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        include: IncludeSet,
        truncation_seq_length: usize,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            include,
            truncation_seq_length,
        }
    }

    pub fn create_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            ExtractError::io(format!("creating {}", self.output_dir.display()), e)
        })
    }

    /// Builds the record for row `row` of a host-resident batch output.
    /// `seq_len` is the untruncated token count of that sequence.
    ///
    /// Every tensor is copied out of the batch buffers so the record does not
    /// keep them alive.
    pub fn slice_record(
        &self,
        output: &ModelOutput,
        row: usize,
        label: &str,
        seq_len: usize,
    ) -> Result<ResultRecord> {
        let truncate_len = self.truncation_seq_length.min(seq_len);
        let mut record = ResultRecord::new(label);

        if self.include.per_tok {
            record.representations =
                Some(per_layer(output, |t| t.i((row, 1..truncate_len + 1)))?);
        }
        if self.include.mean {
            record.mean_representations =
                Some(per_layer(output, |t| t.i((row, 1..truncate_len + 1))?.mean(0))?);
        }
        if self.include.bos {
            record.bos_representations = Some(per_layer(output, |t| t.i((row, 0)))?);
        }
        if self.include.contacts {
            let contacts = output.contacts.as_ref().ok_or_else(|| {
                ExtractError::Config("contacts were requested but the model returned none".into())
            })?;
            record.contacts = Some(contacts.i((row, ..truncate_len, ..truncate_len))?.copy()?);
        }
        Ok(record)
    }

    /// Writes one record per sequence in the batch. Returns the written paths.
    pub fn write_batch(
        &self,
        batch: &EncodedBatch,
        output: &ModelOutput,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(batch.labels.len());
        for (row, (label, &seq_len)) in batch.labels.iter().zip(&batch.lengths).enumerate() {
            let record = self.slice_record(output, row, label, seq_len)?;
            let path = record.path_in(&self.output_dir)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ExtractError::io(format!("creating {}", parent.display()), e))?;
            }
            record.save(&path)?;
            tracing::debug!("Saved {label} to {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn per_layer<F>(output: &ModelOutput, slice: F) -> Result<BTreeMap<usize, Tensor>>
where
    F: Fn(&Tensor) -> candle_core::Result<Tensor>,
{
    let mut layers = BTreeMap::new();
    for (&layer, t) in &output.representations {
        layers.insert(layer, slice(t)?.copy()?);
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputKind;
    use candle_core::Device;

    /// rep[b, t, d] = 1000 b + 10 t + d
    fn fake_output(batch: usize, tokens: usize, hidden: usize) -> ModelOutput {
        let mut data = Vec::with_capacity(batch * tokens * hidden);
        for b in 0..batch {
            for t in 0..tokens {
                for d in 0..hidden {
                    data.push((1000 * b + 10 * t + d) as f32);
                }
            }
        }
        let rep = Tensor::from_vec(data, (batch, tokens, hidden), &Device::Cpu).unwrap();
        let side = tokens - 2;
        let contacts: Vec<f32> = (0..batch * side * side).map(|v| v as f32).collect();
        let contacts = Tensor::from_vec(contacts, (batch, side, side), &Device::Cpu).unwrap();
        ModelOutput {
            representations: BTreeMap::from([(6, rep)]),
            contacts: Some(contacts),
        }
    }

    fn writer(kinds: &[OutputKind], truncation: usize) -> ResultWriter {
        ResultWriter::new("unused", IncludeSet::from_kinds(kinds).unwrap(), truncation)
    }

    #[test]
    fn test_per_tok_drops_bos_and_padding() -> Result<()> {
        let output = fake_output(2, 9, 3);
        let w = writer(&[OutputKind::PerTok, OutputKind::Bos], 1022);
        let record = w.slice_record(&output, 1, "b", 4)?;
        let per_tok = &record.representations.as_ref().unwrap()[&6];
        assert_eq!(per_tok.dims(), &[4, 3]);
        let rows = per_tok.to_vec2::<f32>()?;
        assert_eq!(rows[0], vec![1010.0, 1011.0, 1012.0]);
        assert_eq!(rows[3][0], 1040.0);
        let bos = record.bos_representations.as_ref().unwrap()[&6].to_vec1::<f32>()?;
        assert_eq!(bos, vec![1000.0, 1001.0, 1002.0]);
        assert!(record.mean_representations.is_none());
        assert!(record.contacts.is_none());
        Ok(())
    }

    #[test]
    fn test_truncation_applies_to_every_output() -> Result<()> {
        let output = fake_output(1, 7, 2);
        let w = writer(&[OutputKind::PerTok, OutputKind::Mean, OutputKind::Contacts], 3);
        let record = w.slice_record(&output, 0, "a", 10)?;
        assert_eq!(record.representations.as_ref().unwrap()[&6].dims(), &[3, 2]);
        assert_eq!(record.contacts.as_ref().unwrap().dims(), &[3, 3]);
        // positions 1, 2, 3
        let mean = record.mean_representations.as_ref().unwrap()[&6].to_vec1::<f32>()?;
        assert!((mean[0] - 20.0).abs() < 1e-4);
        assert!((mean[1] - 21.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_contacts_slice() -> Result<()> {
        let output = fake_output(2, 12, 2);
        let w = writer(&[OutputKind::Contacts], 1022);
        let record = w.slice_record(&output, 1, "b", 10)?;
        let contacts = record.contacts.as_ref().unwrap();
        assert_eq!(contacts.dims(), &[10, 10]);
        // row 1 starts after the 10x10 block of row 0
        assert_eq!(contacts.to_vec2::<f32>()?[0][0], 100.0);
        assert!(record.representations.is_none());
        Ok(())
    }
}
