//! ESM-1b / ESM-2 alphabet and batch encoding.
//!
//! The vocabulary order matches the published ESM models so token ids line up
//! with their embedding tables:
//!
//! | ids    | tokens                                   |
//! |--------|------------------------------------------|
//! | 0..4   | `<cls> <pad> <eos> <unk>`                |
//! | 4..31  | `L A G V S E R T I D P K Q N F Y M H W C X B U Z O . -` |
//! | 31     | `<null_1>`                               |
//! | 32     | `<mask>`                                 |
use crate::context::ExecutionContext;
use crate::error::{ExtractError, Result};
use crate::fasta::SequenceRecord;
use candle_core::Tensor;
use tokenizers::Tokenizer;

/// Wraps the ESM tokenizer. Encoding frames every sequence as
/// `<cls> residues.. <eos>`; special tokens written inline (`<mask>`) are kept
/// as single tokens and unknown residues map to `<unk>`.
#[derive(Debug, Clone)]
pub struct Alphabet {
    tokenizer: Tokenizer,
    pub padding_idx: u32,
    pub cls_idx: u32,
    pub eos_idx: u32,
    pub unk_idx: u32,
    pub mask_idx: u32,
}

impl Alphabet {
    pub fn esm2() -> Result<Self> {
        let tokenizer_bytes = include_bytes!("tokenizer.json");
        let tokenizer = Tokenizer::from_bytes(tokenizer_bytes)
            .map_err(|e| ExtractError::Tokenizer(format!("Failed to load tokenizer: {e}")))?;
        let id = |tok: &str| {
            tokenizer
                .token_to_id(tok)
                .ok_or_else(|| ExtractError::Tokenizer(format!("`{tok}` is not in the vocabulary")))
        };
        Ok(Self {
            padding_idx: id("<pad>")?,
            cls_idx: id("<cls>")?,
            eos_idx: id("<eos>")?,
            unk_idx: id("<unk>")?,
            mask_idx: id("<mask>")?,
            tokenizer,
        })
    }

    /// Token ids including the `<cls>`/`<eos>` frame.
    pub fn encode(&self, sequence: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(sequence, true)
            .map_err(|e| ExtractError::Tokenizer(format!("Tokenization failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Number of residue tokens, without the frame.
    pub fn token_count(&self, sequence: &str) -> Result<usize> {
        Ok(self.encode(sequence)?.len().saturating_sub(2))
    }

    pub fn batch_converter(&self, truncation_seq_length: Option<usize>) -> BatchConverter<'_> {
        BatchConverter {
            alphabet: self,
            truncation_seq_length,
        }
    }
}

/// One batch after tokenization.
#[derive(Debug)]
pub struct EncodedBatch {
    pub labels: Vec<String>,
    pub sequences: Vec<String>,
    /// Token count of each sequence before truncation.
    pub lengths: Vec<usize>,
    /// `[batch, max_len + 2]` i64 tokens: `<cls> seq.. <eos> <pad>..`
    pub tokens: Tensor,
}

pub struct BatchConverter<'a> {
    alphabet: &'a Alphabet,
    truncation_seq_length: Option<usize>,
}

impl BatchConverter<'_> {
    /// Truncates each framed sequence to `truncation_seq_length` residues
    /// (keeping `<eos>`) and right-pads the batch with `<pad>`.
    pub fn convert(
        &self,
        records: &[&SequenceRecord],
        ctx: &ExecutionContext,
    ) -> Result<EncodedBatch> {
        let alphabet = self.alphabet;
        let mut lengths = Vec::with_capacity(records.len());
        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            let mut ids = alphabet.encode(&record.sequence)?;
            let residues = ids.len().saturating_sub(2);
            lengths.push(residues);
            if let Some(limit) = self.truncation_seq_length.filter(|&l| l < residues) {
                ids.truncate(limit + 1);
                ids.push(alphabet.eos_idx);
            }
            encoded.push(ids);
        }

        let width = encoded.iter().map(Vec::len).max().unwrap_or(0);
        let mut flat = vec![alphabet.padding_idx as i64; records.len() * width];
        for (row, ids) in flat.chunks_mut(width.max(1)).zip(&encoded) {
            for (slot, &id) in row.iter_mut().zip(ids) {
                *slot = id as i64;
            }
        }

        let tokens = Tensor::from_vec(flat, (records.len(), width), ctx.device())?;
        Ok(EncodedBatch {
            labels: records.iter().map(|r| r.label.clone()).collect(),
            sequences: records.iter().map(|r| r.sequence.clone()).collect(),
            lengths,
            tokens,
        })
    }
}
