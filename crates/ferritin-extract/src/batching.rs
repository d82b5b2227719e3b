//! Token-budgeted batch planning.
//!
//! Sequences are visited shortest first so that each batch holds sequences of
//! similar length and padding stays small. A batch is closed as soon as adding
//! the next sequence would push its padded size (`longest * count`) past the
//! budget. The padded size is never smaller than the summed size, so the summed
//! budget holds too.
use itertools::Itertools;

/// Indices into the dataset, in the order they are fed to the model.
pub type Batch = Vec<usize>;

pub fn plan_batches(
    lengths: &[usize],
    toks_per_batch: usize,
    extra_toks_per_seq: usize,
) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut buf: Batch = Vec::new();
    let mut max_len = 0usize;

    let order = lengths
        .iter()
        .enumerate()
        .map(|(idx, &len)| (len, idx))
        .sorted();

    for (len, idx) in order {
        let cost = len + extra_toks_per_seq;
        if !buf.is_empty() && cost.max(max_len) * (buf.len() + 1) > toks_per_batch {
            batches.push(std::mem::take(&mut buf));
            max_len = 0;
        }
        max_len = max_len.max(cost);
        buf.push(idx);
    }
    if !buf.is_empty() {
        batches.push(buf);
    }
    batches
}
