//! FASTA-backed sequence dataset.
//!
//! The identifier of a record is its full header line (id and description,
//! trimmed). A header with no text is named after its zero-based line number,
//! `seqnum000000007`.
use crate::alphabet::Alphabet;
use crate::batching::{plan_batches, Batch};
use crate::error::{ExtractError, Result};
use bio::io::fasta;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub label: String,
    pub sequence: String,
}

#[derive(Debug, Default)]
pub struct SequenceDataset {
    records: Vec<SequenceRecord>,
}

impl SequenceDataset {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| ExtractError::io(format!("opening {}", path.display()), e))?;
        Self::from_reader(file, path)
    }

    /// `source` is only used for error messages.
    pub fn from_reader<R: Read>(mut reader: R, source: &Path) -> Result<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| ExtractError::io(format!("reading {}", source.display()), e))?;
        let malformed = |line: usize, reason: String| ExtractError::Fasta {
            path: PathBuf::from(source),
            line,
            reason,
        };

        // zero-based line of every header, and the byte offset of the first
        let mut header_lines = Vec::new();
        let mut start = None;
        let mut offset = 0;
        for (line_idx, line) in text.split_inclusive('\n').enumerate() {
            if line.starts_with('>') {
                header_lines.push(line_idx);
                start.get_or_insert(offset);
            } else if start.is_none() && !line.trim().is_empty() {
                return Err(malformed(
                    line_idx + 1,
                    "sequence data before the first `>` header".to_string(),
                ));
            }
            offset += line.len();
        }
        let Some(start) = start else {
            return Ok(Self::default());
        };

        let mut records = Vec::with_capacity(header_lines.len());
        let reader = fasta::Reader::new(text[start..].as_bytes());
        for (record, &line_idx) in reader.records().zip(&header_lines) {
            let record = record.map_err(|e| malformed(line_idx + 1, e.to_string()))?;
            let header = match record.desc() {
                Some(desc) => format!("{} {desc}", record.id()),
                None => record.id().to_string(),
            };
            let header = header.trim();
            let label = if header.is_empty() {
                format!("seqnum{line_idx:09}")
            } else {
                header.to_string()
            };
            records.push(SequenceRecord {
                label,
                sequence: String::from_utf8_lossy(record.seq()).into_owned(),
            });
        }
        Self::from_records(records)
    }

    /// Fails on the first repeated identifier or empty sequence.
    pub fn from_records(records: Vec<SequenceRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.label.as_str()) {
                return Err(ExtractError::DuplicateIdentifier(record.label.clone()));
            }
            if record.sequence.trim().is_empty() {
                return Err(ExtractError::EmptySequence(record.label.clone()));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Groups sequence indices into batches whose padded token count stays
    /// within `toks_per_batch`. Lengths are token counts under `alphabet`.
    pub fn batch_indices(
        &self,
        alphabet: &Alphabet,
        toks_per_batch: usize,
        extra_toks_per_seq: usize,
    ) -> Result<Vec<Batch>> {
        let mut lengths = Vec::with_capacity(self.records.len());
        for record in &self.records {
            lengths.push(alphabet.token_count(&record.sequence)?);
        }
        Ok(plan_batches(&lengths, toks_per_batch, extra_toks_per_seq))
    }

    pub fn select(&self, batch: &Batch) -> Vec<&SequenceRecord> {
        batch.iter().filter_map(|&i| self.records.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferritin_test_data::TestFile;

    fn parse(text: &str) -> Result<SequenceDataset> {
        SequenceDataset::from_reader(text.as_bytes(), Path::new("test.fasta"))
    }

    #[test]
    fn test_multiline_records() {
        let ds = parse(">a desc\nMKT\nAYI\n\n>b\nGS\n").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].label, "a desc");
        assert_eq!(ds.records[0].sequence, "MKTAYI");
        assert_eq!(ds.records[1].sequence, "GS");
    }

    #[test]
    fn test_empty_header_gets_line_label() {
        let ds = parse("\n>a\nMK\n>\nGS\n").unwrap();
        assert_eq!(ds.records[0].label, "a");
        assert_eq!(ds.records[1].label, "seqnum000000003");
    }

    #[test]
    fn test_fixture_file() {
        let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
        let ds = SequenceDataset::from_file(fasta).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(
            ds.records[0].label,
            "sp|P69905|HBA_HUMAN Hemoglobin subunit alpha"
        );
        assert_eq!(ds.records[0].sequence.len(), 142);
        assert_eq!(ds.records[1].label, "short_peptide");
        assert_eq!(ds.records[2].label, "seqnum000000005");
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = parse(">a\nMK\n>a\nGS\n").unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateIdentifier(ref l) if l == "a"));
    }

    #[test]
    fn test_headerless_rejected() {
        let err = parse("\nMK\n>a\nGS\n").unwrap_err();
        assert!(matches!(err, ExtractError::Fasta { line: 2, .. }));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let err = parse(">empty\n>b\nMKT\n").unwrap_err();
        assert!(matches!(err, ExtractError::EmptySequence(ref l) if l == "empty"));
    }

    #[test]
    fn test_batch_cost_counts_tokens() -> Result<()> {
        let alphabet = Alphabet::esm2()?;
        // 3 tokens each once `<mask>` is one token and spaces are dropped
        let ds = parse(">a\nMK<mask>\n>b\nM K T\n>c\nMKT\n")?;
        let batches = ds.batch_indices(&alphabet, 12, 1)?;
        assert_eq!(batches, vec![vec![0, 1, 2]]);
        let batches = ds.batch_indices(&alphabet, 11, 1)?;
        assert_eq!(batches, vec![vec![0, 1], vec![2]]);
        Ok(())
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        let ds = parse("")?;
        assert!(ds.is_empty());
        assert!(ds.batch_indices(&Alphabet::esm2()?, 4096, 1)?.is_empty());
        Ok(())
    }
}
