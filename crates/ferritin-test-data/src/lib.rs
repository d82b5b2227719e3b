//! ferretin-test-data
//!
//! A module to provide test files embedded in the crate for use in testing.
//! Example sequence files and tiny ONNX models are included in the crate distribution.
//!
//! The test files are represented as `TestFile` objects which package the raw binary data
//! and create temporary files for programs to operate on.
use std::fs;
use tempfile::{Builder, NamedTempFile};

#[derive(Debug)]
/// Test File
///
/// Example usage:
///
/// ```ignore
/// // returns (filepath, _tempfile_handle).
/// // _handle ensures the tempfile remains in scope
/// use ferritin_test_data::TestFile;
/// let (fasta_file, _temp) = TestFile::fasta_01().create_temp().unwrap();
/// ```
pub struct TestFile {
    filebinary: &'static [u8],
    suffix: &'static str,
}

impl TestFile {
    /// Three sequences: human hemoglobin alpha (142 aa), a 10 aa peptide,
    /// and a 20 aa sequence with an empty header line.
    pub fn fasta_01() -> Self {
        Self {
            filebinary: include_bytes!("../data/fasta/small.fasta"),
            suffix: "fasta",
        }
    }
    /// Repeats the `seq_a` identifier.
    pub fn fasta_duplicates() -> Self {
        Self {
            filebinary: include_bytes!("../data/fasta/duplicates.fasta"),
            suffix: "fasta",
        }
    }
    /// Sequence data before the first header.
    pub fn fasta_headerless() -> Self {
        Self {
            filebinary: include_bytes!("../data/fasta/headerless.fasta"),
            suffix: "fasta",
        }
    }

    /// ONNX model with 2 layers, hidden size 3, an `attention_mask` input, a
    /// `contacts` output and `num_layers` metadata.
    ///
    /// `hidden_states[l, b, t, d] = token * mask + 100 * l + 1000 * d`
    ///
    /// `contacts[b, i, j] = token[i + 1] + token[j + 1]` (masked tokens)
    pub fn onnx_tiny_esm() -> Self {
        Self {
            filebinary: include_bytes!("../data/onnx/tiny_esm.onnx"),
            suffix: "onnx",
        }
    }
    /// ONNX model with 3 layers and hidden size 2 whose depth is only given by
    /// the static `[4, batch, tokens, 2]` shape of `hidden_states`. No mask
    /// input and no contacts.
    pub fn onnx_tiny_esm_static() -> Self {
        Self {
            filebinary: include_bytes!("../data/onnx/tiny_esm_static.onnx"),
            suffix: "onnx",
        }
    }

    pub fn create_temp(&self) -> std::io::Result<(String, NamedTempFile)> {
        let temp = Builder::new()
            .suffix(&format!(".{}", self.suffix))
            .tempfile()?;

        fs::write(&temp, self.filebinary)?;
        let path = temp.path().to_string_lossy().into_owned();

        Ok((path, temp))
    }
}
