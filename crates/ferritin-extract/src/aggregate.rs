//! Concatenates mean representations from a directory of result records into
//! one CSV table, one row per sequence.
use crate::error::{ExtractError, Result};
use crate::record::{ResultRecord, RECORD_EXTENSION};
use polars::prelude::*;
use std::path::{Path, PathBuf};

pub const LABEL_COLUMN: &str = "label";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOutcome {
    Written {
        path: PathBuf,
        rows: usize,
        columns: usize,
    },
    /// The directory held no records; nothing was written.
    NoData,
}

pub struct Aggregator {
    layer: usize,
}

impl Aggregator {
    /// `layer` picks which mean representation each record contributes.
    pub fn new(layer: usize) -> Self {
        Self { layer }
    }

    /// Record files directly inside `dir`, sorted by file name.
    pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ExtractError::io(format!("listing {}", dir.display()), e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ExtractError::io(format!("listing {}", dir.display()), e))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Builds the table, or `None` when there are no records.
    pub fn build_table(&self, dir: &Path) -> Result<Option<DataFrame>> {
        let files = Self::record_files(dir)?;
        if files.is_empty() {
            return Ok(None);
        }

        let mut labels = Vec::with_capacity(files.len());
        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(files.len());
        for file in &files {
            let record = ResultRecord::load(file)?;
            let vector = record
                .mean_representations
                .as_ref()
                .and_then(|layers| layers.get(&self.layer))
                .ok_or_else(|| ExtractError::MissingLayer {
                    label: record.label.clone(),
                    layer: self.layer,
                })?
                .flatten_all()?
                .to_vec1::<f32>()?;
            if let Some(first) = rows.first() {
                if first.len() != vector.len() {
                    return Err(ExtractError::DimensionMismatch {
                        label: record.label,
                        expected: first.len(),
                        found: vector.len(),
                    });
                }
            }
            labels.push(record.label);
            rows.push(vector);
        }

        let dim = rows[0].len();
        let mut columns: Vec<Column> = Vec::with_capacity(dim + 1);
        columns.push(Series::new(LABEL_COLUMN.into(), labels).into());
        for d in 0..dim {
            let values: Vec<f32> = rows.iter().map(|row| row[d]).collect();
            columns.push(Series::new(d.to_string().into(), values).into());
        }
        Ok(Some(DataFrame::new(columns)?))
    }

    pub fn write_csv(&self, dir: &Path, output_csv: &Path) -> Result<AggregateOutcome> {
        let Some(mut df) = self.build_table(dir)? else {
            tracing::warn!("No data to concatenate in {}", dir.display());
            return Ok(AggregateOutcome::NoData);
        };
        if let Some(parent) = output_csv.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ExtractError::io(format!("creating {}", parent.display()), e))?;
        }
        let mut file = std::fs::File::create(output_csv)
            .map_err(|e| ExtractError::io(format!("creating {}", output_csv.display()), e))?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;

        let (rows, width) = df.shape();
        tracing::info!("Shape of concatenated table: ({rows}, {})", width - 1);
        tracing::info!("Saved concatenated representations to {}", output_csv.display());
        Ok(AggregateOutcome::Written {
            path: output_csv.to_path_buf(),
            rows,
            columns: width - 1,
        })
    }
}

/// `<concat_dir>/<fasta stem>_<model name>.csv`
pub fn output_csv_path(concat_dir: &Path, fasta_file: &Path, model_name: &str) -> PathBuf {
    let stem = fasta_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    concat_dir.join(format!("{stem}_{model_name}.csv"))
}
