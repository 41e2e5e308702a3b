//! Training matrix construction
//!
//! Encodes a corpus of entries row by row into a dense matrix, in input order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::Entry;
use crate::error::{LedgerScanError, Result};
use crate::features::{EntryEncoder, FeatureSchema, SchemaTag};

/// Dense row-major matrix of encoded entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMatrix {
    /// Row-major values, `n_rows * width` long
    data: Vec<f64>,
    n_rows: usize,
    width: usize,
    /// Schema the rows were encoded with
    schema: SchemaTag,
}

impl TrainingMatrix {
    /// Build from pre-encoded rows, checking each row against the schema width
    pub fn from_rows(rows: Vec<Vec<f64>>, schema: &FeatureSchema) -> Result<Self> {
        if rows.is_empty() {
            return Err(LedgerScanError::EmptyDataset);
        }

        let width = schema.width();
        let tag = schema.tag();
        let mut data = Vec::with_capacity(rows.len() * width);
        for row in &rows {
            schema.check(tag, row.len())?;
            data.extend_from_slice(row);
        }

        Ok(Self {
            data,
            n_rows: rows.len(),
            width,
            schema: tag,
        })
    }

    /// Row `idx` as a slice
    #[inline]
    pub fn row(&self, idx: usize) -> &[f64] {
        let start = idx * self.width;
        &self.data[start..start + self.width]
    }

    /// Iterate over rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.width)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Schema the rows were encoded with
    pub fn schema(&self) -> SchemaTag {
        self.schema
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.width)
    }
}

/// Applies the entry encoder across a corpus
pub struct DatasetBuilder<'a> {
    encoder: &'a EntryEncoder,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(encoder: &'a EntryEncoder) -> Self {
        Self { encoder }
    }

    /// Encode `entries` into an `(N, D)` matrix, preserving order
    ///
    /// The first entry that fails to encode aborts the build.
    pub fn build(&self, entries: &[Entry]) -> Result<TrainingMatrix> {
        if entries.is_empty() {
            return Err(LedgerScanError::EmptyDataset);
        }

        let schema = self.encoder.schema();
        let width = schema.width();
        let mut data = Vec::with_capacity(entries.len() * width);

        for (row, entry) in entries.iter().enumerate() {
            let vector = self.encoder.encode(entry).inspect_err(|e| {
                debug!("Entry {} failed to encode: {}", row, e);
            })?;
            data.extend_from_slice(vector.as_slice());
        }

        debug!("Encoded {} entries into {}-wide matrix", entries.len(), width);

        Ok(TrainingMatrix {
            data,
            n_rows: entries.len(),
            width,
            schema: schema.tag(),
        })
    }
}
