//! Entry to feature vector encoding
//!
//! Shared by the training pipeline and the scoring engine.

use super::{FeatureSchema, FeatureVector, TemporalCodec, NUM_FEATURES};
use crate::entry::Entry;
use crate::error::Result;

/// Numeric code for debit entries
const DEBIT_CODE: f64 = 1.0;
/// Numeric code for credit and any unrecognized type
const CREDIT_CODE: f64 = 0.0;

/// Encodes entries into canonical feature vectors
///
/// A pure function of the entry and the schema: no clock, no global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryEncoder {
    schema: FeatureSchema,
    temporal: TemporalCodec,
}

impl Default for EntryEncoder {
    fn default() -> Self {
        Self::new(FeatureSchema::default())
    }
}

impl EntryEncoder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            temporal: TemporalCodec,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Encode one entry
    ///
    /// Layout: `[amount, hour_of_day, category_code, type_code, is_reversal]`.
    /// Fails only on a missing or unparseable timestamp.
    pub fn encode(&self, entry: &Entry) -> Result<FeatureVector> {
        let mut features = Vec::with_capacity(NUM_FEATURES);

        features.push(entry.amount);                                         // amount
        features.push(self.temporal.encode(entry.timestamp.as_deref())?);    // hour_of_day
        features.push(
            self.schema.categories.encode(entry.category.as_deref()) as f64, // category_code
        );
        features.push(type_code(entry.entry_type.as_deref()));               // type_code
        features.push(if entry.is_reversal.unwrap_or(false) { 1.0 } else { 0.0 }); // is_reversal

        Ok(FeatureVector::new(features, self.schema.tag()))
    }
}

/// `"debit"` maps to 1; credit, missing and unknown types map to 0
#[inline]
fn type_code(entry_type: Option<&str>) -> f64 {
    match entry_type {
        Some(t) if t.trim().eq_ignore_ascii_case("debit") => DEBIT_CODE,
        _ => CREDIT_CODE,
    }
}
