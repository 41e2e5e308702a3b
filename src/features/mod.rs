//! Feature encoding for ledger entries
//!
//! One schema, one encoder. The schema is stored inside every trained model,
//! and the serving path rebuilds its encoder from that stored schema, so the
//! vectors seen at inference are produced exactly as they were at training.

pub mod category;
pub mod encoder;
pub mod temporal;

pub use category::{LabelSpace, DEFAULT_CATEGORIES, OTHERS_LABEL};
pub use encoder::EntryEncoder;
pub use temporal::{parse_timestamp, TemporalCodec};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerScanError, Result};

/// Canonical feature names, in vector order
pub const FEATURE_NAMES: &[&str] = &[
    "amount",
    "hour_of_day",
    "category_code",
    "type_code",
    "is_reversal",
];

/// Width of the canonical feature vector
pub const NUM_FEATURES: usize = 5;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Feature schema: field layout plus the category label space
///
/// Two schemas are compatible only if both the version and the label space
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Schema version tag
    pub version: u32,
    /// Category label space
    pub categories: LabelSpace,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            categories: LabelSpace::default(),
        }
    }
}

impl FeatureSchema {
    pub fn new(version: u32, categories: LabelSpace) -> Self {
        Self {
            version,
            categories,
        }
    }

    /// Number of features per vector
    pub fn width(&self) -> usize {
        NUM_FEATURES
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        FEATURE_NAMES
    }

    /// Identity tag stamped on every vector and matrix encoded under this schema
    pub fn tag(&self) -> SchemaTag {
        SchemaTag {
            version: self.version,
            labels: self.categories.fingerprint(),
        }
    }

    /// Check that `width` values tagged `tag` were encoded under this schema
    ///
    /// Both the version and the label space must match.
    pub fn check(&self, tag: SchemaTag, width: usize) -> Result<()> {
        let expected = self.tag();
        if tag != expected || width != self.width() {
            return Err(LedgerScanError::SchemaMismatch {
                expected_width: self.width(),
                expected_version: expected.version,
                expected_labels: expected.labels,
                got_width: width,
                got_version: tag.version,
                got_labels: tag.labels,
            });
        }
        Ok(())
    }
}

/// Schema identity: version plus the label space fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaTag {
    pub version: u32,
    /// [`LabelSpace::fingerprint`] of the category labels
    pub labels: u64,
}

/// Encoded feature vector tagged with the schema that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature values in [`FEATURE_NAMES`] order
    pub features: Vec<f64>,
    /// Schema that produced the values
    pub schema: SchemaTag,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, schema: SchemaTag) -> Self {
        Self { features, schema }
    }

    /// Get feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .and_then(|idx| self.features.get(idx).copied())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_match_width() {
        assert_eq!(FEATURE_NAMES.len(), NUM_FEATURES);
        assert_eq!(FeatureSchema::default().width(), NUM_FEATURES);
    }

    #[test]
    fn test_schema_check() {
        let schema = FeatureSchema::default();
        let tag = schema.tag();
        assert!(schema.check(tag, NUM_FEATURES).is_ok());

        let err = schema.check(tag, 13).unwrap_err();
        assert!(matches!(
            err,
            LedgerScanError::SchemaMismatch { expected_width: 5, got_width: 13, .. }
        ));
        let next = SchemaTag { version: SCHEMA_VERSION + 1, ..tag };
        assert!(schema.check(next, NUM_FEATURES).is_err());
    }

    #[test]
    fn test_schema_check_rejects_other_label_space() {
        let default = FeatureSchema::default();
        let custom = FeatureSchema::new(SCHEMA_VERSION, LabelSpace::new(["rent", "salary"]).unwrap());
        assert_eq!(default.tag().version, custom.tag().version);

        let err = custom.check(default.tag(), NUM_FEATURES).unwrap_err();
        assert!(matches!(
            err,
            LedgerScanError::SchemaMismatch { expected_version: 1, got_version: 1, .. }
        ));
        assert!(default.check(custom.tag(), NUM_FEATURES).is_err());
    }

    #[test]
    fn test_schema_equality_includes_labels() {
        let a = FeatureSchema::default();
        let b = FeatureSchema::new(SCHEMA_VERSION, LabelSpace::new(["rent"]).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_feature_vector_get() {
        let v = FeatureVector::new(vec![10.0, 2.5, 3.0, 1.0, 0.0], FeatureSchema::default().tag());
        assert_eq!(v.get("amount"), Some(10.0));
        assert_eq!(v.get("type_code"), Some(1.0));
        assert_eq!(v.get("missing"), None);
        assert_eq!(v.len(), 5);
    }
}
