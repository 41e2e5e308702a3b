//! Category label space
//!
//! Maps free-text category labels onto a fixed, ordered set of indices with a
//! terminal "others" bucket. Unknown labels are expected input, not errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LedgerScanError, Result};

/// Name of the catch-all bucket, always the last index
pub const OTHERS_LABEL: &str = "others";

/// Canonical ledger categories (without the "others" bucket)
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "food",
    "transport",
    "housing",
    "entertainment",
    "shopping",
    "health",
    "utilities",
    "travel",
    "education",
    "investment",
];

/// Ordered category labels with a terminal "others" bucket
///
/// Serialized as the plain label list; the lookup table is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSpace {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    /// Digest of the ordered labels
    fingerprint: u64,
}

impl LabelSpace {
    /// Build a label space from canonical labels
    ///
    /// Labels are trimmed and lower-cased. The "others" bucket is appended
    /// when missing; if present it must be the last label.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for label in labels {
            let label = normalize(label.as_ref());
            if label.is_empty() {
                return Err(LedgerScanError::InvalidLabelSpace(
                    "empty category label".to_string(),
                ));
            }
            if normalized.contains(&label) {
                return Err(LedgerScanError::InvalidLabelSpace(format!(
                    "duplicate category label {:?}",
                    label
                )));
            }
            normalized.push(label);
        }

        match normalized.iter().position(|l| l == OTHERS_LABEL) {
            None => normalized.push(OTHERS_LABEL.to_string()),
            Some(pos) if pos + 1 == normalized.len() => {}
            Some(_) => {
                return Err(LedgerScanError::InvalidLabelSpace(format!(
                    "{:?} must be the last label",
                    OTHERS_LABEL
                )));
            }
        }

        Ok(Self::from_normalized(normalized))
    }

    fn from_normalized(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        let fingerprint = fingerprint_of(&labels);
        Self {
            labels,
            index,
            fingerprint,
        }
    }

    /// Encode a category label to its index
    ///
    /// Total: missing, empty and unknown labels all map to [`Self::others_index`].
    pub fn encode(&self, label: Option<&str>) -> usize {
        label
            .map(normalize)
            .and_then(|l| self.index.get(&l).copied())
            .unwrap_or_else(|| self.others_index())
    }

    /// Index of the "others" bucket
    pub fn others_index(&self) -> usize {
        self.labels.len() - 1
    }

    /// Number of labels including "others"
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label at an index
    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Stable digest of the ordered labels
    ///
    /// Equal label spaces have equal fingerprints across processes and builds.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl Default for LabelSpace {
    fn default() -> Self {
        let labels = DEFAULT_CATEGORIES
            .iter()
            .chain(std::iter::once(&OTHERS_LABEL))
            .map(|s| s.to_string())
            .collect();
        Self::from_normalized(labels)
    }
}

impl PartialEq for LabelSpace {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for LabelSpace {}

impl TryFrom<Vec<String>> for LabelSpace {
    type Error = LedgerScanError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LabelSpace> for Vec<String> {
    fn from(space: LabelSpace) -> Self {
        space.labels
    }
}

#[inline]
fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// First 8 bytes of SHA-256 over the length-prefixed labels
fn fingerprint_of(labels: &[String]) -> u64 {
    let mut hasher = Sha256::new();
    for label in labels {
        hasher.update((label.len() as u64).to_le_bytes());
        hasher.update(label.as_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label_space() {
        let space = LabelSpace::default();
        assert_eq!(space.len(), 11);
        assert_eq!(space.others_index(), 10);
        assert_eq!(space.label(0), Some("food"));
        assert_eq!(space.label(10), Some(OTHERS_LABEL));
        assert_eq!(space, LabelSpace::new(DEFAULT_CATEGORIES).unwrap());
    }

    #[test]
    fn test_encode_known_labels() {
        let space = LabelSpace::default();
        assert_eq!(space.encode(Some("food")), 0);
        assert_eq!(space.encode(Some("investment")), 9);
        assert_eq!(space.encode(Some("others")), 10);
    }

    #[test]
    fn test_encode_is_case_insensitive_and_trimmed() {
        let space = LabelSpace::default();
        assert_eq!(space.encode(Some("  Travel ")), 7);
        assert_eq!(space.encode(Some("HEALTH")), 5);
    }

    #[test]
    fn test_encode_falls_back_to_others() {
        let space = LabelSpace::default();
        let others = space.others_index();
        assert_eq!(space.encode(Some("crypto_trading")), others);
        assert_eq!(space.encode(Some("salary")), others);
        assert_eq!(space.encode(Some("")), others);
        assert_eq!(space.encode(None), others);
    }

    #[test]
    fn test_new_appends_others() {
        let space = LabelSpace::new(["Rent", "fees"]).unwrap();
        assert_eq!(space.labels(), &["rent", "fees", "others"]);

        let explicit = LabelSpace::new(["rent", "others"]).unwrap();
        assert_eq!(explicit.len(), 2);
    }

    #[test]
    fn test_new_rejects_bad_labels() {
        assert!(LabelSpace::new(["food", "FOOD"]).is_err());
        assert!(LabelSpace::new(["others", "food"]).is_err());
        assert!(LabelSpace::new(["food", " "]).is_err());
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let space = LabelSpace::new(["rent", "fees"]).unwrap();
        let json = serde_json::to_string(&space).unwrap();
        assert_eq!(json, r#"["rent","fees","others"]"#);

        let loaded: LabelSpace = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.encode(Some("fees")), 1);
        assert!(serde_json::from_str::<LabelSpace>(r#"["others","rent"]"#).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_labels() {
        let default = LabelSpace::default();
        assert_eq!(default.fingerprint(), LabelSpace::new(DEFAULT_CATEGORIES).unwrap().fingerprint());

        let custom = LabelSpace::new(["rent", "salary"]).unwrap();
        assert_ne!(default.fingerprint(), custom.fingerprint());

        // Order is part of the identity
        let swapped = LabelSpace::new(["salary", "rent"]).unwrap();
        assert_ne!(custom.fingerprint(), swapped.fingerprint());

        let reloaded: LabelSpace = serde_json::from_str(&serde_json::to_string(&custom).unwrap()).unwrap();
        assert_eq!(reloaded.fingerprint(), custom.fingerprint());
    }
}
