//! Ledger entry records
//!
//! The wire shape of a single transaction as produced by the ledger backend
//! and the synthetic data generator.

use serde::{Deserialize, Serialize};

/// A single ledger transaction
///
/// `user_id` is carried for reference only and never reaches the feature
/// vector, so models cannot key on individual users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Opaque owner identifier (not a feature)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Transaction amount
    pub amount: f64,
    /// ISO-8601 date-time
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Free-text category label
    #[serde(default)]
    pub category: Option<String>,
    /// "debit" or "credit"
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    /// Reversal flag (absent means false)
    #[serde(default)]
    pub is_reversal: Option<bool>,
}

impl Entry {
    /// Create an entry with the required fields
    pub fn new(amount: f64, timestamp: impl Into<String>) -> Self {
        Self {
            user_id: None,
            amount,
            timestamp: Some(timestamp.into()),
            category: None,
            entry_type: None,
            is_reversal: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    pub fn with_reversal(mut self, is_reversal: bool) -> Self {
        self.is_reversal = Some(is_reversal);
        self
    }

    /// Parse one entry or an array of entries from JSON text
    pub fn parse_many(json: &str) -> serde_json::Result<Vec<Entry>> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        match value {
            serde_json::Value::Array(_) => serde_json::from_value(value),
            other => Ok(vec![serde_json::from_value(other)?]),
        }
    }
}
