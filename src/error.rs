use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerScanError {
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("cannot build a dataset from zero entries")]
    EmptyDataset,

    #[error("insufficient training data: {rows} rows, need at least {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("schema mismatch: model expects {expected_width} features (schema v{expected_version}, labels {expected_labels:016x}), got {got_width} (schema v{got_version}, labels {got_labels:016x})")]
    SchemaMismatch {
        expected_width: usize,
        expected_version: u32,
        expected_labels: u64,
        got_width: usize,
        got_version: u32,
        got_labels: u64,
    },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("invalid model id: {0:?}")]
    InvalidModelId(String),

    #[error("invalid label space: {0}")]
    InvalidLabelSpace(String),

    #[error("config error: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("artifact decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerScanError {
    /// Whether the failure is confined to one request rather than the process
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            LedgerScanError::InvalidTimestamp(_) | LedgerScanError::SchemaMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerScanError>;
