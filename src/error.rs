use thiserror::Error;

/// Failures raised by a tabular store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table {0} is not available")]
    MissingTable(String),

    #[error("table {table} has no column named {column}")]
    UnknownColumn { table: String, column: String },

    #[error("store is unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored workbook could not be decoded: {0}")]
    Encoding(String),
}

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl LedgerError {
    pub fn asset_not_found(asset_id: &str) -> Self {
        LedgerError::NotFound(format!("Asset not found: {}", asset_id))
    }

    pub fn repair_not_found(repair_id: &str) -> Self {
        LedgerError::NotFound(format!("Repair not found: {}", repair_id))
    }

    /// Short machine-readable tag used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Validation(_) => "validation",
            LedgerError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
