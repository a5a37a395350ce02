use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures of feature store operations.
///
/// A missing record is not an error; lookups return `Option` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("feature {id} already exists in organization {organization}")]
    Conflict { id: String, organization: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to encode {field}: {source}")]
    Encode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Whether the failure came from the storage backend and the call may be retried.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::LockPoisoned)
    }
}
