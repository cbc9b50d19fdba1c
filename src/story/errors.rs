use thiserror::Error;

/// Errors that can arise while interacting with the story store and engines.
#[derive(Debug, Error)]
pub enum StoryError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON payload errors (seed files, event batches).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when creating a record whose identifier is already taken.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Missing required identifier or field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Internal error (unexpected conditions inside the store)
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoryError {
    /// True for failures of the persistence layer itself rather than of the
    /// caller's request. The precheck collapses only these into a generic verdict.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            StoryError::Sled(_)
                | StoryError::Bincode(_)
                | StoryError::Io(_)
                | StoryError::SchemaMismatch { .. }
                | StoryError::Internal(_)
        )
    }
}
