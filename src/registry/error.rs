//! Registry error types
//!
//! Error types for subscription registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The subscription id is already in use in this session
    #[error("duplicate subscription id: {0}")]
    DuplicateId(u64),

    /// The track already has an active subscription in this session
    #[error("duplicate track name: {0}")]
    DuplicateName(String),
}
