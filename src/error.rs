//! Error types for session-vault.

use thiserror::Error;

/// Main error type for session-vault operations.
#[derive(Error, Debug)]
pub enum SessionVaultError {
    /// No bag with the given name has been registered on the store.
    #[error("bag not registered: {0}")]
    BagNotRegistered(String),

    /// The handler reported failure while persisting the session payload.
    #[error("failed to write session: {0}")]
    WriteFailed(String),

    /// The configured driver needs a collaborator that was never injected.
    #[error("missing collaborator for {driver} driver: {collaborator}")]
    MissingCollaborator {
        driver: &'static str,
        collaborator: &'static str,
    },

    /// Attribute payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for session-vault operations.
pub type Result<T> = std::result::Result<T, SessionVaultError>;
