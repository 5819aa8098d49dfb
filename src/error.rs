//! Error types for vault operations.
//!
//! Every error is detected and returned synchronously at the point of the
//! violated precondition. No operation retries internally and no operation
//! leaves a vault guard held on an error path.

use crate::guard::GuardError;

/// Errors from vault lifecycle, data channel and control operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VaultError {
    /// Requester is not the vault's owner, or the vault has no owner yet
    #[error("Requester is not the vault owner")]
    PermissionDenied,

    /// Operation requires an Active vault
    #[error("Vault was not yet created")]
    NotActive,

    /// Create on a vault that is already Active
    #[error("Vault was already created")]
    AlreadyActive,

    /// Requested capacity outside `[1, max_capacity]`
    #[error("Vault capacity {0} is invalid")]
    InvalidSize(u64),

    /// Vault index beyond the pool, or seek target outside `[0, capacity)`
    #[error("Vault index or offset out of range")]
    OutOfRange,

    /// A data or transient buffer could not be allocated
    #[error("Could not allocate vault memory")]
    AllocationFailed,

    /// Guard acquisition was cancelled; no state was changed, caller may retry
    #[error("Operation interrupted, retry")]
    Interrupted,

    /// Control message could not be decoded into the expected fixed layout
    #[error("Malformed control request")]
    MalformedRequest,
}

impl From<GuardError> for VaultError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Interrupted => VaultError::Interrupted,
        }
    }
}

/// Result alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;
