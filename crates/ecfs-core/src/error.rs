use thiserror::Error;

pub type EcfsResult<T> = Result<T, EcfsError>;

#[derive(Debug, Error)]
pub enum EcfsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("name too long: {len} bytes (limit {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("encryption key unavailable for inode {ino}")]
    KeyUnavailable { ino: u64 },

    #[error("filename {op} failed for inode {ino}: {reason}")]
    CipherFailure {
        op: &'static str,
        ino: u64,
        reason: String,
    },

    #[error("corrupt encryption policy on inode {ino}: {reason}")]
    CorruptPolicy { ino: u64, reason: String },

    #[error("corrupt filename: {0}")]
    CorruptName(String),

    #[error("no such directory entry")]
    NameNotFound,

    #[error("inode {ino} is not encrypted")]
    NotEncrypted { ino: u64 },

    #[error("unsupported encryption policy: {0}")]
    Unsupported(String),

    #[error("inode {ino} already has an encryption policy that cannot be read")]
    AlreadyEncrypted { ino: u64 },

    #[error("inode {ino} already uses a different encryption policy")]
    PolicyMismatch { ino: u64 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("inode {ino} is not a directory")]
    NotADirectory { ino: u64 },

    #[error("directory {ino} is not empty")]
    DirectoryNotEmpty { ino: u64 },

    #[error("inode {ino} has been deleted")]
    ObjectDeleted { ino: u64 },

    #[error("value too large: {needed} bytes, buffer holds {capacity}")]
    Overflow { needed: usize, capacity: usize },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of [`EcfsError`] for callers that map errors onto
/// their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    ResourceExhausted,
    LengthLimit,
    KeyUnavailable,
    /// Cipher, storage and host I/O failures.
    Io,
    Corrupt,
    PolicyConflict,
    PermissionDenied,
    /// The object is in the wrong state (type, emptiness, liveness).
    ObjectState,
    NotFound,
}

impl EcfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EcfsError::InvalidInput(_) | EcfsError::Unsupported(_) | EcfsError::Config(_) => {
                ErrorKind::InvalidInput
            }
            EcfsError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            EcfsError::NameTooLong { .. }
            | EcfsError::BufferTooSmall { .. }
            | EcfsError::Overflow { .. } => ErrorKind::LengthLimit,
            EcfsError::KeyUnavailable { .. } => ErrorKind::KeyUnavailable,
            EcfsError::CipherFailure { .. }
            | EcfsError::Storage(_)
            | EcfsError::Io(_)
            | EcfsError::Other(_) => ErrorKind::Io,
            EcfsError::CorruptPolicy { .. } | EcfsError::CorruptName(_) => ErrorKind::Corrupt,
            EcfsError::AlreadyEncrypted { .. } | EcfsError::PolicyMismatch { .. } => {
                ErrorKind::PolicyConflict
            }
            EcfsError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            EcfsError::NotADirectory { .. }
            | EcfsError::DirectoryNotEmpty { .. }
            | EcfsError::ObjectDeleted { .. } => ErrorKind::ObjectState,
            EcfsError::NameNotFound | EcfsError::NotEncrypted { .. } => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_failure_is_io_class() {
        let err = EcfsError::CipherFailure {
            op: "encryption",
            ino: 12,
            reason: "bad key".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(
            err.to_string(),
            "filename encryption failed for inode 12: bad key"
        );
    }

    #[test]
    fn policy_conflicts_share_a_kind() {
        assert_eq!(
            EcfsError::AlreadyEncrypted { ino: 1 }.kind(),
            ErrorKind::PolicyConflict
        );
        assert_eq!(
            EcfsError::PolicyMismatch { ino: 1 }.kind(),
            ErrorKind::PolicyConflict
        );
    }

    #[test]
    fn anyhow_errors_convert() {
        let err: EcfsError = anyhow::anyhow!("disk vanished").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "disk vanished");
    }
}
