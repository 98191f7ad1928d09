//! Error types shared by the ledger, wire codec and both sessions.

use thiserror::Error;

/// Errors raised while loading ledgers, speaking the wire protocol or
/// writing patched files.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A referenced path, ledger, or config file is missing on disk.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed line, bad version text, bad size text, wrong field count.
    #[error("format error: {0}")]
    Format(String),

    /// The peer broke the protocol (closed before the sentinel, missing size line, short payload).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PatchError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        PatchError::Format(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        PatchError::ProtocolViolation(msg.into())
    }

    /// True when the error came from the peer rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(self, PatchError::ProtocolViolation(_))
    }
}

/// Result type for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: PatchError = io.into();
        assert!(matches!(err, PatchError::Io(_)));
        assert!(!err.is_remote());
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(
            PatchError::NotFound("versions.txt".into()).to_string(),
            "not found: versions.txt"
        );
        assert!(PatchError::protocol("eof").is_remote());
        assert!(PatchError::format("bad").to_string().starts_with("format error"));
    }
}
