use thiserror::Error;

pub type HoardResult<T> = Result<T, HoardError>;

#[derive(Debug, Error)]
pub enum HoardError {
    #[error("not found: {0}")]
    NotFound(String),

    /// AEAD verification failed. Never says whether the key, the salt, or the
    /// ciphertext was at fault.
    #[error("authentication failed: wrong key, salt, or corrupted data")]
    AuthenticationFailure,

    #[error("invalid grant spec: {0}")]
    InvalidSpec(String),

    #[error("secret not found: {0}")]
    SecretNotFound(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unsupported grant version {0}")]
    UnsupportedVersion(i32),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HoardError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        HoardError::ProtocolViolation(msg.into())
    }

    pub fn serialization(err: impl std::fmt::Display) -> Self {
        HoardError::Serialization(err.to_string())
    }
}

/// The stream adapters carry `HoardError`s through `std::io` traits; unwrap
/// them back out so callers see the original variant.
impl From<std::io::Error> for HoardError {
    fn from(err: std::io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<HoardError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(hoard) = inner.downcast::<HoardError>() {
                    return *hoard;
                }
            }
            return HoardError::Storage("unrecoverable wrapped error".into());
        }
        HoardError::Io(err)
    }
}

impl From<HoardError> for std::io::Error {
    fn from(err: HoardError) -> Self {
        match err {
            HoardError::Io(inner) => inner,
            other => std::io::Error::other(other),
        }
    }
}

impl From<std::convert::Infallible> for HoardError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl From<serde_json::Error> for HoardError {
    fn from(err: serde_json::Error) -> Self {
        HoardError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_roundtrip_preserves_variant() {
        let io: std::io::Error = HoardError::protocol("second header").into();
        match HoardError::from(io) {
            HoardError::ProtocolViolation(msg) => assert_eq!(msg, "second header"),
            other => panic!("expected ProtocolViolation, got: {other:?}"),
        }
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(HoardError::from(io), HoardError::Io(_)));
    }

    #[test]
    fn test_auth_failure_message_is_generic() {
        let msg = HoardError::AuthenticationFailure.to_string();
        assert!(msg.contains("wrong key, salt, or corrupted data"));
    }
}
