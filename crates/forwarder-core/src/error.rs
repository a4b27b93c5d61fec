//! Error taxonomy for the forwarder core.
//!
//! Errors fall into two kinds, and callers decide propagation from the kind
//! rather than from the variant:
//!
//! - **Fatal**: classification or configuration failures. These bubble up to
//!   the host runtime so its platform-level retry policy applies.
//! - **Suppressed**: anything that can hit a single document or a single
//!   bulk call. These are logged and turned into a non-throwing outcome at
//!   the invocation boundary so one bad record does not fail records that
//!   already succeeded.

/// Propagation class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Surface to the caller; the platform retry policy applies.
    Fatal,
    /// Log and convert to a descriptive non-throwing result.
    Suppressed,
}

/// Errors produced by the forwarder core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not supported trigger")]
    UnsupportedTrigger,

    #[error("invalid s3 uri provided: `{0}`")]
    InvalidConfigUri(String),

    #[error("no config yaml in message attributes")]
    MissingConfigPayload,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no input set for {0}")]
    MissingInput(String),

    #[error("no available output for {0} type")]
    MissingOutput(String),

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("elasticsearch index cannot be empty")]
    EmptyIndex,

    #[error("malformed document: {0}")]
    MalformedDocument(&'static str),

    #[error("bulk request failed: {0}")]
    BulkTransport(String),

    #[error("replay enqueue failed: {0}")]
    ReplayEnqueue(String),

    #[error("storage read failed: {0}")]
    Storage(String),
}

impl Error {
    /// Propagation kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedTrigger
            | Error::InvalidConfigUri(_)
            | Error::MissingConfigPayload
            | Error::InvalidConfig(_)
            | Error::MissingInput(_)
            | Error::MissingOutput(_)
            | Error::MissingEnv(_) => ErrorKind::Fatal,
            Error::EmptyIndex
            | Error::MalformedDocument(_)
            | Error::BulkTransport(_)
            | Error::ReplayEnqueue(_)
            | Error::Storage(_) => ErrorKind::Suppressed,
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}
