use thiserror::Error;

/// Reasons a decode of a RISP record, value, or condition can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// A command id appeared where the decoder needed one of a specific set of shapes.
    #[error("unexpected command id {0} while decoding {1}")]
    UnexpectedCommand(u8, &'static str),

    /// A top-level or nested record was cut short by the end of the buffer.
    #[error("truncated record while decoding {0}")]
    Truncated(&'static str),

    /// A scalar sub-record (e.g. `USER_ID`) was set twice within the same container.
    #[error("duplicate scalar {0} in reply")]
    DuplicateScalar(&'static str),

    /// A `VALUE` record did not contain exactly one of INTEGER, STRING, AUTO.
    #[error("unexpected value shape")]
    UnexpectedValue,

    /// A condition record was missing a required child or had both of a mutually
    /// exclusive pair (e.g. both `NAME_ID` and `NAME`).
    #[error("malformed condition: {0}")]
    MalformedCondition(&'static str),

    /// `sort_by_key` was asked to compare two attribute values of incompatible types.
    #[error("cannot compare sort key values of mismatched types")]
    MixedSortTypes,
}

/// Reasons an encode of a RISP record can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeError {
    /// The payload length does not fit the command id's width class.
    #[error("payload of length {len} does not fit command {cmd}'s width class")]
    LengthOverflow { cmd: u8, len: usize },

    /// A condition tree was missing a required child.
    #[error("malformed condition: {0}")]
    MalformedCondition(&'static str),
}

/// Errors that can occur while using a [`crate::Session`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StashError {
    /// Error occurred in communication with the server.
    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Wire-level decoding failed; the connection was closed and rotated.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Wire-level encoding of an outgoing request failed.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The active connection is not usable; the call was not sent or no full
    /// reply could be read.
    #[error("not connected")]
    NotConnected,

    /// Erroneous connection parameters, e.g. a malformed connection string.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller contract violation, detected before any I/O was attempted.
    #[error("wrong usage: {0}")]
    Usage(&'static str),

    /// The server understood the request and answered with `FAILED`.
    ///
    /// Carried as its own variant rather than folded into `Config` so
    /// callers can match on [`crate::protocol::result_code::ResultCode`]
    /// directly (e.g. to retry on `NotConnected` but not on `AuthFailed`).
    #[error("server reported failure: {0:?}")]
    ServerFailure(crate::protocol::result_code::ResultCode),
}

/// Abbreviation of `Result<T, StashError>`.
pub type StashResult<T> = std::result::Result<T, StashError>;
