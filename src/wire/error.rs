use std::io;

use thiserror::Error;

/// Failures while framing, verifying or dispatching a P2P message.
///
/// Framing variants ([`WireError::InsufficientData`], [`WireError::MessageTooLarge`],
/// [`WireError::ChecksumMismatch`]) mean the peer is speaking garbage at the
/// transport level. [`WireError::Deserialization`] means the frame was fine but
/// the payload of a known command did not parse.
#[derive(Debug, Error)]
pub enum WireError {
    /// The stream ended before a complete magic, header or payload was read.
    /// The caller should buffer more bytes and retry.
    #[error("insufficient data: stream ended mid-message")]
    InsufficientData,

    #[error("message size too large: {size} bytes")]
    MessageTooLarge { size: u32 },

    #[error("checksum failed to verify, actual {actual} vs {expected}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("command {0:?} does not fit in the 12-byte command field")]
    CommandTooLong(String),

    #[error("command field is not ASCII")]
    InvalidCommand,

    #[error("error deserializing '{command}' message {payload_hex}: {source}")]
    Deserialization {
        command: String,
        payload_hex: String,
        #[source]
        source: PayloadError,
    },

    /// A message that would not decode back to itself at the codec's
    /// protocol version; nothing was written.
    #[error("cannot serialize '{command}' message: {source}")]
    Serialization {
        command: String,
        #[source]
        source: PayloadError,
    },

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            WireError::InsufficientData
        } else {
            WireError::Io(err)
        }
    }
}

/// Failures inside a per-command payload decoder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unexpected end of payload while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("non-canonical CompactSize encoding")]
    NonCanonicalCompactSize,

    #[error("{context}: {count} entries exceeds the limit of {max}")]
    TooManyEntries {
        context: &'static str,
        count: u64,
        max: u64,
    },

    #[error("{context}: {remaining} unexpected trailing bytes")]
    TrailingBytes {
        context: &'static str,
        remaining: usize,
    },

    #[error("invalid payload: {0}")]
    Invalid(&'static str),
}
