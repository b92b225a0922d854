use thiserror::Error;

use crate::hd::path::DerivationPath;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HdError {
    #[error("child index {0} does not fit in 31 bits")]
    InvalidChildIndex(u32),

    /// Short seeds can be brute forced.
    #[error("seed of {0} bytes is too short, need more than 8")]
    SeedTooShort(usize),

    /// I_L was not a valid scalar, the child scalar was zero or the child
    /// point was the point at infinity. Retry with the next index.
    #[error("derivation produced an invalid key")]
    InvalidDerivation,

    #[error("can't use private derivation with public keys only")]
    PrivateDerivationFromPublic,

    #[error("maximum child derivation attempts reached, this is probably an indication of a bug")]
    MaxAttemptsExceeded,

    #[error("could not find key with path {0}")]
    KeyNotFound(DerivationPath),

    #[error("key has no private half")]
    MissingPrivateKey,

    #[error("key is already at the maximum depth of 255")]
    MaxDepthExceeded,

    #[error("can't derive the master key: path is empty")]
    NoParent,

    #[error("invalid derivation path {0:?}")]
    InvalidPath(String),

    #[error("invalid base58 key: {0}")]
    Base58(String),

    #[error("invalid key bytes: {0}")]
    InvalidKeyBytes(&'static str),

    #[error("invalid serialized extended key: {0}")]
    InvalidSerializedKey(&'static str),
}

impl From<bs58::decode::Error> for HdError {
    fn from(err: bs58::decode::Error) -> Self {
        HdError::Base58(err.to_string())
    }
}
