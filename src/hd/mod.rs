//! BIP32 hierarchical deterministic keys over secp256k1.
//!
//! [`derive_master_key`] turns a seed into the root of a key tree,
//! [`derive_child_key`] walks one step down it, and
//! [`DeterministicHierarchy`] caches a tree and hands out fresh child
//! indices.
pub mod child_number;
pub mod derive;
pub mod error;
pub mod hierarchy;
pub mod key;
pub mod path;

pub use child_number::ChildNumber;
pub use derive::{
    MAX_CHILD_DERIVATION_ATTEMPTS, derive_child_key, derive_master_key, derive_path,
    derive_this_or_next_child_key,
};
pub use error::HdError;
pub use hierarchy::DeterministicHierarchy;
pub use key::ExtendedKey;
pub use path::DerivationPath;
