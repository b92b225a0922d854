//! Bitcoin protocol building blocks.
//!
//! Two independent pieces live in this crate:
//!
//! - [`wire`]: the P2P message codec. It finds message boundaries in a byte
//!   stream (magic scan), parses and validates the 24-byte header, verifies
//!   the payload checksum and dispatches the payload to a typed [`wire::Message`].
//! - [`hd`]: BIP32 hierarchical deterministic key derivation, including a
//!   memoizing [`hd::DeterministicHierarchy`] that hands out fresh child keys.
//!
//! Protocol references:
//! - https://developer.bitcoin.org/reference/p2p_networking.html
//! - https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki
pub mod hashes;
pub mod hd;
pub mod wire;
