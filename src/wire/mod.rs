//! Bitcoin P2P wire protocol codec.
//!
//! This module frames and unframes Bitcoin P2P messages on any byte stream.
//!
//! It implements:
//! - Scanning for the network magic past garbage bytes
//! - Parsing of the 24-byte Bitcoin message header
//! - Checksum verification and dispatch to typed [`Message`] variants
//! - Encoding of typed messages back into frames
//!
//! Sockets and buffering belong to the caller: every operation works on
//! [`std::io::Read`] / [`std::io::Write`].
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html
pub mod codec;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod header;
pub mod message;
pub mod payload;
pub mod types;

pub use codec::{RawMessage, WireCodec, verify_checksum};
pub use constants::{MAX_MESSAGE_SIZE, Network, PROTOCOL_VERSION};
pub use decode::DecodeContext;
pub use error::{PayloadError, WireError};
pub use header::PacketHeader;
pub use message::{Command, Message};
