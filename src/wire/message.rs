use std::fmt::{self, Display, Formatter};

use crate::wire::constants::{BIP31_VERSION, COMMAND_LEN};
use crate::wire::decode::{
    self, Decode, DecodeContext, MAX_ADDR_ENTRIES, MAX_HEADERS, MAX_INV_ENTRIES,
    MAX_LOCATOR_HASHES, PayloadReader, decode_exact, expect_empty,
};
use crate::wire::encode::{self as enc, Encode};
use crate::wire::error::PayloadError;
use crate::wire::types::{
    AddrEntry, AddrV2Entry, Block, BlockHeader, BlockLocator, BloomFilter, InventoryItem,
    MerkleBlock, RejectMessage, Transaction, VersionMessage,
};

/// Commands this crate knows how to decode.
///
/// See https://developer.bitcoin.org/reference/p2p_networking.html for the
/// payload of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Control
    Version,
    Verack,
    Addr,
    AddrV2,
    SendAddrV2,
    GetAddr,
    Ping,
    Pong,
    SendHeaders,
    FeeFilter,
    Reject,
    // Data
    Inv,
    GetData,
    NotFound,
    GetBlocks,
    GetHeaders,
    Headers,
    Block,
    Tx,
    Mempool,
    MerkleBlock,
    // Bloom filter
    FilterLoad,
}

impl Command {
    pub const ALL: [Command; 22] = [
        Command::Version,
        Command::Verack,
        Command::Addr,
        Command::AddrV2,
        Command::SendAddrV2,
        Command::GetAddr,
        Command::Ping,
        Command::Pong,
        Command::SendHeaders,
        Command::FeeFilter,
        Command::Reject,
        Command::Inv,
        Command::GetData,
        Command::NotFound,
        Command::GetBlocks,
        Command::GetHeaders,
        Command::Headers,
        Command::Block,
        Command::Tx,
        Command::Mempool,
        Command::MerkleBlock,
        Command::FilterLoad,
    ];

    /// Maps a command string from a header to a known command.
    pub fn parse(name: &str) -> Option<Self> {
        let command = match name {
            "version" => Command::Version,
            "verack" => Command::Verack,
            "addr" => Command::Addr,
            "addrv2" => Command::AddrV2,
            "sendaddrv2" => Command::SendAddrV2,
            "getaddr" => Command::GetAddr,
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "sendheaders" => Command::SendHeaders,
            "feefilter" => Command::FeeFilter,
            "reject" => Command::Reject,
            "inv" => Command::Inv,
            "getdata" => Command::GetData,
            "notfound" => Command::NotFound,
            "getblocks" => Command::GetBlocks,
            "getheaders" => Command::GetHeaders,
            "headers" => Command::Headers,
            "block" => Command::Block,
            "tx" => Command::Tx,
            "mempool" => Command::Mempool,
            "merkleblock" => Command::MerkleBlock,
            "filterload" => Command::FilterLoad,
            _ => return None,
        };
        Some(command)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Verack => "verack",
            Command::Addr => "addr",
            Command::AddrV2 => "addrv2",
            Command::SendAddrV2 => "sendaddrv2",
            Command::GetAddr => "getaddr",
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::SendHeaders => "sendheaders",
            Command::FeeFilter => "feefilter",
            Command::Reject => "reject",
            Command::Inv => "inv",
            Command::GetData => "getdata",
            Command::NotFound => "notfound",
            Command::GetBlocks => "getblocks",
            Command::GetHeaders => "getheaders",
            Command::Headers => "headers",
            Command::Block => "block",
            Command::Tx => "tx",
            Command::Mempool => "mempool",
            Command::MerkleBlock => "merkleblock",
            Command::FilterLoad => "filterload",
        }
    }

    /// Returns the 12-byte command field as defined by the Bitcoin P2P protocol.
    ///
    /// The command string is ASCII and padded with zero bytes.
    pub fn as_bytes(&self) -> [u8; COMMAND_LEN] {
        let name = self.as_str().as_bytes();
        let mut padded = [0u8; COMMAND_LEN];
        padded[..name.len()].copy_from_slice(name);
        padded
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a decoded Bitcoin P2P message.
///
/// Each variant corresponds to a known Bitcoin protocol command.
/// Commands outside that set land in [`Message::Unknown`] with their raw
/// payload, so a peer speaking a newer protocol never breaks decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionMessage),
    Verack,
    Addr(Vec<AddrEntry>),
    AddrV2(Vec<AddrV2Entry>),
    Inv(Vec<InventoryItem>),
    GetData(Vec<InventoryItem>),
    NotFound(Vec<InventoryItem>),
    GetBlocks(BlockLocator),
    GetHeaders(BlockLocator),
    Headers(Vec<BlockHeader>),
    Block(Block),
    Tx(Transaction),
    /// `None` only for pre-BIP31 peers that send an empty ping.
    Ping(Option<u64>),
    Pong(u64),
    GetAddr,
    SendAddrV2,
    FilterLoad(BloomFilter),
    MerkleBlock(MerkleBlock),
    Mempool,
    Reject(RejectMessage),
    SendHeaders,
    /// Minimum fee rate in satoshis per kilo-virtual-byte.
    FeeFilter(i64),

    Unknown { command: String, payload: Vec<u8> },
}

impl Message {
    /// Dispatches `payload` to the decoder for `command`.
    ///
    /// Unknown commands are not an error. Failures from the per-command
    /// decoders are returned as-is; the codec wraps them with the command
    /// and a hex dump.
    pub fn decode(
        command: &str,
        payload: &[u8],
        ctx: &DecodeContext,
    ) -> Result<Message, PayloadError> {
        let Some(known) = Command::parse(command) else {
            return Ok(Message::Unknown {
                command: command.to_owned(),
                payload: payload.to_vec(),
            });
        };

        let message = match known {
            Command::Version => Message::Version(decode_exact(payload, ctx, "version")?),
            Command::Verack => {
                expect_empty(payload, "verack")?;
                Message::Verack
            }
            Command::Addr => Message::Addr(decode_exact(payload, ctx, "addr")?),
            Command::AddrV2 => Message::AddrV2(decode_exact(payload, ctx, "addrv2")?),
            Command::Inv => Message::Inv(decode_exact(payload, ctx, "inv")?),
            Command::GetData => Message::GetData(decode_exact(payload, ctx, "getdata")?),
            Command::NotFound => Message::NotFound(decode_exact(payload, ctx, "notfound")?),
            Command::GetBlocks => Message::GetBlocks(decode_exact(payload, ctx, "getblocks")?),
            Command::GetHeaders => Message::GetHeaders(decode_exact(payload, ctx, "getheaders")?),
            Command::Headers => Message::Headers(decode_exact(payload, ctx, "headers")?),
            Command::Block => Message::Block(decode_exact(payload, ctx, "block")?),
            Command::Tx => Message::Tx(decode_exact(payload, ctx, "tx")?),
            Command::Ping => Message::Ping(decode::decode_ping(payload, ctx)?),
            Command::Pong => {
                let mut r = PayloadReader::new(payload);
                let nonce = r.read_u64("pong: nonce")?;
                r.finish("pong")?;
                Message::Pong(nonce)
            }
            Command::GetAddr => {
                expect_empty(payload, "getaddr")?;
                Message::GetAddr
            }
            Command::SendAddrV2 => {
                expect_empty(payload, "sendaddrv2")?;
                Message::SendAddrV2
            }
            Command::FilterLoad => Message::FilterLoad(decode_exact(payload, ctx, "filterload")?),
            Command::MerkleBlock => {
                Message::MerkleBlock(decode_exact(payload, ctx, "merkleblock")?)
            }
            Command::Mempool => {
                expect_empty(payload, "mempool")?;
                Message::Mempool
            }
            Command::Reject => {
                let mut r = PayloadReader::new(payload);
                Message::Reject(RejectMessage::decode(&mut r, ctx)?)
            }
            Command::SendHeaders => {
                expect_empty(payload, "sendheaders")?;
                Message::SendHeaders
            }
            Command::FeeFilter => {
                let mut r = PayloadReader::new(payload);
                let fee_rate = r.read_i64("feefilter: feerate")?;
                r.finish("feefilter")?;
                Message::FeeFilter(fee_rate)
            }
        };

        Ok(message)
    }

    /// The known command this message is sent as, `None` for [`Message::Unknown`].
    pub fn command(&self) -> Option<Command> {
        let command = match self {
            Message::Version(_) => Command::Version,
            Message::Verack => Command::Verack,
            Message::Addr(_) => Command::Addr,
            Message::AddrV2(_) => Command::AddrV2,
            Message::Inv(_) => Command::Inv,
            Message::GetData(_) => Command::GetData,
            Message::NotFound(_) => Command::NotFound,
            Message::GetBlocks(_) => Command::GetBlocks,
            Message::GetHeaders(_) => Command::GetHeaders,
            Message::Headers(_) => Command::Headers,
            Message::Block(_) => Command::Block,
            Message::Tx(_) => Command::Tx,
            Message::Ping(_) => Command::Ping,
            Message::Pong(_) => Command::Pong,
            Message::GetAddr => Command::GetAddr,
            Message::SendAddrV2 => Command::SendAddrV2,
            Message::FilterLoad(_) => Command::FilterLoad,
            Message::MerkleBlock(_) => Command::MerkleBlock,
            Message::Mempool => Command::Mempool,
            Message::Reject(_) => Command::Reject,
            Message::SendHeaders => Command::SendHeaders,
            Message::FeeFilter(_) => Command::FeeFilter,
            Message::Unknown { .. } => return None,
        };
        Some(command)
    }

    /// Command string for logging, including unknown ones.
    pub fn command_name(&self) -> &str {
        match self {
            Message::Unknown { command, .. } => command,
            known => known.command().map(|c| c.as_str()).unwrap_or_default(),
        }
    }

    /// Fails when the encoded payload would not decode back to `self` at
    /// `protocol_version`: a collection over its limit, witness data below
    /// segwit, or a `ping` without nonce once BIP31 applies.
    pub fn check_encodable(&self, protocol_version: i32) -> Result<(), PayloadError> {
        match self {
            Message::Addr(entries) => {
                enc::check_count("addr: count", entries.len(), MAX_ADDR_ENTRIES)
            }
            Message::AddrV2(entries) => {
                enc::check_count("addrv2: count", entries.len(), MAX_ADDR_ENTRIES)?;
                entries
                    .iter()
                    .try_for_each(|entry| enc::check_addrv2_addr(&entry.addr))
            }
            Message::Inv(items) | Message::GetData(items) | Message::NotFound(items) => {
                enc::check_count("inv: count", items.len(), MAX_INV_ENTRIES)?;
                items.iter().try_for_each(enc::check_inventory_item)
            }
            Message::GetBlocks(locator) | Message::GetHeaders(locator) => enc::check_count(
                "locator: count",
                locator.locator_hashes.len(),
                MAX_LOCATOR_HASHES,
            ),
            Message::Headers(headers) => {
                enc::check_count("headers: count", headers.len(), MAX_HEADERS)
            }
            Message::Block(block) => block
                .transactions
                .iter()
                .try_for_each(|tx| enc::check_transaction(tx, protocol_version)),
            Message::Tx(tx) => enc::check_transaction(tx, protocol_version),
            Message::Ping(None) if protocol_version >= BIP31_VERSION => {
                Err(PayloadError::Invalid("ping: nonce required from protocol version 60000"))
            }
            Message::FilterLoad(filter) => enc::check_bloom_filter(filter),
            _ => Ok(()),
        }
    }

    /// Serializes the payload for a peer speaking `protocol_version`, after
    /// [`Message::check_encodable`].
    ///
    /// # Panics
    ///
    /// Panics for [`Message::Unknown`], like [`Message::encode_payload`].
    pub fn to_payload(&self, protocol_version: i32) -> Result<Vec<u8>, PayloadError> {
        self.check_encodable(protocol_version)?;
        Ok(self.encode_payload())
    }

    /// Serializes the payload of a known message without version checks.
    ///
    /// # Panics
    ///
    /// Panics for [`Message::Unknown`]: an unknown message has no encoder, and
    /// asking for one is a programming error. Relay raw bytes with
    /// [`crate::wire::WireCodec::serialize_raw`] instead.
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Message::Version(v) => v.to_bytes(),
            Message::Verack
            | Message::GetAddr
            | Message::SendAddrV2
            | Message::Mempool
            | Message::SendHeaders => Vec::new(),
            Message::Addr(entries) => entries[..].to_bytes(),
            Message::AddrV2(entries) => entries[..].to_bytes(),
            Message::Inv(items) | Message::GetData(items) | Message::NotFound(items) => {
                items[..].to_bytes()
            }
            Message::GetBlocks(locator) | Message::GetHeaders(locator) => locator.to_bytes(),
            Message::Headers(headers) => headers[..].to_bytes(),
            Message::Block(block) => block.to_bytes(),
            Message::Tx(tx) => tx.to_bytes(),
            Message::Ping(nonce) => nonce.map(|n| n.to_le_bytes().to_vec()).unwrap_or_default(),
            Message::Pong(nonce) => nonce.to_le_bytes().to_vec(),
            Message::FilterLoad(filter) => filter.to_bytes(),
            Message::MerkleBlock(merkle) => merkle.to_bytes(),
            Message::Reject(reject) => reject.to_bytes(),
            Message::FeeFilter(fee_rate) => fee_rate.to_le_bytes().to_vec(),
            Message::Unknown { command, .. } => {
                panic!("cannot serialize unknown message {command:?}: no encoder for this command")
            }
        }
    }
}
