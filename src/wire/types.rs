//! Typed payloads carried by the known P2P commands.
//!
//! Field layouts follow https://developer.bitcoin.org/reference/p2p_networking.html.
//! Every struct here keeps enough information to be re-encoded byte for byte;
//! nothing is normalized on the way in.

use std::fmt::{self, Debug, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::hashes::double_sha256;

/// A 32-byte double-SHA256 hash in wire (little-endian) order.
pub type Hash256 = [u8; 32];

/// Service flags as defined by the Bitcoin P2P protocol.
///
/// This is a bitfield (`u64`) transmitted in the `version` message and in
/// every network address. Unknown bits are preserved.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Services(u64);

impl Services {
    pub const NONE: Services = Services(0x00);
    /// Full node, can be asked for full blocks.
    pub const NODE_NETWORK: Services = Services(0x01);
    /// BIP64 `getutxo`; unused by maintained Bitcoin Core versions.
    pub const NODE_GETUTXO: Services = Services(0x02);
    /// BIP111 bloom-filtered connections.
    pub const NODE_BLOOM: Services = Services(0x04);
    /// BIP144 witness data.
    pub const NODE_WITNESS: Services = Services(0x08);
    /// BIP159, serves at least the last 288 blocks.
    pub const NODE_NETWORK_LIMITED: Services = Services(0x0400);

    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        if self.is_empty() {
            return vec!["NONE"];
        }

        [
            (Self::NODE_NETWORK, "NODE_NETWORK"),
            (Self::NODE_GETUTXO, "NODE_GETUTXO"),
            (Self::NODE_BLOOM, "NODE_BLOOM"),
            (Self::NODE_WITNESS, "NODE_WITNESS"),
            (Self::NODE_NETWORK_LIMITED, "NODE_NETWORK_LIMITED"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Services({}) [0x{:016x}]", self.names().join(" | "), self.0)
    }
}

/// A network address as embedded in `version` and `addr` payloads.
///
/// The address is kept as the raw 16-byte IPv6 field so that IPv4 addresses
/// round-trip with whichever prefix the peer used (`::ffff:0:0/96` or all
/// zeros). Use [`NetAddr::ip`] for the interpreted address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddr {
    pub services: Services,
    pub ip: Ipv6Addr,
    pub port: u16,
}

impl NetAddr {
    /// An IPv4 address encoded with the standard `::ffff:a.b.c.d` mapping.
    pub fn ipv4(services: Services, ip: Ipv4Addr, port: u16) -> Self {
        Self {
            services,
            ip: ip.to_ipv6_mapped(),
            port,
        }
    }

    /// The all-zero address used for unknown / unroutable endpoints.
    pub fn unspecified() -> Self {
        Self {
            services: Services::NONE,
            ip: Ipv6Addr::UNSPECIFIED,
            port: 0,
        }
    }

    /// Interprets the 16-byte field, collapsing both IPv4 encodings to [`IpAddr::V4`].
    pub fn ip(&self) -> IpAddr {
        let octets = self.ip.octets();
        if octets[..12] == [0u8; 12] && !self.ip.is_unspecified() {
            return IpAddr::V4(Ipv4Addr::new(
                octets[12], octets[13], octets[14], octets[15],
            ));
        }
        match self.ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(self.ip),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: Services,
    pub timestamp: i64,
    pub addr_recv: NetAddr,
    pub addr_from: NetAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    /// BIP37 relay flag. Absent in payloads from older peers.
    pub relay: Option<bool>,
}

/// One entry of a legacy `addr` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrEntry {
    pub timestamp: u32,
    pub addr: NetAddr,
}

/// Network-specific address payload from an `addrv2` message (BIP 155).
///
/// | ID   | Variant      | Length  |
/// |------|--------------|---------|
/// | 0x01 | IPv4         | 4 B     |
/// | 0x02 | IPv6         | 16 B    |
/// | 0x03 | TorV2        | 10 B    |
/// | 0x04 | TorV3        | 32 B    |
/// | 0x05 | I2P          | 32 B    |
/// | 0x06 | CJDNS        | 16 B    |
/// | 0x07 | Yggdrasil    | 16 B    |
///
/// https://github.com/bitcoin/bips/blob/master/bip-0155.mediawiki
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddrV2Addr {
    IPv4(Ipv4Addr),
    IPv6(Ipv6Addr),
    TorV2([u8; 10]),
    TorV3([u8; 32]),
    I2P([u8; 32]),
    Cjdns(Ipv6Addr),
    Yggdrasil(Ipv6Addr),
    Unknown { network_id: u8, bytes: Vec<u8> },
}

impl AddrV2Addr {
    pub fn network_id(&self) -> u8 {
        match self {
            AddrV2Addr::IPv4(_) => 0x01,
            AddrV2Addr::IPv6(_) => 0x02,
            AddrV2Addr::TorV2(_) => 0x03,
            AddrV2Addr::TorV3(_) => 0x04,
            AddrV2Addr::I2P(_) => 0x05,
            AddrV2Addr::Cjdns(_) => 0x06,
            AddrV2Addr::Yggdrasil(_) => 0x07,
            AddrV2Addr::Unknown { network_id, .. } => *network_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            AddrV2Addr::IPv4(ip) => ip.octets().to_vec(),
            AddrV2Addr::IPv6(ip) | AddrV2Addr::Cjdns(ip) | AddrV2Addr::Yggdrasil(ip) => {
                ip.octets().to_vec()
            }
            AddrV2Addr::TorV2(b) => b.to_vec(),
            AddrV2Addr::TorV3(b) | AddrV2Addr::I2P(b) => b.to_vec(),
            AddrV2Addr::Unknown { bytes, .. } => bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrV2Entry {
    pub timestamp: u32,
    /// Services encoded as a CompactSize on the wire.
    pub services: Services,
    pub addr: AddrV2Addr,
    pub port: u16,
}

/// Inventory object types used in `inv`, `getdata`, and `notfound` messages.
///
/// Serialized as little-endian 32-bit unsigned integers. Values this crate
/// does not name are kept in [`InventoryType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryType {
    Error,
    Tx,
    Block,
    /// BIP37
    FilteredBlock,
    /// BIP152
    CompactBlock,
    /// BIP339
    WitnessTxId,
    WitnessTx,
    WitnessBlock,
    WitnessFilteredBlock,
    Other(u32),
}

impl InventoryType {
    const WITNESS_FLAG: u32 = 1 << 30;

    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => InventoryType::Error,
            1 => InventoryType::Tx,
            2 => InventoryType::Block,
            3 => InventoryType::FilteredBlock,
            4 => InventoryType::CompactBlock,
            5 => InventoryType::WitnessTxId,
            v if v == Self::WITNESS_FLAG | 1 => InventoryType::WitnessTx,
            v if v == Self::WITNESS_FLAG | 2 => InventoryType::WitnessBlock,
            v if v == Self::WITNESS_FLAG | 3 => InventoryType::WitnessFilteredBlock,
            other => InventoryType::Other(other),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            InventoryType::Error => 0,
            InventoryType::Tx => 1,
            InventoryType::Block => 2,
            InventoryType::FilteredBlock => 3,
            InventoryType::CompactBlock => 4,
            InventoryType::WitnessTxId => 5,
            InventoryType::WitnessTx => Self::WITNESS_FLAG | 1,
            InventoryType::WitnessBlock => Self::WITNESS_FLAG | 2,
            InventoryType::WitnessFilteredBlock => Self::WITNESS_FLAG | 3,
            InventoryType::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryItem {
    pub kind: InventoryType,
    pub hash: Hash256,
}

/// Payload shared by `getblocks` and `getheaders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocator {
    pub version: u32,
    /// Newest first, as built by the requester.
    pub locator_hashes: Vec<Hash256>,
    /// All zeros means "as many as allowed".
    pub stop_hash: Hash256,
}

/// A Bitcoin block header (exactly 80 bytes on the wire).
///
/// ```text
/// 4  bytes  version
/// 32 bytes  previous block hash
/// 32 bytes  merkle root
/// 4  bytes  timestamp (Unix epoch)
/// 4  bytes  nBits (compact target encoding)
/// 4  bytes  nonce
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_blockhash: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 80;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..36].copy_from_slice(&self.prev_blockhash);
        bytes[36..68].copy_from_slice(&self.merkle_root);
        bytes[68..72].copy_from_slice(&self.time.to_le_bytes());
        bytes[72..76].copy_from_slice(&self.bits.to_le_bytes());
        bytes[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Block hash: double SHA256 of the 80 header bytes, in wire order.
    /// Reverse it for the usual explorer display.
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.to_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    /// The outpoint referenced by coinbase inputs.
    pub const NULL: OutPoint = OutPoint {
        txid: [0u8; 32],
        vout: u32::MAX,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// BIP144 witness stack; empty for legacy inputs.
    pub witness: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Amount in satoshis.
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

/// A transaction as carried by `tx` and `block` messages.
///
/// Scripts are opaque bytes; no script or consensus validation happens here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output == OutPoint::NULL
    }

    /// Transaction id: double SHA256 of the serialization without witness data.
    pub fn txid(&self) -> Hash256 {
        double_sha256(&crate::wire::encode::legacy_tx_bytes(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// BIP37 `filterload` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    pub data: Vec<u8>,
    pub hash_funcs: u32,
    pub tweak: u32,
    pub flags: u8,
}

impl BloomFilter {
    /// Largest filter Bitcoin Core accepts, in bytes.
    pub const MAX_DATA_LEN: usize = 36_000;
    pub const MAX_HASH_FUNCS: u32 = 50;
}

/// BIP37 `merkleblock` payload: a header plus a partial merkle tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    pub total_transactions: u32,
    pub hashes: Vec<Hash256>,
    pub flags: Vec<u8>,
}

/// BIP61 `reject` payload (deprecated by Bitcoin Core, still sent by some peers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectMessage {
    /// Command of the message being rejected.
    pub message: String,
    pub code: u8,
    pub reason: String,
    /// Extra data; usually the 32-byte hash of the rejected tx or block.
    pub data: Vec<u8>,
}

impl RejectMessage {
    pub const MALFORMED: u8 = 0x01;
    pub const INVALID: u8 = 0x10;
    pub const OBSOLETE: u8 = 0x11;
    pub const DUPLICATE: u8 = 0x12;
    pub const NONSTANDARD: u8 = 0x40;
    pub const DUST: u8 = 0x41;
    pub const INSUFFICIENT_FEE: u8 = 0x42;
    pub const CHECKPOINT: u8 = 0x43;
}
