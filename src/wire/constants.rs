use std::fmt;
use std::str::FromStr;

/// Bitcoin networks the codec can frame messages for.
///
/// The first 4 bytes of every Bitcoin P2P message identify the
/// network (mainnet, testnet, regtest, signet) and act as a
/// message boundary marker in the TCP stream.
///
/// You can also see how Bitcoin Core maps magic values to networks
/// in `GetNetworkForMagic`:
/// https://github.com/bitcoin/bitcoin/blob/master/src/kernel/chainparams.cpp#L703-L723
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
    Signet,
}

impl Network {
    /// Packet magic as a big-endian integer, i.e. the order the bytes appear on the wire.
    ///
    /// - Mainnet:  0xF9BEB4D9
    /// - Testnet3: 0x0B110907
    /// - Regtest:  0xFABFB5DA
    /// - Signet:   0x0A03CF40
    pub const fn packet_magic(self) -> u32 {
        match self {
            Network::Mainnet => 0xF9BE_B4D9,
            Network::Testnet => 0x0B11_0907,
            Network::Regtest => 0xFABF_B5DA,
            Network::Signet => 0x0A03_CF40,
        }
    }

    /// The 4 magic bytes exactly as transmitted.
    pub const fn magic_bytes(self) -> [u8; 4] {
        self.packet_magic().to_be_bytes()
    }

    /// Maps 4 on-wire magic bytes back to a network.
    pub fn from_magic(bytes: [u8; 4]) -> Option<Self> {
        [
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Signet,
        ]
        .into_iter()
        .find(|n| n.magic_bytes() == bytes)
    }

    /// Whether BIP32 serialization uses the `xpub`/`xprv` prefixes (mainnet)
    /// or `tpub`/`tprv` (every test network).
    pub const fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
            Network::Signet => "signet",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "mainnet" | "bitcoin" => Ok(Network::Mainnet),
            "test" | "testnet" | "testnet3" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            "signet" => Ok(Network::Signet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Length of the NUL-padded ASCII command field.
pub const COMMAND_LEN: usize = 12;

/// Header bytes that follow the magic: command, payload length and checksum.
pub const HEADER_LEN: usize = COMMAND_LEN + 4 + 4;

/// Largest payload a peer may announce (32 MiB).
///
/// A header claiming more than this is rejected before any payload byte is
/// read, so a hostile length field cannot make us allocate.
pub const MAX_MESSAGE_SIZE: u32 = 0x0200_0000;

/// Current Bitcoin P2P protocol version.
///
/// This value is sent in the `version` message during handshake
/// and is used for peer capability negotiation and feature gating.
///
/// The protocol version is defined in Bitcoin Core:
/// https://github.com/bitcoin/bitcoin/blob/707ad466968b947b364cfc25bcb4d6895e799418/src/node/protocol_version.h#L12
///
/// It is serialized on the wire as a signed 32-bit little-endian integer.
pub const PROTOCOL_VERSION: i32 = 70016;

/// First version whose `tx` and `block` payloads may use BIP144 witness serialization.
pub const WITNESS_VERSION: i32 = 70012;

/// First version (BIP31) whose `ping`/`pong` carry a nonce.
pub const BIP31_VERSION: i32 = 60000;

/// The genesis block hash for Bitcoin mainnet. This is the hash of block height 0 (the first block in the chain).
///
/// Source (Bitcoin Core):
/// https://github.com/bitcoin/bitcoin/blob/707ad466968b947b364cfc25bcb4d6895e799418/src/kernel/chainparams.cpp#L136
///
/// This value is encoded in little-endian byte order, matching the
/// internal representation used on the Bitcoin wire protocol.
///
/// Human-readable (big-endian) form:
///
/// ```text
/// 000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f
/// ```
pub const GENESIS_BLOCK_HASH_MAINNET: [u8; 32] = [
    0x6f, 0xe2, 0x8c, 0x0a, 0xb6, 0xf1, 0xb3, 0x72, 0xc1, 0xa6, 0xa2, 0x46, 0xae, 0x63, 0xf7, 0x4f,
    0x93, 0x1e, 0x83, 0x65, 0xe1, 0x5a, 0x08, 0x9c, 0x68, 0xd6, 0x19, 0x00, 0x00, 0x00, 0x00, 0x00,
];
