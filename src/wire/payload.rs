//! Builders for the messages a node sends on its own initiative.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::wire::message::Message;
use crate::wire::types::{
    BlockLocator, Hash256, InventoryItem, InventoryType, NetAddr, Services, VersionMessage,
};

/// Builds the `version` message that opens a handshake.
///
/// The payload layout is:
///
/// ```text
/// int32    version
/// uint64   services
/// int64    timestamp
/// net_addr addr_recv
/// net_addr addr_from
/// uint64   nonce
/// var_str  user_agent
/// int32    start_height
/// bool     relay
/// ```
///
/// This implementation:
///
/// - Uses the current UNIX timestamp
/// - Uses a random nonce, so a node can detect connections to itself
/// - Leaves `addr_from` unspecified, as Bitcoin Core does
///
/// # Example
///
/// ```
/// use btc_wire_keys::wire::{Message, payload};
/// use btc_wire_keys::wire::types::{NetAddr, Services};
///
/// let msg = payload::build_version(70016, Services::NONE, NetAddr::unspecified(), "/demo:0.1/", 0);
/// let Message::Version(v) = msg else { unreachable!() };
/// assert_eq!(v.version, 70016);
/// ```
pub fn build_version(
    protocol_version: i32,
    services: Services,
    addr_recv: NetAddr,
    user_agent: &str,
    start_height: i32,
) -> Message {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    let nonce: u64 = rand::thread_rng().r#gen();

    Message::Version(VersionMessage {
        version: protocol_version,
        services,
        timestamp,
        addr_recv,
        addr_from: NetAddr::unspecified(),
        nonce,
        user_agent: user_agent.to_owned(),
        start_height,
        relay: Some(false),
    })
}

/// Builds a `getheaders` request.
///
/// Semantics:
/// The peer will:
/// 1. Find the first locator hash it recognizes in its active chain.
/// 2. Return headers *after* that block in forward chronological order.
/// 3. Stop after 2000 headers or when reaching `hash_stop`.
///
/// Reference:
/// https://developer.bitcoin.org/reference/p2p_networking.html#getheaders
pub fn build_getheaders(protocol_version: i32, locator: &[Hash256]) -> Message {
    Message::GetHeaders(BlockLocator {
        version: protocol_version as u32,
        locator_hashes: locator.to_vec(),
        // stop hash = zero (no stop)
        stop_hash: [0u8; 32],
    })
}

/// Builds a `getdata` asking for full blocks, with witness data when requested.
pub fn build_getdata_blocks(hashes: &[Hash256], witness: bool) -> Message {
    let kind = if witness {
        InventoryType::WitnessBlock
    } else {
        InventoryType::Block
    };
    Message::GetData(
        hashes
            .iter()
            .map(|hash| InventoryItem { kind, hash: *hash })
            .collect(),
    )
}

/// The `pong` answering a `ping`, or `None` for a pre-BIP31 empty ping.
pub fn pong_for(ping: &Message) -> Option<Message> {
    match ping {
        Message::Ping(Some(nonce)) => Some(Message::Pong(*nonce)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::{GENESIS_BLOCK_HASH_MAINNET, PROTOCOL_VERSION};
    use crate::wire::decode::DecodeContext;

    #[test]
    fn version_nonce_is_random_and_payload_decodes() {
        let build = || {
            build_version(
                PROTOCOL_VERSION,
                Services::NODE_WITNESS,
                NetAddr::unspecified(),
                "/t/",
                7,
            )
        };
        let (a, b) = (build(), build());
        let (Message::Version(va), Message::Version(vb)) = (&a, &b) else {
            panic!("expected version messages");
        };
        assert_ne!(va.nonce, vb.nonce);

        let decoded =
            Message::decode("version", &a.encode_payload(), &DecodeContext::default()).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn getheaders_from_genesis_has_zero_stop_hash() {
        let msg = build_getheaders(PROTOCOL_VERSION, &[GENESIS_BLOCK_HASH_MAINNET]);
        let payload = msg.encode_payload();
        // version + count + hash + stop hash
        assert_eq!(payload.len(), 4 + 1 + 32 + 32);
        assert_eq!(&payload[5..37], &GENESIS_BLOCK_HASH_MAINNET);
        assert_eq!(&payload[37..], &[0u8; 32]);
    }

    #[test]
    fn getdata_uses_witness_inventory_type() {
        let Message::GetData(items) = build_getdata_blocks(&[[1u8; 32]], true) else {
            panic!("expected getdata");
        };
        assert_eq!(items[0].kind.to_u32(), 0x4000_0002);
    }

    #[test]
    fn pong_echoes_nonce() {
        assert_eq!(pong_for(&Message::Ping(Some(99))), Some(Message::Pong(99)));
        assert_eq!(pong_for(&Message::Ping(None)), None);
    }
}
