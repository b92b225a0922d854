use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use tracing::{debug, trace, warn};

use crate::hashes::double_sha256;
use crate::wire::constants::{HEADER_LEN, MAX_MESSAGE_SIZE, Network, PROTOCOL_VERSION};
use crate::wire::decode::DecodeContext;
use crate::wire::error::WireError;
use crate::wire::header::{PacketHeader, command_field};
use crate::wire::message::Message;

/// A framed message whose checksum has been verified but whose payload has
/// not been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

/// Checks `checksum` against the first 4 bytes of `SHA256(SHA256(payload))`.
///
/// Returns the full double hash so callers can reuse it as the payload hash.
pub fn verify_checksum(payload: &[u8], checksum: &[u8; 4]) -> Result<[u8; 32], WireError> {
    let hash = double_sha256(payload);
    if hash[..4] != checksum[..] {
        return Err(WireError::ChecksumMismatch {
            expected: hex::encode(&hash[..4]),
            actual: hex::encode(checksum),
        });
    }
    Ok(hash)
}

/// Frames and unframes Bitcoin P2P messages for one network.
///
/// ```text
/// +------------+--------------+---------------+------------+
/// | magic (4)  | command (12) | length (4 LE) | checksum(4)|
/// +------------+--------------+---------------+------------+
/// | payload (variable)                                ...  |
/// +----------------------------------------------------------
/// ```
///
/// The codec holds no buffering state; it is `Copy` and can be shared freely
/// between connections. Feeding it a truncated stream yields
/// [`WireError::InsufficientData`] and the caller retries with more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireCodec {
    network: Network,
    protocol_version: i32,
}

impl WireCodec {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// A codec for the same network speaking another protocol version.
    pub fn with_protocol_version(self, protocol_version: i32) -> Self {
        Self {
            protocol_version,
            ..self
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    /// Advances `reader` just past the next occurrence of the network magic.
    ///
    /// Bytes before the magic are skipped one at a time. A byte that breaks a
    /// partial match is checked again as the possible start of a new one.
    pub fn seek_past_magic<R: Read>(&self, reader: &mut R) -> Result<(), WireError> {
        let magic = self.network.magic_bytes();
        let mut matched = 0usize;
        let mut skipped = 0usize;

        while matched < magic.len() {
            let b = reader.read_u8()?;
            if b == magic[matched] {
                matched += 1;
                continue;
            }
            skipped += matched + 1;
            matched = usize::from(b == magic[0]);
            if matched == 1 {
                skipped -= 1;
            }
        }

        if skipped > 0 {
            trace!(skipped, network = %self.network, "skipped bytes before magic");
        }
        Ok(())
    }

    /// Reads the 20 header bytes following the magic.
    pub fn read_header<R: Read>(&self, reader: &mut R) -> Result<PacketHeader, WireError> {
        PacketHeader::read(reader).inspect_err(|err| {
            if let WireError::MessageTooLarge { size } = err {
                warn!(size, max = MAX_MESSAGE_SIZE, "peer announced oversized message");
            }
        })
    }

    /// Reads the payload announced by `header`, verifies it and dispatches it.
    pub fn read_payload<R: Read>(
        &self,
        header: &PacketHeader,
        reader: &mut R,
    ) -> Result<Message, WireError> {
        let (payload, payload_hash) = self.read_checked_payload(header, reader)?;

        let ctx = DecodeContext {
            network: self.network,
            protocol_version: self.protocol_version,
            payload_hash,
            checksum: header.checksum,
        };

        let message = Message::decode(&header.command, &payload, &ctx).map_err(|source| {
            WireError::Deserialization {
                command: header.command.clone(),
                payload_hex: hex::encode(&payload),
                source,
            }
        })?;

        debug!(
            command = %header.command,
            len = header.payload_len,
            checksum = %hex::encode(header.checksum),
            "received message"
        );
        Ok(message)
    }

    /// Scans for the magic, then reads, verifies and decodes one message.
    pub fn deserialize<R: Read>(&self, reader: &mut R) -> Result<Message, WireError> {
        self.seek_past_magic(reader)?;
        let header = self.read_header(reader)?;
        self.read_payload(&header, reader)
    }

    /// Like [`WireCodec::deserialize`] but stops after the checksum.
    pub fn read_raw<R: Read>(&self, reader: &mut R) -> Result<RawMessage, WireError> {
        self.seek_past_magic(reader)?;
        let header = self.read_header(reader)?;
        let (payload, _) = self.read_checked_payload(&header, reader)?;
        debug!(command = %header.command, len = header.payload_len, "received raw message");
        Ok(RawMessage { header, payload })
    }

    fn read_checked_payload<R: Read>(
        &self,
        header: &PacketHeader,
        reader: &mut R,
    ) -> Result<(Vec<u8>, [u8; 32]), WireError> {
        let mut payload = vec![0u8; header.payload_len as usize];
        reader.read_exact(&mut payload)?;

        let payload_hash = verify_checksum(&payload, &header.checksum).inspect_err(|err| {
            warn!(command = %header.command, len = header.payload_len, %err, "dropping message");
        })?;
        Ok((payload, payload_hash))
    }

    /// Writes a complete frame for `command` and an already serialized payload.
    ///
    /// The frame is assembled in memory and handed to `writer` with a single
    /// `write_all`, so a frame is never interleaved with another writer's.
    pub fn serialize_raw<W: Write>(
        &self,
        command: &str,
        payload: &[u8],
        writer: &mut W,
    ) -> Result<(), WireError> {
        let command_bytes = command_field(command)?;
        let size = u32::try_from(payload.len())
            .ok()
            .filter(|size| *size <= MAX_MESSAGE_SIZE)
            .ok_or(WireError::MessageTooLarge {
                size: u32::try_from(payload.len()).unwrap_or(u32::MAX),
            })?;

        let mut frame = Vec::with_capacity(4 + HEADER_LEN + payload.len());
        frame.extend_from_slice(&self.network.magic_bytes());
        frame.extend_from_slice(&command_bytes);
        frame.write_u32::<LittleEndian>(size)?;
        frame.extend_from_slice(&double_sha256(payload)[..4]);
        frame.extend_from_slice(payload);

        writer.write_all(&frame)?;
        debug!(command, len = size, "sent message");
        Ok(())
    }

    /// Serializes a known message into a frame for this codec's protocol
    /// version.
    ///
    /// Fails with [`WireError::Serialization`] for a message that this codec's
    /// `deserialize` would not read back unchanged, see
    /// [`Message::check_encodable`].
    ///
    /// # Panics
    ///
    /// Panics for [`Message::Unknown`]; see [`Message::encode_payload`].
    pub fn serialize<W: Write>(&self, message: &Message, writer: &mut W) -> Result<(), WireError> {
        let payload = message
            .to_payload(self.protocol_version)
            .map_err(|source| WireError::Serialization {
                command: message.command_name().to_owned(),
                source,
            })?;
        self.serialize_raw(message.command_name(), &payload, writer)
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::BIP31_VERSION;
    use crate::wire::error::PayloadError;
    use crate::wire::types::{BlockHeader, OutPoint, Transaction, TxIn, TxOut};
    use std::io::Cursor;

    const MAINNET_MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

    /// Builds a full Bitcoin message frame (magic + header + payload).
    fn build_frame(cmd_str: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![];

        bytes.extend_from_slice(&MAINNET_MAGIC);

        // command padded to 12 bytes
        let mut cmd = [0u8; 12];
        cmd[..cmd_str.len()].copy_from_slice(cmd_str);
        bytes.extend_from_slice(&cmd);

        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&double_sha256(payload)[..4]);
        bytes.extend_from_slice(payload);

        bytes
    }

    #[test]
    fn deserialize_verack() {
        let mut cursor = Cursor::new(build_frame(b"verack", &[]));
        let message = WireCodec::default().deserialize(&mut cursor).unwrap();
        assert_eq!(message, Message::Verack);
    }

    #[test]
    fn deserialize_skips_garbage_of_any_length() {
        for garbage_len in [0usize, 1, 1000] {
            // 0x00..=0x7F never contains a magic byte
            let mut bytes: Vec<u8> = (0..garbage_len).map(|i| (i % 0x80) as u8).collect();
            bytes.extend(build_frame(b"ping", &5u64.to_le_bytes()));

            let mut cursor = Cursor::new(bytes);
            let message = WireCodec::default().deserialize(&mut cursor).unwrap();
            assert_eq!(message, Message::Ping(Some(5)), "garbage_len {garbage_len}");
        }
    }

    #[test]
    fn seek_recovers_from_partial_magic() {
        let mut bytes = vec![0xF9, 0xBE, 0x00, 0xF9];
        bytes.extend(build_frame(b"verack", &[]));
        let mut cursor = Cursor::new(bytes);
        assert_eq!(WireCodec::default().deserialize(&mut cursor).unwrap(), Message::Verack);
    }

    #[test]
    fn seek_without_magic_is_insufficient_data() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        let err = WireCodec::default().seek_past_magic(&mut cursor).unwrap_err();
        assert!(matches!(err, WireError::InsufficientData));
    }

    #[test]
    fn other_network_magic_is_skipped() {
        let mut bytes = build_frame(b"verack", &[]);
        let testnet = WireCodec::new(Network::Testnet);
        let mut cursor = Cursor::new(bytes.clone());
        assert!(matches!(
            testnet.deserialize(&mut cursor),
            Err(WireError::InsufficientData)
        ));

        bytes[..4].copy_from_slice(&Network::Testnet.magic_bytes());
        let mut cursor = Cursor::new(bytes);
        assert_eq!(testnet.deserialize(&mut cursor).unwrap(), Message::Verack);
    }

    #[test]
    fn oversized_length_rejected_before_payload() {
        let mut bytes = build_frame(b"block", &[]);
        bytes[16..20].copy_from_slice(&(MAX_MESSAGE_SIZE + 1).to_le_bytes());
        let mut cursor = Cursor::new(bytes);

        let err = WireCodec::default().deserialize(&mut cursor).unwrap_err();
        assert!(matches!(err, WireError::MessageTooLarge { .. }));
    }

    #[test]
    fn any_flipped_payload_bit_fails_checksum() {
        let frame = build_frame(b"pong", &0x0102_0304_0506_0708u64.to_le_bytes());
        for byte in 24..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte] ^= 1 << bit;
                let err = WireCodec::default()
                    .deserialize(&mut Cursor::new(corrupted))
                    .unwrap_err();
                assert!(matches!(err, WireError::ChecksumMismatch { .. }));
            }
        }
    }

    #[test]
    fn unknown_command_falls_back_with_exact_payload() {
        let mut cursor = Cursor::new(build_frame(b"foobar", &[0xDE, 0xAD, 0xBE, 0xEF]));
        let message = WireCodec::default().deserialize(&mut cursor).unwrap();
        assert_eq!(
            message,
            Message::Unknown {
                command: "foobar".into(),
                payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
            }
        );
    }

    #[test]
    fn twelve_byte_command_round_trips() {
        let codec = WireCodec::default();
        let mut out = vec![];
        codec.serialize_raw("123456789012", &[9, 9], &mut out).unwrap();
        assert_eq!(&out[4..16], b"123456789012");

        let raw = codec.read_raw(&mut Cursor::new(&out)).unwrap();
        assert_eq!(raw.header.command, "123456789012");
        assert_eq!(raw.payload, vec![9, 9]);

        assert!(matches!(
            codec.serialize_raw("1234567890123", &[], &mut out),
            Err(WireError::CommandTooLong(_))
        ));
    }

    #[test]
    fn malformed_payload_is_wrapped_with_hex() {
        let mut cursor = Cursor::new(build_frame(b"verack", &[0xAB]));
        let err = WireCodec::default().deserialize(&mut cursor).unwrap_err();
        let WireError::Deserialization {
            command,
            payload_hex,
            source,
        } = err
        else {
            panic!("expected deserialization error, got {err:?}");
        };
        assert_eq!(command, "verack");
        assert_eq!(payload_hex, "ab");
        assert!(matches!(source, PayloadError::TrailingBytes { .. }));
    }

    #[test]
    fn serialize_then_deserialize_is_identity() {
        let codec = WireCodec::new(Network::Regtest);
        let mut out = vec![];
        codec.serialize(&Message::FeeFilter(2500), &mut out).unwrap();
        assert_eq!(&out[..4], &Network::Regtest.magic_bytes());
        assert_eq!(codec.deserialize(&mut Cursor::new(out)).unwrap(), Message::FeeFilter(2500));
    }

    fn witness_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxIn {
                previous_output: OutPoint {
                    txid: [0x01; 32],
                    vout: 0,
                },
                script_sig: vec![],
                sequence: u32::MAX,
                witness: vec![vec![0x30; 72], vec![0x02; 33]],
            }],
            outputs: vec![TxOut {
                value: 10_000,
                script_pubkey: vec![0x00, 0x14],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn serialize_follows_protocol_version() {
        let old = WireCodec::default().with_protocol_version(70001);
        let mut out = vec![];
        let err = old.serialize(&Message::Tx(witness_tx()), &mut out).unwrap_err();
        assert!(matches!(err, WireError::Serialization { ref command, .. } if command == "tx"));
        assert!(out.is_empty());

        let current = WireCodec::default();
        current.serialize(&Message::Tx(witness_tx()), &mut out).unwrap();
        assert_eq!(
            current.deserialize(&mut Cursor::new(&out)).unwrap(),
            Message::Tx(witness_tx())
        );
    }

    #[test]
    fn ping_without_nonce_only_for_pre_bip31_codec() {
        let mut out = vec![];
        assert!(matches!(
            WireCodec::default().serialize(&Message::Ping(None), &mut out),
            Err(WireError::Serialization { .. })
        ));
        assert!(out.is_empty());

        let old = WireCodec::default().with_protocol_version(BIP31_VERSION - 1);
        old.serialize(&Message::Ping(None), &mut out).unwrap();
        assert_eq!(old.deserialize(&mut Cursor::new(out)).unwrap(), Message::Ping(None));
    }

    #[test]
    fn serialize_refuses_what_deserialize_rejects() {
        let codec = WireCodec::default();
        let header = BlockHeader {
            version: 1,
            prev_blockhash: [0; 32],
            merkle_root: [0; 32],
            time: 0,
            bits: 0,
            nonce: 0,
        };
        let mut no_inputs = witness_tx();
        no_inputs.inputs.clear();

        for message in [
            Message::Headers(vec![header; 2001]),
            Message::Tx(no_inputs),
        ] {
            let mut out = vec![];
            let err = codec.serialize(&message, &mut out).unwrap_err();
            assert!(matches!(err, WireError::Serialization { .. }), "{err}");
            assert!(out.is_empty());
        }
    }

    #[test]
    fn non_ascii_command_is_unknown_and_stream_stays_aligned() {
        let mut bytes = build_frame(b"v\xe9rack", &[1, 2, 3]);
        bytes.extend(build_frame(b"verack", &[]));
        let mut cursor = Cursor::new(bytes);

        let codec = WireCodec::default();
        assert_eq!(
            codec.deserialize(&mut cursor).unwrap(),
            Message::Unknown {
                command: "v\u{FFFD}rack".into(),
                payload: vec![1, 2, 3],
            }
        );
        assert_eq!(codec.deserialize(&mut cursor).unwrap(), Message::Verack);
    }

    #[test]
    fn truncated_payload_is_insufficient_data() {
        let mut frame = build_frame(b"pong", &1u64.to_le_bytes());
        frame.truncate(frame.len() - 3);
        let err = WireCodec::default().deserialize(&mut Cursor::new(frame)).unwrap_err();
        assert!(matches!(err, WireError::InsufficientData));
    }
}
