use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::wire::constants::WITNESS_VERSION;
use crate::wire::decode::MAX_ADDRV2_ADDR_LEN;
use crate::wire::error::PayloadError;
use crate::wire::types::{
    AddrEntry, AddrV2Addr, AddrV2Entry, Block, BlockHeader, BlockLocator, BloomFilter,
    InventoryItem, InventoryType, MerkleBlock, NetAddr, OutPoint, RejectMessage, Transaction,
    TxIn, TxOut, VersionMessage,
};

/// Implemented by payload types that can be written back to the wire.
///
/// Encoding is the exact inverse of [`crate::wire::decode::Decode`]: a value
/// produced by the decoder re-encodes to the bytes it was read from.
pub trait Encode {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut out);
        out
    }
}

/// Writes a CompactSize integer using the shortest encoding.
pub fn write_compact_size<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    match value {
        0..=0xFC => w.write_u8(value as u8),
        0xFD..=0xFFFF => {
            w.write_u8(0xFD)?;
            w.write_u16::<LittleEndian>(value as u16)
        }
        0x1_0000..=0xFFFF_FFFF => {
            w.write_u8(0xFE)?;
            w.write_u32::<LittleEndian>(value as u32)
        }
        _ => {
            w.write_u8(0xFF)?;
            w.write_u64::<LittleEndian>(value)
        }
    }
}

pub fn write_var_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_compact_size(w, bytes.len() as u64)?;
    w.write_all(bytes)
}

/// Fails when `len` elements would exceed the count the decoder accepts.
pub(crate) fn check_count(
    context: &'static str,
    len: usize,
    max: u64,
) -> Result<(), PayloadError> {
    let count = len as u64;
    if count > max {
        return Err(PayloadError::TooManyEntries { context, count, max });
    }
    Ok(())
}

/// Fails for a transaction whose bytes would not read back as the same
/// transaction at `protocol_version`.
pub(crate) fn check_transaction(
    tx: &Transaction,
    protocol_version: i32,
) -> Result<(), PayloadError> {
    let allows_witness = protocol_version >= WITNESS_VERSION;
    if tx.has_witness() && !allows_witness {
        return Err(PayloadError::Invalid(
            "tx: witness data needs protocol version 70012 or later",
        ));
    }
    // An empty input vector reads back as the segwit marker.
    if tx.inputs.is_empty() && allows_witness {
        return Err(PayloadError::Invalid("tx: a transaction without inputs is ambiguous"));
    }
    Ok(())
}

/// `Other` must not shadow a named type, or it decodes as that type.
pub(crate) fn check_inventory_item(item: &InventoryItem) -> Result<(), PayloadError> {
    match item.kind {
        InventoryType::Other(raw) if InventoryType::from_u32(raw) != item.kind => {
            Err(PayloadError::Invalid("inv: Other type uses a named type value"))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_addrv2_addr(addr: &AddrV2Addr) -> Result<(), PayloadError> {
    let AddrV2Addr::Unknown { network_id, bytes } = addr else {
        return Ok(());
    };
    if (0x01..=0x07).contains(network_id) {
        return Err(PayloadError::Invalid(
            "addrv2: unknown address uses a BIP155 network id",
        ));
    }
    if bytes.len() as u64 > MAX_ADDRV2_ADDR_LEN {
        return Err(PayloadError::Invalid("addrv2: addr field exceeds 512-byte limit"));
    }
    Ok(())
}

pub(crate) fn check_bloom_filter(filter: &BloomFilter) -> Result<(), PayloadError> {
    if filter.data.len() > BloomFilter::MAX_DATA_LEN {
        return Err(PayloadError::Invalid("filterload: filter exceeds 36000 bytes"));
    }
    if filter.hash_funcs > BloomFilter::MAX_HASH_FUNCS {
        return Err(PayloadError::Invalid("filterload: too many hash functions"));
    }
    Ok(())
}

impl Encode for NetAddr {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.services.bits())?;
        w.write_all(&self.ip.octets())?;
        w.write_u16::<BigEndian>(self.port)
    }
}

impl Encode for VersionMessage {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.services.bits())?;
        w.write_i64::<LittleEndian>(self.timestamp)?;
        self.addr_recv.encode(w)?;
        self.addr_from.encode(w)?;
        w.write_u64::<LittleEndian>(self.nonce)?;
        write_var_bytes(w, self.user_agent.as_bytes())?;
        w.write_i32::<LittleEndian>(self.start_height)?;
        if let Some(relay) = self.relay {
            w.write_u8(relay as u8)?;
        }
        Ok(())
    }
}

impl Encode for [AddrEntry] {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_compact_size(w, self.len() as u64)?;
        for entry in self {
            w.write_u32::<LittleEndian>(entry.timestamp)?;
            entry.addr.encode(w)?;
        }
        Ok(())
    }
}

impl Encode for [AddrV2Entry] {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_compact_size(w, self.len() as u64)?;
        for entry in self {
            w.write_u32::<LittleEndian>(entry.timestamp)?;
            write_compact_size(w, entry.services.bits())?;
            w.write_u8(entry.addr.network_id())?;
            write_var_bytes(w, &entry.addr.to_bytes())?;
            w.write_u16::<BigEndian>(entry.port)?;
        }
        Ok(())
    }
}

impl Encode for [InventoryItem] {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_compact_size(w, self.len() as u64)?;
        for item in self {
            w.write_u32::<LittleEndian>(item.kind.to_u32())?;
            w.write_all(&item.hash)?;
        }
        Ok(())
    }
}

impl Encode for BlockLocator {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.version)?;
        write_compact_size(w, self.locator_hashes.len() as u64)?;
        for hash in &self.locator_hashes {
            w.write_all(hash)?;
        }
        w.write_all(&self.stop_hash)
    }
}

impl Encode for BlockHeader {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }
}

/// `headers` payload: every header is followed by a zero transaction count.
impl Encode for [BlockHeader] {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_compact_size(w, self.len() as u64)?;
        for header in self {
            header.encode(w)?;
            w.write_u8(0)?;
        }
        Ok(())
    }
}

impl Encode for OutPoint {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.txid)?;
        w.write_u32::<LittleEndian>(self.vout)
    }
}

fn encode_inputs<W: Write>(w: &mut W, inputs: &[TxIn]) -> io::Result<()> {
    write_compact_size(w, inputs.len() as u64)?;
    for input in inputs {
        input.previous_output.encode(w)?;
        write_var_bytes(w, &input.script_sig)?;
        w.write_u32::<LittleEndian>(input.sequence)?;
    }
    Ok(())
}

fn encode_outputs<W: Write>(w: &mut W, outputs: &[TxOut]) -> io::Result<()> {
    write_compact_size(w, outputs.len() as u64)?;
    for output in outputs {
        w.write_i64::<LittleEndian>(output.value)?;
        write_var_bytes(w, &output.script_pubkey)?;
    }
    Ok(())
}

fn encode_tx<W: Write>(w: &mut W, tx: &Transaction, with_witness: bool) -> io::Result<()> {
    w.write_i32::<LittleEndian>(tx.version)?;
    if with_witness {
        // BIP144 marker and flag
        w.write_all(&[0x00, 0x01])?;
    }
    encode_inputs(w, &tx.inputs)?;
    encode_outputs(w, &tx.outputs)?;
    if with_witness {
        for input in &tx.inputs {
            write_compact_size(w, input.witness.len() as u64)?;
            for item in &input.witness {
                write_var_bytes(w, item)?;
            }
        }
    }
    w.write_u32::<LittleEndian>(tx.lock_time)
}

impl Encode for Transaction {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        encode_tx(w, self, self.has_witness())
    }
}

/// Serialization without witness data, the preimage of the txid.
pub(crate) fn legacy_tx_bytes(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::new();
    let _ = encode_tx(&mut out, tx, false);
    out
}

impl Encode for Block {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.encode(w)?;
        write_compact_size(w, self.transactions.len() as u64)?;
        for tx in &self.transactions {
            tx.encode(w)?;
        }
        Ok(())
    }
}

impl Encode for BloomFilter {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_var_bytes(w, &self.data)?;
        w.write_u32::<LittleEndian>(self.hash_funcs)?;
        w.write_u32::<LittleEndian>(self.tweak)?;
        w.write_u8(self.flags)
    }
}

impl Encode for MerkleBlock {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.encode(w)?;
        w.write_u32::<LittleEndian>(self.total_transactions)?;
        write_compact_size(w, self.hashes.len() as u64)?;
        for hash in &self.hashes {
            w.write_all(hash)?;
        }
        write_var_bytes(w, &self.flags)
    }
}

impl Encode for RejectMessage {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_var_bytes(w, self.message.as_bytes())?;
        w.write_u8(self.code)?;
        write_var_bytes(w, self.reason.as_bytes())?;
        w.write_all(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::types::{InventoryType, Services};
    use std::net::Ipv4Addr;

    #[test]
    fn compact_size_boundaries() {
        let cases: [(u64, &[u8]); 6] = [
            (0xFC, &[0xFC]),
            (0xFD, &[0xFD, 0xFD, 0x00]),
            (0xFFFF, &[0xFD, 0xFF, 0xFF]),
            (0x1_0000, &[0xFE, 0x00, 0x00, 0x01, 0x00]),
            (0xFFFF_FFFF, &[0xFE, 0xFF, 0xFF, 0xFF, 0xFF]),
            (0x1_0000_0000, &[0xFF, 0, 0, 0, 0, 1, 0, 0, 0]),
        ];
        for (value, expected) in cases {
            let mut out = vec![];
            write_compact_size(&mut out, value).unwrap();
            assert_eq!(out, expected, "value {value:#x}");
        }
    }

    #[test]
    fn net_addr_port_is_big_endian() {
        let addr = NetAddr::ipv4(Services::NODE_NETWORK, Ipv4Addr::new(1, 2, 3, 4), 8333);
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), 26);
        assert_eq!(&bytes[20..24], &[1, 2, 3, 4]);
        assert_eq!(&bytes[24..], &8333u16.to_be_bytes());
    }

    #[test]
    fn inventory_layout() {
        let items = [InventoryItem {
            kind: InventoryType::Block,
            hash: [0xAB; 32],
        }];
        let bytes = items[..].to_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &2u32.to_le_bytes());
        assert_eq!(&bytes[5..], &[0xAB; 32]);
    }

    #[test]
    fn txid_ignores_witness() {
        let mut tx = Transaction {
            version: 2,
            inputs: vec![TxIn {
                previous_output: OutPoint::NULL,
                script_sig: vec![0x51],
                sequence: u32::MAX,
                witness: vec![],
            }],
            outputs: vec![TxOut {
                value: 50,
                script_pubkey: vec![0x6a],
            }],
            lock_time: 0,
        };
        let legacy_id = tx.txid();
        let legacy_len = tx.to_bytes().len();

        tx.inputs[0].witness = vec![vec![1, 2, 3]];
        assert_eq!(tx.txid(), legacy_id);
        // marker + flag + stack count + item length + 3 bytes
        assert_eq!(tx.to_bytes().len(), legacy_len + 2 + 1 + 1 + 3);
    }
}
