use std::net::{Ipv4Addr, Ipv6Addr};

use crate::wire::constants::{BIP31_VERSION, Network, PROTOCOL_VERSION, WITNESS_VERSION};
use crate::wire::error::PayloadError;
use crate::wire::types::{
    AddrEntry, AddrV2Addr, AddrV2Entry, Block, BlockHeader, BlockLocator, BloomFilter, Hash256,
    InventoryItem, InventoryType, MerkleBlock, NetAddr, OutPoint, RejectMessage, Services,
    Transaction, TxIn, TxOut, VersionMessage,
};

/// Maximum entries in `addr` / `addrv2` (BIP 155).
pub const MAX_ADDR_ENTRIES: u64 = 1000;
/// Maximum headers per `headers` message.
pub const MAX_HEADERS: u64 = 2000;
/// Maximum inventory vectors per `inv` / `getdata` / `notfound`.
pub const MAX_INV_ENTRIES: u64 = 50_000;
/// Bitcoin Core's MAX_LOCATOR_SZ.
pub const MAX_LOCATOR_HASHES: u64 = 101;
/// BIP 155 upper bound on the address field of an `addrv2` entry.
pub const MAX_ADDRV2_ADDR_LEN: u64 = 512;

/// Per-message information handed to every sub-decoder by the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    pub network: Network,
    pub protocol_version: i32,
    /// Double SHA256 of the payload, already computed for the checksum.
    pub payload_hash: Hash256,
    pub checksum: [u8; 4],
}

impl DecodeContext {
    /// A context for decoding payloads outside of a framed stream.
    pub fn detached(network: Network, protocol_version: i32, payload: &[u8]) -> Self {
        let payload_hash = crate::hashes::double_sha256(payload);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&payload_hash[..4]);
        Self {
            network,
            protocol_version,
            payload_hash,
            checksum,
        }
    }

    fn allows_witness(&self) -> bool {
        self.protocol_version >= WITNESS_VERSION
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::detached(Network::Mainnet, PROTOCOL_VERSION, &[])
    }
}

/// Bounds-checked cursor over a message payload.
///
/// Every read fails with [`PayloadError::UnexpectedEof`] instead of panicking,
/// whatever lengths the peer claims.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails unless the whole payload has been consumed.
    pub fn finish(&self, context: &'static str) -> Result<(), PayloadError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(PayloadError::TrailingBytes { context, remaining }),
        }
    }

    pub fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], PayloadError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(PayloadError::UnexpectedEof(context))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    pub fn array<const N: usize>(
        &mut self,
        context: &'static str,
    ) -> Result<[u8; N], PayloadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, context)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, PayloadError> {
        Ok(self.array::<1>(context)?[0])
    }

    pub fn read_u16_be(&mut self, context: &'static str) -> Result<u16, PayloadError> {
        Ok(u16::from_be_bytes(self.array(context)?))
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, PayloadError> {
        Ok(u32::from_le_bytes(self.array(context)?))
    }

    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, PayloadError> {
        Ok(i32::from_le_bytes(self.array(context)?))
    }

    pub fn read_u64(&mut self, context: &'static str) -> Result<u64, PayloadError> {
        Ok(u64::from_le_bytes(self.array(context)?))
    }

    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, PayloadError> {
        Ok(i64::from_le_bytes(self.array(context)?))
    }

    pub fn read_hash(&mut self, context: &'static str) -> Result<Hash256, PayloadError> {
        self.array(context)
    }

    /// Reads a CompactSize integer, rejecting non-shortest encodings.
    pub fn read_compact_size(&mut self, context: &'static str) -> Result<u64, PayloadError> {
        let value = match self.read_u8(context)? {
            0xFD => {
                let v = u16::from_le_bytes(self.array(context)?) as u64;
                if v < 0xFD {
                    return Err(PayloadError::NonCanonicalCompactSize);
                }
                v
            }
            0xFE => {
                let v = u32::from_le_bytes(self.array(context)?) as u64;
                if v <= 0xFFFF {
                    return Err(PayloadError::NonCanonicalCompactSize);
                }
                v
            }
            0xFF => {
                let v = u64::from_le_bytes(self.array(context)?);
                if v <= 0xFFFF_FFFF {
                    return Err(PayloadError::NonCanonicalCompactSize);
                }
                v
            }
            n => n as u64,
        };
        Ok(value)
    }

    /// Reads an element count and checks it against `max`.
    pub fn read_count(&mut self, context: &'static str, max: u64) -> Result<usize, PayloadError> {
        let count = self.read_compact_size(context)?;
        if count > max {
            return Err(PayloadError::TooManyEntries { context, count, max });
        }
        Ok(count as usize)
    }

    /// Capacity hint for `count` elements of at least `min_size` bytes each.
    ///
    /// Never exceeds what the remaining payload could actually hold, so a
    /// hostile count cannot trigger a large allocation.
    fn capacity_for(&self, count: usize, min_size: usize) -> usize {
        count.min(self.remaining() / min_size.max(1))
    }

    pub fn read_var_bytes(&mut self, context: &'static str) -> Result<&'a [u8], PayloadError> {
        let len = self.read_compact_size(context)?;
        let len = usize::try_from(len).map_err(|_| PayloadError::UnexpectedEof(context))?;
        self.take(len, context)
    }

    pub fn read_var_str(&mut self, context: &'static str) -> Result<String, PayloadError> {
        let bytes = self.read_var_bytes(context)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PayloadError::Invalid(context))
    }
}

/// Implemented by types that can be decoded from a message payload.
pub trait Decode: Sized {
    fn decode(reader: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError>;
}

/// Decodes `payload` as a single `T`, requiring every byte to be consumed.
pub fn decode_exact<T: Decode>(
    payload: &[u8],
    ctx: &DecodeContext,
    context: &'static str,
) -> Result<T, PayloadError> {
    let mut reader = PayloadReader::new(payload);
    let value = T::decode(&mut reader, ctx)?;
    reader.finish(context)?;
    Ok(value)
}

/// Accepts only an empty payload (`verack`, `sendheaders`, `mempool`, ...).
pub fn expect_empty(payload: &[u8], context: &'static str) -> Result<(), PayloadError> {
    PayloadReader::new(payload).finish(context)
}

impl Decode for NetAddr {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let services = Services::from(r.read_u64("net_addr: services")?);
        let ip = Ipv6Addr::from(r.array::<16>("net_addr: ip")?);
        let port = r.read_u16_be("net_addr: port")?;
        Ok(NetAddr { services, ip, port })
    }
}

impl Decode for VersionMessage {
    fn decode(r: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let version = r.read_i32("version: version")?;
        let services = Services::from(r.read_u64("version: services")?);
        let timestamp = r.read_i64("version: timestamp")?;
        let addr_recv = NetAddr::decode(r, ctx)?;
        let addr_from = NetAddr::decode(r, ctx)?;
        let nonce = r.read_u64("version: nonce")?;
        let user_agent = r.read_var_str("version: user_agent")?;
        let start_height = r.read_i32("version: start_height")?;

        let relay = if r.is_empty() {
            None
        } else {
            match r.read_u8("version: relay")? {
                0 => Some(false),
                1 => Some(true),
                _ => return Err(PayloadError::Invalid("version: relay flag must be 0 or 1")),
            }
        };

        Ok(VersionMessage {
            version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

impl Decode for Vec<AddrEntry> {
    fn decode(r: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let count = r.read_count("addr: count", MAX_ADDR_ENTRIES)?;
        let mut entries = Vec::with_capacity(r.capacity_for(count, 30));

        for _ in 0..count {
            let timestamp = r.read_u32("addr: timestamp")?;
            let addr = NetAddr::decode(r, ctx)?;
            entries.push(AddrEntry { timestamp, addr });
        }

        Ok(entries)
    }
}

impl Decode for Vec<AddrV2Entry> {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let count = r.read_count("addrv2: count", MAX_ADDR_ENTRIES)?;
        let mut entries = Vec::with_capacity(r.capacity_for(count, 9));

        for _ in 0..count {
            let timestamp = r.read_u32("addrv2: timestamp")?;
            let services = Services::from(r.read_compact_size("addrv2: services")?);
            let network_id = r.read_u8("addrv2: network_id")?;

            let addr_len = r.read_compact_size("addrv2: addr length")?;
            if addr_len > MAX_ADDRV2_ADDR_LEN {
                return Err(PayloadError::Invalid(
                    "addrv2: addr field exceeds 512-byte limit",
                ));
            }
            let addr_bytes = r.take(addr_len as usize, "addrv2: addr bytes")?;
            let port = r.read_u16_be("addrv2: port")?;

            let addr = decode_addrv2_addr(network_id, addr_bytes)?;
            entries.push(AddrV2Entry {
                timestamp,
                services,
                addr,
                port,
            });
        }

        Ok(entries)
    }
}

fn decode_addrv2_addr(network_id: u8, bytes: &[u8]) -> Result<AddrV2Addr, PayloadError> {
    fn fixed<const N: usize>(bytes: &[u8], context: &'static str) -> Result<[u8; N], PayloadError> {
        bytes.try_into().map_err(|_| PayloadError::Invalid(context))
    }

    let addr = match network_id {
        0x01 => AddrV2Addr::IPv4(Ipv4Addr::from(fixed::<4>(
            bytes,
            "addrv2: IPv4 must be 4 bytes",
        )?)),
        0x02 => AddrV2Addr::IPv6(Ipv6Addr::from(fixed::<16>(
            bytes,
            "addrv2: IPv6 must be 16 bytes",
        )?)),
        0x03 => AddrV2Addr::TorV2(fixed(bytes, "addrv2: TorV2 must be 10 bytes")?),
        0x04 => AddrV2Addr::TorV3(fixed(bytes, "addrv2: TorV3 must be 32 bytes")?),
        0x05 => AddrV2Addr::I2P(fixed(bytes, "addrv2: I2P must be 32 bytes")?),
        0x06 => AddrV2Addr::Cjdns(Ipv6Addr::from(fixed::<16>(
            bytes,
            "addrv2: CJDNS must be 16 bytes",
        )?)),
        0x07 => AddrV2Addr::Yggdrasil(Ipv6Addr::from(fixed::<16>(
            bytes,
            "addrv2: Yggdrasil must be 16 bytes",
        )?)),
        id => AddrV2Addr::Unknown {
            network_id: id,
            bytes: bytes.to_vec(),
        },
    };
    Ok(addr)
}

impl Decode for Vec<InventoryItem> {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let count = r.read_count("inv: count", MAX_INV_ENTRIES)?;
        let mut items = Vec::with_capacity(r.capacity_for(count, 36));

        for _ in 0..count {
            let kind = InventoryType::from_u32(r.read_u32("inv: type")?);
            let hash = r.read_hash("inv: hash")?;
            items.push(InventoryItem { kind, hash });
        }

        Ok(items)
    }
}

impl Decode for BlockLocator {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let version = r.read_u32("locator: version")?;
        let count = r.read_count("locator: count", MAX_LOCATOR_HASHES)?;
        let mut locator_hashes = Vec::with_capacity(r.capacity_for(count, 32));
        for _ in 0..count {
            locator_hashes.push(r.read_hash("locator: hash")?);
        }
        let stop_hash = r.read_hash("locator: stop hash")?;

        Ok(BlockLocator {
            version,
            locator_hashes,
            stop_hash,
        })
    }
}

impl Decode for BlockHeader {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        Ok(BlockHeader {
            version: r.read_i32("header: version")?,
            prev_blockhash: r.read_hash("header: prev_blockhash")?,
            merkle_root: r.read_hash("header: merkle_root")?,
            time: r.read_u32("header: time")?,
            bits: r.read_u32("header: bits")?,
            nonce: r.read_u32("header: nonce")?,
        })
    }
}

impl Decode for Vec<BlockHeader> {
    fn decode(r: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let count = r.read_count("headers: count", MAX_HEADERS)?;
        let mut headers = Vec::with_capacity(r.capacity_for(count, BlockHeader::SIZE + 1));

        // Each 80-byte header is followed by a transaction count that is
        // always zero in a `headers` message.
        for _ in 0..count {
            headers.push(BlockHeader::decode(r, ctx)?);
            if r.read_compact_size("headers: txn_count")? != 0 {
                return Err(PayloadError::Invalid("headers: txn_count must be zero"));
            }
        }

        Ok(headers)
    }
}

impl Decode for OutPoint {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        Ok(OutPoint {
            txid: r.read_hash("outpoint: txid")?,
            vout: r.read_u32("outpoint: vout")?,
        })
    }
}

fn decode_inputs(
    r: &mut PayloadReader<'_>,
    ctx: &DecodeContext,
) -> Result<Vec<TxIn>, PayloadError> {
    let count = r.read_count("tx: input count", u32::MAX as u64)?;
    let mut inputs = Vec::with_capacity(r.capacity_for(count, 41));
    for _ in 0..count {
        inputs.push(TxIn {
            previous_output: OutPoint::decode(r, ctx)?,
            script_sig: r.read_var_bytes("tx: script_sig")?.to_vec(),
            sequence: r.read_u32("tx: sequence")?,
            witness: Vec::new(),
        });
    }
    Ok(inputs)
}

fn decode_outputs(r: &mut PayloadReader<'_>) -> Result<Vec<TxOut>, PayloadError> {
    let count = r.read_count("tx: output count", u32::MAX as u64)?;
    let mut outputs = Vec::with_capacity(r.capacity_for(count, 9));
    for _ in 0..count {
        outputs.push(TxOut {
            value: r.read_i64("tx: value")?,
            script_pubkey: r.read_var_bytes("tx: script_pubkey")?.to_vec(),
        });
    }
    Ok(outputs)
}

/// Legacy and BIP144 serialization, mirroring Bitcoin Core's `UnserializeTransaction`.
impl Decode for Transaction {
    fn decode(r: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let version = r.read_i32("tx: version")?;
        let mut flags = 0u8;

        let mut inputs = decode_inputs(r, ctx)?;
        let mut outputs = Vec::new();
        if inputs.is_empty() && ctx.allows_witness() {
            // An empty input vector is the segwit marker; the flag byte follows.
            flags = r.read_u8("tx: segwit flag")?;
            if flags != 0 {
                inputs = decode_inputs(r, ctx)?;
                outputs = decode_outputs(r)?;
            }
        } else {
            outputs = decode_outputs(r)?;
        }

        if flags & 1 != 0 && ctx.allows_witness() {
            flags ^= 1;
            for input in inputs.iter_mut() {
                let items = r.read_count("tx: witness item count", u32::MAX as u64)?;
                let mut witness = Vec::with_capacity(r.capacity_for(items, 1));
                for _ in 0..items {
                    witness.push(r.read_var_bytes("tx: witness item")?.to_vec());
                }
                input.witness = witness;
            }
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(PayloadError::Invalid("tx: superfluous witness record"));
            }
        }
        if flags != 0 {
            return Err(PayloadError::Invalid("tx: unknown optional data"));
        }

        let lock_time = r.read_u32("tx: lock_time")?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}

impl Decode for Block {
    fn decode(r: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let header = BlockHeader::decode(r, ctx)?;
        let count = r.read_count("block: txn_count", u32::MAX as u64)?;
        let mut transactions = Vec::with_capacity(r.capacity_for(count, 60));
        for _ in 0..count {
            transactions.push(Transaction::decode(r, ctx)?);
        }
        Ok(Block {
            header,
            transactions,
        })
    }
}

impl Decode for BloomFilter {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let data = r.read_var_bytes("filterload: data")?;
        if data.len() > BloomFilter::MAX_DATA_LEN {
            return Err(PayloadError::Invalid("filterload: filter exceeds 36000 bytes"));
        }
        let hash_funcs = r.read_u32("filterload: hash_funcs")?;
        if hash_funcs > BloomFilter::MAX_HASH_FUNCS {
            return Err(PayloadError::Invalid("filterload: too many hash functions"));
        }
        Ok(BloomFilter {
            data: data.to_vec(),
            hash_funcs,
            tweak: r.read_u32("filterload: tweak")?,
            flags: r.read_u8("filterload: flags")?,
        })
    }
}

impl Decode for MerkleBlock {
    fn decode(r: &mut PayloadReader<'_>, ctx: &DecodeContext) -> Result<Self, PayloadError> {
        let header = BlockHeader::decode(r, ctx)?;
        let total_transactions = r.read_u32("merkleblock: total_transactions")?;
        let count = r.read_count("merkleblock: hash count", u32::MAX as u64)?;
        let mut hashes = Vec::with_capacity(r.capacity_for(count, 32));
        for _ in 0..count {
            hashes.push(r.read_hash("merkleblock: hash")?);
        }
        let flags = r.read_var_bytes("merkleblock: flags")?.to_vec();

        Ok(MerkleBlock {
            header,
            total_transactions,
            hashes,
            flags,
        })
    }
}

impl Decode for RejectMessage {
    fn decode(r: &mut PayloadReader<'_>, _ctx: &DecodeContext) -> Result<Self, PayloadError> {
        Ok(RejectMessage {
            message: r.read_var_str("reject: message")?,
            code: r.read_u8("reject: code")?,
            reason: r.read_var_str("reject: reason")?,
            data: r.take_rest().to_vec(),
        })
    }
}

/// `ping` nonce; peers older than BIP31 send an empty ping.
pub fn decode_ping(payload: &[u8], ctx: &DecodeContext) -> Result<Option<u64>, PayloadError> {
    let mut r = PayloadReader::new(payload);
    if r.is_empty() && ctx.protocol_version < BIP31_VERSION {
        return Ok(None);
    }
    let nonce = r.read_u64("ping: nonce")?;
    r.finish("ping")?;
    Ok(Some(nonce))
}
