//! Hash primitives shared by the wire codec and the HD engine.
//!
//! All functions return fixed-size arrays so callers never have to reason
//! about digest lengths.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

type HmacSha512 = Hmac<Sha512>;

/// Single SHA256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Bitcoin double SHA256: `SHA256(SHA256(data))`.
///
/// Used for message checksums, block hashes and transaction ids.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// `RIPEMD160(SHA256(data))`, the BIP32 key identifier hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// HMAC-SHA512 over the concatenation of `parts`.
///
/// The result is wrapped in [`Zeroizing`] because every caller in this crate
/// feeds it key material. The intermediate digest buffer is wiped as well.
pub fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Zeroizing<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key)
        .expect("this never fails: hmac can handle keys of any size");
    for part in parts {
        mac.update(part);
    }

    let mut digest = mac.finalize().into_bytes();
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&digest);
    digest.as_mut_slice().zeroize();
    out
}
