//! BIP32 master key generation and child key derivation.
//!
//! https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki

use secp256k1::{PublicKey, SECP256K1, Scalar, SecretKey};
use tracing::{debug, trace};
use zeroize::{Zeroize, Zeroizing};

use crate::hashes::hmac_sha512;
use crate::hd::child_number::ChildNumber;
use crate::hd::error::HdError;
use crate::hd::key::ExtendedKey;
use crate::hd::path::DerivationPath;

/// HMAC key used to turn a seed into the master key.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// Upper bound on consecutive invalid children before giving up. Each
/// failure has probability below 2^-127, so reaching it means a bug.
pub const MAX_CHILD_DERIVATION_ATTEMPTS: u32 = 100;

/// Seeds this short can be brute forced.
const MIN_SEED_LEN: usize = 9;

/// `I = HMAC-SHA512("Bitcoin seed", seed)`, master scalar `I_L`, chain code `I_R`.
pub fn derive_master_key(seed: &[u8]) -> Result<ExtendedKey, HdError> {
    if seed.len() < MIN_SEED_LEN {
        return Err(HdError::SeedTooShort(seed.len()));
    }

    let i = hmac_sha512(MASTER_HMAC_KEY, &[seed]);
    let secret = SecretKey::from_slice(&i[..32]).map_err(|_| HdError::InvalidDerivation)?;
    let mut chain_code = Zeroizing::new([0u8; 32]);
    chain_code.copy_from_slice(&i[32..]);

    Ok(ExtendedKey::from_secret(
        DerivationPath::master(),
        0,
        &chain_code,
        secret,
        [0u8; 4],
    ))
}

/// Derives exactly `child` from `parent`.
///
/// Private parents give private children (CKDpriv); watching parents give
/// public children (CKDpub) and cannot derive hardened ones. Fails with
/// [`HdError::InvalidDerivation`] in the negligible case that this index has
/// no valid key.
pub fn derive_child_key(parent: &ExtendedKey, child: ChildNumber) -> Result<ExtendedKey, HdError> {
    if child.is_hardened() && parent.is_watching() {
        return Err(HdError::PrivateDerivationFromPublic);
    }
    let depth = parent
        .depth()
        .checked_add(1)
        .ok_or(HdError::MaxDepthExceeded)?;

    let index = child.to_u32().to_be_bytes();
    let i = match parent.private_key_bytes() {
        // 0x00 || ser256(k_par) || ser32(i)
        Some(k) if child.is_hardened() => {
            hmac_sha512(parent.chain_code(), &[&[0u8], &k[..], &index])
        }
        // serP(K_par) || ser32(i)
        _ => hmac_sha512(parent.chain_code(), &[&parent.public_key_bytes(), &index]),
    };

    let mut chain_code = Zeroizing::new([0u8; 32]);
    chain_code.copy_from_slice(&i[32..]);

    let path = parent.path().child(child);
    let parent_fingerprint = parent.fingerprint();

    // `Scalar` has no erase API, so I_L lives as a `Scalar` only inside
    // `apply_tweak` and its byte copy is wiped here.
    let mut il = [0u8; 32];
    il.copy_from_slice(&i[..32]);
    let tweaked = apply_tweak(parent, il);
    il.zeroize();

    let key = match tweaked? {
        Tweaked::Secret(secret) => {
            ExtendedKey::from_secret(path, depth, &chain_code, secret, parent_fingerprint)
        }
        Tweaked::Public(public) => {
            ExtendedKey::from_public(path, depth, &chain_code, public, parent_fingerprint)
        }
    };

    trace!(path = %key.path(), "derived child key");
    Ok(key)
}

enum Tweaked {
    Secret(SecretKey),
    Public(PublicKey),
}

/// Adds I_L to the parent key: `(k_par + I_L) mod n` for private parents,
/// `I_L * G + K_par` for watching ones.
fn apply_tweak(parent: &ExtendedKey, il: [u8; 32]) -> Result<Tweaked, HdError> {
    // Rejects I_L >= n.
    let tweak = Scalar::from_be_bytes(il).map_err(|_| HdError::InvalidDerivation)?;
    match parent.secret_key() {
        // rejects a zero child scalar
        Some(k_par) => k_par
            .add_tweak(&tweak)
            .map(Tweaked::Secret)
            .map_err(|_| HdError::InvalidDerivation),
        // rejects the point at infinity
        None => parent
            .public_key()
            .add_exp_tweak(SECP256K1, &tweak)
            .map(Tweaked::Public)
            .map_err(|_| HdError::InvalidDerivation),
    }
}

/// Derives `child`, moving on to the following index whenever an index has
/// no valid key, up to [`MAX_CHILD_DERIVATION_ATTEMPTS`] indices.
///
/// The returned key's [`ExtendedKey::child_number`] is the index actually used.
pub fn derive_this_or_next_child_key(
    parent: &ExtendedKey,
    child: ChildNumber,
) -> Result<ExtendedKey, HdError> {
    for attempt in 0..MAX_CHILD_DERIVATION_ATTEMPTS {
        let candidate = child.offset(attempt)?;
        match derive_child_key(parent, candidate) {
            Err(HdError::InvalidDerivation) => {
                debug!(
                    parent = %parent.path(),
                    child = %candidate,
                    "invalid child index, trying next"
                );
            }
            result => return result,
        }
    }
    Err(HdError::MaxAttemptsExceeded)
}

/// Derives every step of `path` below `parent`, without retrying.
pub fn derive_path(parent: &ExtendedKey, path: &DerivationPath) -> Result<ExtendedKey, HdError> {
    let mut key = parent.clone();
    for child in path.as_slice() {
        key = derive_child_key(&key, *child)?;
    }
    Ok(key)
}
