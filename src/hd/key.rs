use std::fmt::{self, Debug, Formatter};

use secp256k1::{PublicKey, SECP256K1, SecretKey};
use zeroize::{Zeroize, Zeroizing};

use crate::hashes::hash160;
use crate::hd::child_number::ChildNumber;
use crate::hd::error::HdError;
use crate::hd::path::DerivationPath;
use crate::wire::constants::Network;

/// Length of a serialized extended key before the Base58Check checksum.
const SERIALIZED_LEN: usize = 78;

/// BIP32 version bytes: (public, private).
const fn versions(network: Network) -> (u32, u32) {
    if network.is_mainnet() {
        // xpub/xprv
        (0x0488_B21E, 0x0488_ADE4)
    } else {
        // tpub/tprv
        (0x0435_87CF, 0x0435_8394)
    }
}

fn decode_version(version: u32) -> Result<(Network, bool), HdError> {
    match version {
        0x0488_B21E => Ok((Network::Mainnet, true)),
        0x0488_ADE4 => Ok((Network::Mainnet, false)),
        0x0435_87CF => Ok((Network::Testnet, true)),
        0x0435_8394 => Ok((Network::Testnet, false)),
        _ => Err(HdError::InvalidSerializedKey("unknown version bytes")),
    }
}

/// A node of a BIP32 key tree.
///
/// Holds the chain code and either a private scalar (from which the public
/// point is derived) or only a public point ("watching" key). The parent is
/// not referenced; it is found by looking up [`DerivationPath::parent`].
///
/// Secret material is wiped when the key is dropped.
#[derive(Clone)]
pub struct ExtendedKey {
    path: DerivationPath,
    depth: u8,
    chain_code: [u8; 32],
    secret: Option<SecretKey>,
    public: PublicKey,
    parent_fingerprint: [u8; 4],
}

impl ExtendedKey {
    /// A master key from a raw private scalar and chain code, as produced
    /// by a BIP32 seed HMAC computed elsewhere.
    pub fn master_from_private_bytes(
        secret: &[u8; 32],
        chain_code: &[u8; 32],
    ) -> Result<Self, HdError> {
        let secret = SecretKey::from_slice(secret)
            .map_err(|_| HdError::InvalidKeyBytes("private key out of range"))?;
        Ok(Self::from_secret(
            DerivationPath::master(),
            0,
            chain_code,
            secret,
            [0u8; 4],
        ))
    }

    /// A watching master key from a compressed public key and chain code.
    ///
    /// Only non-hardened children can be derived from it.
    pub fn master_from_public_bytes(
        public: &[u8; 33],
        chain_code: &[u8; 32],
    ) -> Result<Self, HdError> {
        let public = PublicKey::from_slice(public)
            .map_err(|_| HdError::InvalidKeyBytes("not a compressed public key on the curve"))?;
        Ok(Self::from_public(
            DerivationPath::master(),
            0,
            chain_code,
            public,
            [0u8; 4],
        ))
    }

    pub(crate) fn from_secret(
        path: DerivationPath,
        depth: u8,
        chain_code: &[u8; 32],
        secret: SecretKey,
        parent_fingerprint: [u8; 4],
    ) -> Self {
        let public = PublicKey::from_secret_key(SECP256K1, &secret);
        Self {
            path,
            depth,
            chain_code: *chain_code,
            secret: Some(secret),
            public,
            parent_fingerprint,
        }
    }

    pub(crate) fn from_public(
        path: DerivationPath,
        depth: u8,
        chain_code: &[u8; 32],
        public: PublicKey,
        parent_fingerprint: [u8; 4],
    ) -> Self {
        Self {
            path,
            depth,
            chain_code: *chain_code,
            secret: None,
            public,
            parent_fingerprint,
        }
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Distance from the master key. Equals the path length for keys derived
    /// locally; a deserialized key keeps the depth it was exported with.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The last step of the path, zero for the master key.
    pub fn child_number(&self) -> ChildNumber {
        self.path.last().unwrap_or(ChildNumber::ZERO)
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Compressed SEC1 encoding of the public point.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public.serialize()
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret.as_ref()
    }

    pub fn private_key_bytes(&self) -> Option<Zeroizing<[u8; 32]>> {
        self.secret.map(|sk| Zeroizing::new(sk.secret_bytes()))
    }

    /// True when only the public half is known.
    pub fn is_watching(&self) -> bool {
        self.secret.is_none()
    }

    /// HASH160 of the compressed public key.
    pub fn identifier(&self) -> [u8; 20] {
        hash160(&self.public_key_bytes())
    }

    /// First 4 bytes of the identifier, as stored in children.
    pub fn fingerprint(&self) -> [u8; 4] {
        let id = self.identifier();
        [id[0], id[1], id[2], id[3]]
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    /// A watching-only copy of this key.
    pub fn neuter(&self) -> ExtendedKey {
        Self::from_public(
            self.path.clone(),
            self.depth,
            &self.chain_code,
            self.public,
            self.parent_fingerprint,
        )
    }

    fn serialize(&self, version: u32, key_data: &[u8; 33]) -> Zeroizing<[u8; SERIALIZED_LEN]> {
        let mut payload = Zeroizing::new([0u8; SERIALIZED_LEN]);
        payload[..4].copy_from_slice(&version.to_be_bytes());
        payload[4] = self.depth;
        payload[5..9].copy_from_slice(&self.parent_fingerprint);
        payload[9..13].copy_from_slice(&self.child_number().to_u32().to_be_bytes());
        payload[13..45].copy_from_slice(&self.chain_code);
        payload[45..].copy_from_slice(key_data);
        payload
    }

    /// Base58Check `xpub` (mainnet) or `tpub` serialization.
    pub fn to_xpub(&self, network: Network) -> String {
        let (public, _) = versions(network);
        let payload = self.serialize(public, &self.public_key_bytes());
        bs58::encode(&payload[..]).with_check().into_string()
    }

    /// Base58Check `xprv` (mainnet) or `tprv` serialization.
    pub fn to_xprv(&self, network: Network) -> Result<String, HdError> {
        let secret = self.secret.ok_or(HdError::MissingPrivateKey)?;
        let (_, private) = versions(network);

        // key data: 0x00 + ser256(k)
        let mut key_data = Zeroizing::new([0u8; 33]);
        key_data[1..].copy_from_slice(&secret.secret_bytes());
        let payload = self.serialize(private, &key_data);
        Ok(bs58::encode(&payload[..]).with_check().into_string())
    }

    /// Parses an `xpub`/`xprv`/`tpub`/`tprv` string.
    ///
    /// The full path is not part of the format, so the key's path holds
    /// only its own child number (empty for depth zero). Returns the network
    /// the version bytes belong to.
    pub fn from_base58(encoded: &str) -> Result<(ExtendedKey, Network), HdError> {
        let data = Zeroizing::new(bs58::decode(encoded).with_check(None).into_vec()?);
        if data.len() != SERIALIZED_LEN {
            return Err(HdError::InvalidSerializedKey("wrong length"));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&data[..4]);
        let (network, is_public) = decode_version(u32::from_be_bytes(version))?;

        let depth = data[4];
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut child = [0u8; 4];
        child.copy_from_slice(&data[9..13]);
        let child = ChildNumber::from(u32::from_be_bytes(child));
        let mut chain_code = Zeroizing::new([0u8; 32]);
        chain_code.copy_from_slice(&data[13..45]);

        let path = if depth == 0 {
            if parent_fingerprint != [0u8; 4] {
                return Err(HdError::InvalidSerializedKey(
                    "zero depth with non-zero parent fingerprint",
                ));
            }
            if child != ChildNumber::ZERO {
                return Err(HdError::InvalidSerializedKey("zero depth with non-zero index"));
            }
            DerivationPath::master()
        } else {
            DerivationPath::from(vec![child])
        };

        let key_data = &data[45..];
        let key = if is_public {
            let public = PublicKey::from_slice(key_data)
                .map_err(|_| HdError::InvalidSerializedKey("invalid public key"))?;
            Self::from_public(path, depth, &chain_code, public, parent_fingerprint)
        } else {
            if key_data[0] != 0 {
                return Err(HdError::InvalidSerializedKey("private key must start with 0x00"));
            }
            let secret = SecretKey::from_slice(&key_data[1..])
                .map_err(|_| HdError::InvalidSerializedKey("private key out of range"))?;
            Self::from_secret(path, depth, &chain_code, secret, parent_fingerprint)
        };

        Ok((key, network))
    }
}

impl PartialEq for ExtendedKey {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.depth == other.depth
            && self.chain_code == other.chain_code
            && self.public == other.public
            && self.secret == other.secret
            && self.parent_fingerprint == other.parent_fingerprint
    }
}

impl Eq for ExtendedKey {}

impl Debug for ExtendedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("path", &format_args!("{}", self.path))
            .field("depth", &self.depth)
            .field("public", &hex::encode(self.public_key_bytes()))
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

impl Drop for ExtendedKey {
    fn drop(&mut self) {
        self.chain_code.zeroize();
        if let Some(secret) = self.secret.as_mut() {
            secret.non_secure_erase();
        }
    }
}
