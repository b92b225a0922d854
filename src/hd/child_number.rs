use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::hd::error::HdError;

/// One step of a derivation path: a 31-bit index plus the hardened bit.
///
/// Hardened children are derived from the parent's private key and cannot be
/// computed from an extended public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildNumber(u32);

impl ChildNumber {
    pub const HARDENED_BIT: u32 = 0x8000_0000;

    pub const ZERO: ChildNumber = ChildNumber(0);
    pub const ONE: ChildNumber = ChildNumber(1);
    pub const ZERO_HARDENED: ChildNumber = ChildNumber(Self::HARDENED_BIT);

    pub fn new(index: u32, hardened: bool) -> Result<Self, HdError> {
        if index & Self::HARDENED_BIT != 0 {
            return Err(HdError::InvalidChildIndex(index));
        }
        Ok(ChildNumber(if hardened {
            index | Self::HARDENED_BIT
        } else {
            index
        }))
    }

    pub const fn is_hardened(self) -> bool {
        self.0 & Self::HARDENED_BIT != 0
    }

    /// The index without the hardened bit.
    pub const fn num(self) -> u32 {
        self.0 & !Self::HARDENED_BIT
    }

    /// The raw 32-bit value, as serialized in the HMAC input and in xpubs.
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// The child `offset` positions further along, keeping the hardened bit.
    pub(crate) fn offset(self, offset: u32) -> Result<Self, HdError> {
        let index = self
            .num()
            .checked_add(offset)
            .ok_or(HdError::InvalidChildIndex(u32::MAX))?;
        Self::new(index, self.is_hardened())
    }
}

impl From<u32> for ChildNumber {
    fn from(raw: u32) -> Self {
        ChildNumber(raw)
    }
}

impl Display for ChildNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_hardened() {
            write!(f, "{}H", self.num())
        } else {
            write!(f, "{}", self.num())
        }
    }
}

impl FromStr for ChildNumber {
    type Err = HdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HdError::InvalidPath(s.to_owned());
        let (digits, hardened) = match s.strip_suffix(['H', 'h', '\'']) {
            Some(digits) => (digits, true),
            None => (s, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index: u32 = digits.parse().map_err(|_| invalid())?;
        ChildNumber::new(index, hardened)
    }
}
