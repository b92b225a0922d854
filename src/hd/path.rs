use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::hd::child_number::ChildNumber;
use crate::hd::error::HdError;

/// A path from the master key, e.g. `M/44H/0H/0`.
///
/// The empty path is the master key itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    pub fn master() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[ChildNumber] {
        &self.0
    }

    pub fn last(&self) -> Option<ChildNumber> {
        self.0.last().copied()
    }

    /// This path extended by one child.
    pub fn child(&self, child: ChildNumber) -> Self {
        let mut path = self.0.clone();
        path.push(child);
        DerivationPath(path)
    }

    /// The path one level up, or `None` for the master path.
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(DerivationPath(parent.to_vec()))
    }

    /// This path followed by every step of `suffix`.
    pub fn extend(&self, suffix: &DerivationPath) -> Self {
        let mut path = self.0.clone();
        path.extend_from_slice(&suffix.0);
        DerivationPath(path)
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(path: Vec<ChildNumber>) -> Self {
        DerivationPath(path)
    }
}

impl From<&[ChildNumber]> for DerivationPath {
    fn from(path: &[ChildNumber]) -> Self {
        DerivationPath(path.to_vec())
    }
}

impl Display for DerivationPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("M")?;
        for child in &self.0 {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = HdError;

    /// Accepts `M/0H/1`, `m/0'/1` or a bare `0H/1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(DerivationPath::master());
        }
        let mut parts = trimmed.split('/').peekable();
        if matches!(parts.peek(), Some(&"m" | &"M")) {
            parts.next();
        }

        let children = parts
            .map(|part| {
                part.parse::<ChildNumber>()
                    .map_err(|_| HdError::InvalidPath(s.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DerivationPath(children))
    }
}
