use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::hd::child_number::ChildNumber;
use crate::hd::derive::{MAX_CHILD_DERIVATION_ATTEMPTS, derive_child_key};
use crate::hd::error::HdError;
use crate::hd::key::ExtendedKey;
use crate::hd::path::DerivationPath;

/// A cache of keys derived below one root key, keyed by absolute path.
///
/// Also hands out fresh child indices per parent with
/// [`DeterministicHierarchy::derive_next_child`], keeping separate counters
/// for hardened and non-hardened children. The cache never evicts.
///
/// All state sits behind one lock, so a hierarchy can be shared between
/// threads and two callers never receive the same "next" child.
pub struct DeterministicHierarchy {
    root_path: DerivationPath,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    keys: HashMap<DerivationPath, ExtendedKey>,
    last_child_private: HashMap<DerivationPath, ChildNumber>,
    last_child_public: HashMap<DerivationPath, ChildNumber>,
}

impl Inner {
    fn put(&mut self, key: ExtendedKey) {
        self.keys.insert(key.path().clone(), key);
    }

    /// Looks up `path`, deriving it and any missing ancestors when `create` is set.
    fn get(&mut self, path: &DerivationPath, create: bool) -> Result<ExtendedKey, HdError> {
        if let Some(key) = self.keys.get(path) {
            return Ok(key.clone());
        }
        if !create {
            return Err(HdError::KeyNotFound(path.clone()));
        }

        let (parent_path, child) = match (path.parent(), path.last()) {
            (Some(parent), Some(child)) => (parent, child),
            _ => return Err(HdError::NoParent),
        };
        let parent = self.get(&parent_path, true)?;
        let key = derive_child_key(&parent, child)?;
        self.put(key.clone());
        Ok(key)
    }

    /// Advances the counter for `parent_path` and returns the new child number.
    fn next_child_number(
        &mut self,
        parent_path: &DerivationPath,
        private_derivation: bool,
    ) -> Result<ChildNumber, HdError> {
        let counters = if private_derivation {
            &mut self.last_child_private
        } else {
            &mut self.last_child_public
        };
        let next = match counters.get(parent_path) {
            None => ChildNumber::new(0, private_derivation)?,
            Some(last) => ChildNumber::new(last.num() + 1, private_derivation)?,
        };
        counters.insert(parent_path.clone(), next);
        Ok(next)
    }
}

impl DeterministicHierarchy {
    /// Starts a hierarchy at `root`, which may be a master key or any key below it.
    pub fn new(root: ExtendedKey) -> Self {
        let root_path = root.path().clone();
        let mut inner = Inner::default();
        inner.put(root);
        Self {
            root_path,
            inner: Mutex::new(inner),
        }
    }

    pub fn root_path(&self) -> &DerivationPath {
        &self.root_path
    }

    /// Adds a key obtained elsewhere (for example a parsed xpub) under its own path.
    pub fn put_key(&self, key: ExtendedKey) {
        self.inner.lock().put(key);
    }

    /// Returns the key at `path`.
    ///
    /// With `relative`, `path` is taken below the root path. With `create`,
    /// missing keys and their ancestors are derived and cached; otherwise a
    /// missing key is [`HdError::KeyNotFound`].
    pub fn get(
        &self,
        path: &DerivationPath,
        relative: bool,
        create: bool,
    ) -> Result<ExtendedKey, HdError> {
        let absolute = self.absolute(path, relative);
        self.inner.lock().get(&absolute, create)
    }

    /// Derives the next unused child of `parent_path`, hardened when
    /// `private_derivation` is set.
    ///
    /// The first call for a parent yields index 0. An index without a valid
    /// key is skipped and the counter keeps the index actually used.
    pub fn derive_next_child(
        &self,
        parent_path: &DerivationPath,
        relative: bool,
        create_parent: bool,
        private_derivation: bool,
    ) -> Result<ExtendedKey, HdError> {
        let absolute = self.absolute(parent_path, relative);
        let mut inner = self.inner.lock();
        let parent = inner.get(&absolute, create_parent)?;

        for _ in 0..MAX_CHILD_DERIVATION_ATTEMPTS {
            let child = inner.next_child_number(parent.path(), private_derivation)?;
            match derive_child_key(&parent, child) {
                Ok(key) => {
                    debug!(parent = %parent.path(), %child, "derived next child");
                    inner.put(key.clone());
                    return Ok(key);
                }
                Err(HdError::InvalidDerivation) => {
                    debug!(parent = %parent.path(), %child, "invalid child index, trying next");
                }
                Err(err) => return Err(err),
            }
        }
        Err(HdError::MaxAttemptsExceeded)
    }

    /// Derives the caller-chosen `child` of `parent_path`. The auto-increment
    /// counters are left untouched.
    pub fn derive_child(
        &self,
        parent_path: &DerivationPath,
        relative: bool,
        create_parent: bool,
        child: ChildNumber,
    ) -> Result<ExtendedKey, HdError> {
        let absolute = self.absolute(parent_path, relative);
        let mut inner = self.inner.lock();
        let parent = inner.get(&absolute, create_parent)?;
        let key = derive_child_key(&parent, child)?;
        inner.put(key.clone());
        Ok(key)
    }

    /// The key this hierarchy was created with.
    pub fn root_key(&self) -> Result<ExtendedKey, HdError> {
        self.inner.lock().get(&self.root_path, false)
    }

    /// Number of cached keys, root included.
    pub fn len(&self) -> usize {
        self.inner.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().keys.is_empty()
    }

    fn absolute(&self, path: &DerivationPath, relative: bool) -> DerivationPath {
        if relative {
            self.root_path.extend(path)
        } else {
            path.clone()
        }
    }
}
