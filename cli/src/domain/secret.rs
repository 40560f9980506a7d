//! Private-key material.
//!
//! `PrivateKey` has no `Display`, `Serialize` or `Clone`: it is
//! shared by reference and cannot end up in logs or the export table.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// SSH private key bytes, wiped when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: Vec<u8>,
}

impl PrivateKey {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrow the raw key bytes. Callers must not copy them anywhere durable.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}
