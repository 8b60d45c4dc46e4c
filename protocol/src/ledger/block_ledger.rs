//! Per-block record of ledger mutations, hashed at block close.
//!
//! Two nodes that applied the same credits and debits in the same order
//! produce the same fingerprint, so comparing the chained hash is a cheap
//! way to spot divergence without diffing whole tables.

use sha2::{Digest, Sha256};

/// One credit or debit as seen by the fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub height: u64,
    pub address: String,
    pub asset: String,
    pub quantity: u64,
}

impl LedgerEntry {
    fn write_into(&self, out: &mut String) {
        use std::fmt::Write;
        // Writing into a String cannot fail.
        let _ = write!(out, "{}{}{}{}", self.height, self.address, self.asset, self.quantity);
    }
}

/// Accumulator for one block's ledger entries, in application order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockLedger {
    entries: Vec<LedgerEntry>,
}

impl BlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, height: u64, address: &str, asset: &str, quantity: u64) {
        self.entries.push(LedgerEntry {
            height,
            address: address.to_string(),
            asset: asset.to_string(),
            quantity,
        });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `"{height}{address}{asset}{quantity}"` for every entry, concatenated.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            entry.write_into(&mut out);
        }
        out
    }

    /// Chains this block onto `previous`:
    /// `hex(SHA-256(SHA-256(previous || fingerprint)))`.
    pub fn hash(&self, previous: &str) -> String {
        let mut inner = Sha256::new();
        inner.update(previous.as_bytes());
        inner.update(self.fingerprint().as_bytes());
        hex::encode(Sha256::digest(inner.finalize()))
    }
}
