use std::collections::HashMap;

use crate::types::AssociationId;

/// receipt prefix: first letters of the association name, uppercased, at most
/// three. Names without ASCII letters fall back to "X" so the receipt shape
/// stays `PREFIX-YEAR-SEQ`.
pub fn association_prefix(name: &str) -> String {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if prefix.is_empty() {
        "X".to_string()
    } else {
        prefix
    }
}

pub fn format_receipt_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{prefix}-{year:04}-{sequence:04}")
}

/// per-(association, year) receipt sequences.
///
/// Owned by the ledger and advanced under `&mut self`, so assignment is
/// serialized and two payments can never draw the same number.
#[derive(Debug, Default)]
pub struct ReceiptCounters {
    counters: HashMap<(AssociationId, i32), u32>,
}

impl ReceiptCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// next sequence number for the association and year, starting at 1
    pub fn next(&mut self, association_id: AssociationId, year: i32) -> u32 {
        let counter = self.counters.entry((association_id, year)).or_insert(0);
        *counter += 1;
        *counter
    }
}
