//! Shared value types for the submission pipeline.
//!
//! These are the data-model entities from the pipeline specification:
//! `FileEntry`, `ProcessedFile`, `DataItem`, `BatchReceipt`, `Fingerprint`,
//! and `ProgressMetrics`. None of them know how to produce themselves —
//! that's the job of the components in `elephant-scanner`, `elephant-content`,
//! etc. This crate only owns the shapes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A CID-like identifier string, as required by the directory layout and
/// the on-ledger digest translation.
///
/// We keep this as a thin `String` newtype rather than validating at
/// construction time everywhere; `is_cid_like` is the single predicate
/// used at the boundaries (directory scan, schema resolution) where the
/// shape actually matters.
pub type CidString = String;

/// The CID syntax predicate from spec §4.3.
///
/// Accepts:
/// - a 46-character string starting with `Qm` matching `[A-Za-z0-9]+`
///   (CIDv0, base58btc-encoded sha2-256 multihash)
/// - a string starting with `b`, longer than 20 characters, matching
///   `[a-z2-7]+` (CIDv1, base32-encoded)
/// - any `[A-Za-z0-9]+` string of length >= 20 (permissive fallback used
///   by other identifier schemes in the wild)
#[must_use]
pub fn is_cid_like(s: &str) -> bool {
    if s.len() == 46 && s.starts_with("Qm") && s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return true;
    }
    if s.len() > 20 && s.starts_with('b') && s.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7'))
    {
        return true;
    }
    s.len() >= 20 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A discovered candidate input file, as produced by `elephant-scanner`.
///
/// Invariants (enforced by the scanner at construction): `property_id` and
/// `group_id` both pass [`is_cid_like`]; `path` ends in `.json`;
/// `(property_id, group_id)` is unique within one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub property_id: CidString,
    pub group_id: CidString,
    pub path: PathBuf,
}

impl FileEntry {
    #[must_use]
    pub fn fingerprint(&self) -> ProcessingFingerprint {
        ProcessingFingerprint {
            property_id: self.property_id.clone(),
            group_id: self.group_id.clone(),
        }
    }
}

/// A `FileEntry` that has passed schema validation and had its canonical
/// bytes and content identifier computed.
///
/// Invariant: `computed_cid` is the CID of `canonical_bytes`; both are
/// either both empty (not yet processed) or both populated.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub entry: FileEntry,
    pub canonical_bytes: Vec<u8>,
    pub computed_cid: CidString,
}

impl ProcessedFile {
    #[must_use]
    pub fn is_processed(&self) -> bool {
        !self.canonical_bytes.is_empty() && !self.computed_cid.is_empty()
    }
}

/// The submission payload: a triple of syntactically valid CIDs, the unit
/// of on-ledger submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    pub property_id: CidString,
    pub group_id: CidString,
    pub data_cid: CidString,
}

/// The outcome of one on-ledger batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub cost_used: Option<u128>,
    pub items_submitted: usize,
}

/// The `(property_id, group_id)` key used for at-most-once semantics
/// during validation/processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessingFingerprint {
    pub property_id: CidString,
    pub group_id: CidString,
}

/// The `(property_id, group_id, data_cid)` key used for at-most-once
/// semantics during submission dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionFingerprint {
    pub property_id: CidString,
    pub group_id: CidString,
    pub data_cid: CidString,
}

impl From<&DataItem> for SubmissionFingerprint {
    fn from(item: &DataItem) -> Self {
        Self {
            property_id: item.property_id.clone(),
            group_id: item.group_id.clone(),
            data_cid: item.data_cid.clone(),
        }
    }
}

/// Monotone progress counters, owned exclusively by the pipeline engine.
///
/// Only the engine mutates these; external consumers (a progress bar,
/// the final summary) only read them, which is why every field is a
/// plain `usize` rather than an atomic — there is exactly one writer by
/// construction (spec §5).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProgressMetrics {
    pub scanned: usize,
    pub valid: usize,
    pub invalid: usize,
    pub skipped: usize,
    pub uploaded: usize,
    pub errors: usize,
    pub warnings: usize,
    pub submitted: usize,
}

impl ProgressMetrics {
    /// Checks the conservation invariant from spec §8 property 1:
    /// `scanned = valid + invalid + skipped`.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.scanned == self.valid + self.invalid + self.skipped
    }
}
