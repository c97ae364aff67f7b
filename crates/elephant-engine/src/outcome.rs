//! Per-entry outcome types. Design notes (§9) favor tagged variants over
//! exception control flow for the funnel a `FileEntry` travels through;
//! these are that vocabulary.

use elephant_utils::types::{CidString, FileEntry};
use serde_json::Value;

/// The five named phases from spec §4.11, used to tag progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Assignment,
    Validation,
    Processing,
    Upload,
    Submission,
    Finalization,
}

impl Phase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Assignment => "assignment",
            Phase::Validation => "validation",
            Phase::Processing => "processing",
            Phase::Upload => "upload",
            Phase::Submission => "submission",
            Phase::Finalization => "finalization",
        }
    }
}

/// The outcome of phase 2 (validation) for one `FileEntry`.
pub enum ValidationOutcome {
    /// Passed schema validation; carries the parsed document so phase 3
    /// doesn't need to re-read and re-parse the file.
    Valid { entry: FileEntry, value: Value },
    /// Filtered out by the assignment set (phase 1.5).
    NotAssigned { entry: FileEntry },
    /// Failed to read, parse, or schema-validate (phase 2).
    Invalid { entry: FileEntry, reason: String },
}

/// The outcome of phase 3 (processing) for one validated entry.
pub enum ProcessingOutcome {
    /// Promoted to an upload candidate.
    Candidate {
        entry: FileEntry,
        canonical_bytes: Vec<u8>,
        computed_cid: CidString,
    },
    /// Already anchored on-ledger under the same data CID; skipped.
    AlreadyAnchored { entry: FileEntry, cid: CidString },
    /// Canonicalization failed on an already schema-valid document (a
    /// degenerate case: non-finite numbers, unsupported leaves).
    Failed { entry: FileEntry, reason: String },
}
