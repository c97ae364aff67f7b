//! The engine's top-level error type, composing each component's error
//! enum. Only `InputStructure` and genuinely unhandled failures propagate
//! to the top-level caller (spec §7); everything else is caught per-entry
//! and turned into a CSV row.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input directory structure is invalid: {0}")]
    InputStructure(#[from] elephant_scanner::ScanError),

    #[error("failed to open report sinks: {0}")]
    Report(#[from] elephant_report::ReportError),

    #[error("batch submission failed: {0}")]
    Submission(#[from] elephant_chain::ChainError),

    #[error("unhandled error: {0}")]
    Unhandled(String),
}
