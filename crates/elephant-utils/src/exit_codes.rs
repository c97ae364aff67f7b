//! Exit code constants for the `elephant-cli` binary.
//!
//! Spec §6 is a strict two-value contract: `0` on success; `1` on
//! missing credentials, invalid directory, invalid directory structure,
//! or any unhandled error after finalization. The named constants below
//! all share the value `1` — they exist so call sites can say what kind
//! of failure occurred without reviving the wider exit-code scheme an
//! earlier pass introduced.

/// Process exit code, type-safe wrapper around the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Operation completed successfully.
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// General/internal failure after finalization was attempted.
    pub const INTERNAL: ExitCode = ExitCode(1);
    /// Missing or invalid credentials / CLI arguments.
    pub const CLI_ARGS: ExitCode = ExitCode(1);
    /// Input directory missing, not a directory, or fails `validate_structure`.
    pub const INVALID_STRUCTURE: ExitCode = ExitCode(1);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
