//! `elephant-cli` — validate, content-address, and submit property data
//! files to a public ledger. This crate is the thin CLI shell around the
//! `elephant-engine` pipeline; every component it assembles lives in its
//! own workspace member.

pub mod cli;

pub use elephant_utils::exit_codes::ExitCode;
