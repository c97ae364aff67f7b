//! C6 (LedgerOracle) and C9 (LedgerSubmitter): reading and writing the
//! public ledger's submission state.

pub mod client;
pub mod digest;
pub mod error;
pub mod oracle;
pub mod submitter;

pub use client::{ChainClient, EthersChainClient, FeeMode, FeePolicy, FeeSuggestion, OnChainItem, SendOutcome};
pub use digest::{cid_to_digest, digest_to_cid, Digest32};
pub use error::ChainError;
pub use oracle::{ChainQuery, LedgerOracle};
pub use submitter::{is_nonce_class_error, LedgerSubmitter, SubmitterConfig};
