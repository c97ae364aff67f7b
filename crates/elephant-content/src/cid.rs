//! C2 — ContentAddresser.
//!
//! Computes the content identifier of a byte sequence the same way the
//! pinning service does: CIDv0 (base58btc, `Qm...`) for arbitrary byte
//! payloads wrapped in the standard UnixFS leaf framing, and a raw-leaf
//! CIDv1 (base32, `b...`) for media that should not be unixfs-wrapped.

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use thiserror::Error;

use crate::unixfs::wrap_unixfs_leaf;

/// dag-pb multicodec, used for CIDv0 and explicit CIDv1-over-dag-pb.
const CODEC_DAG_PB: u64 = 0x70;
/// raw multicodec, used for the raw-leaf CIDv1 variant.
const CODEC_RAW: u64 = 0x55;

#[derive(Debug, Error)]
pub enum CidError {
    #[error("failed to construct CIDv0: {0}")]
    InvalidV0(#[from] cid::Error),
}

/// Compute the CIDv0 of arbitrary bytes: sha2-256 over the UnixFS-wrapped
/// dag-pb block, base58btc-encoded (always a 46-character `Qm...` string).
pub fn cid_of(bytes: &[u8]) -> Result<String, CidError> {
    let block = wrap_unixfs_leaf(bytes);
    let hash = Code::Sha2_256.digest(&block);
    let cid = Cid::new_v0(hash)?;
    Ok(cid.to_string())
}

/// Compute the raw-leaf CIDv1 of bytes intended as media: sha2-256 over
/// the bytes directly (no UnixFS wrapping), base32-encoded (`b...`).
#[must_use]
pub fn raw_cid_of(bytes: &[u8]) -> String {
    let hash = Code::Sha2_256.digest(bytes);
    let cid = Cid::new_v1(CODEC_RAW, hash);
    cid.to_string()
}

/// Compute an explicit CIDv1 over dag-pb-wrapped bytes, for callers that
/// need the v1 string form of the same bytes `cid_of` would address as v0.
#[must_use]
pub fn cid_v1_of(bytes: &[u8]) -> String {
    let block = wrap_unixfs_leaf(bytes);
    let hash = Code::Sha2_256.digest(&block);
    let cid = Cid::new_v1(CODEC_DAG_PB, hash);
    cid.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_of_is_deterministic() {
        let a = cid_of(b"{}").unwrap();
        let b = cid_of(b"{}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cid_of_is_a_function_of_bytes_alone() {
        let a = cid_of(b"same input").unwrap();
        let b = cid_of(b"same input").unwrap();
        let c = cid_of(b"different input").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cidv0_has_expected_shape() {
        let cid = cid_of(b"hello world").unwrap();
        assert_eq!(cid.len(), 46);
        assert!(cid.starts_with("Qm"));
    }

    #[test]
    fn raw_cidv1_has_expected_shape() {
        let cid = raw_cid_of(b"some media bytes");
        assert!(cid.starts_with('b'));
        assert!(cid.len() > 20);
    }
}
