//! CID ↔ on-ledger digest translation.
//!
//! The contract stores a fixed-width (32-byte) digest rather than a full
//! CID string. `cid_to_digest` extracts the multihash digest bytes from a
//! CID (stripping an optional leading `.` some callers prefix CIDs with);
//! `digest_to_cid` is its inverse, reconstructing a displayable CIDv1
//! (raw codec, sha2-256) from a stored digest.

use cid::Cid;
use multihash::Multihash;
use std::str::FromStr;

pub type Digest32 = [u8; 32];

const SHA2_256_CODE: u64 = 0x12;
const CODEC_RAW: u64 = 0x55;

/// Parse a CID string (CIDv0 or CIDv1, with an optional leading `.`) into
/// its 32-byte multihash digest. Returns `None` for anything that isn't a
/// syntactically valid CID over a 32-byte digest (non-canonical strings,
/// truncated hashes, or text that fails the CID predicate entirely).
#[must_use]
pub fn cid_to_digest(cid_str: &str) -> Option<Digest32> {
    let stripped = match cid_str.strip_prefix('.') {
        Some(rest) => {
            tracing::warn!(cid = cid_str, "stripping optional leading '.' marker before digest translation");
            rest
        }
        None => cid_str,
    };
    let cid = Cid::from_str(stripped).ok()?;
    let digest = cid.hash().digest();
    if digest.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(digest);
    Some(out)
}

/// Reconstruct a displayable CIDv1 string from a raw 32-byte digest, for
/// presenting on-ledger state back to the user.
#[must_use]
pub fn digest_to_cid(digest: Digest32) -> String {
    let mh = Multihash::<64>::wrap(SHA2_256_CODE, &digest).expect("32 bytes always fits a 64-byte multihash buffer");
    Cid::new_v1(CODEC_RAW, mh).to_string()
}
