//! C1 (Canonicalizer) and C2 (ContentAddresser): pure functions turning a
//! JSON value into canonical bytes, and bytes into a content identifier.

pub mod canonical;
pub mod cid;
mod unixfs;

pub use canonical::{CanonicalizeError, canonicalize, canonicalize_bytes};
pub use cid::{CidError, cid_of, cid_v1_of, raw_cid_of};
