//! Minimal protobuf framing for a single-block UnixFS file leaf and its
//! enclosing dag-pb node, matching the wire format the pinning service's
//! default chunker produces for inputs under one chunk (our JSON payloads
//! are always far smaller than the 256 KiB default chunk size).
//!
//! This intentionally implements only the two messages we need
//! (`unixfs.Data`, `merkledag.PBNode`) rather than pulling in a general
//! protobuf codegen pipeline for a framing that never changes shape.

/// unixfs.Data.DataType.File
const UNIXFS_TYPE_FILE: u64 = 2;

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn write_tag(buf: &mut Vec<u8>, field: u64, wire_type: u64) {
    write_varint(buf, (field << 3) | wire_type);
}

fn write_varint_field(buf: &mut Vec<u8>, field: u64, value: u64) {
    write_tag(buf, field, 0);
    write_varint(buf, value);
}

fn write_bytes_field(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    write_tag(buf, field, 2);
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode the `unixfs.Data` message for a single-chunk file leaf.
fn encode_unixfs_data(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 16);
    write_varint_field(&mut buf, 1, UNIXFS_TYPE_FILE); // Type = File
    write_bytes_field(&mut buf, 2, data); // Data
    write_varint_field(&mut buf, 3, data.len() as u64); // filesize
    buf
}

/// Encode the dag-pb `PBNode` wrapping the given `unixfs.Data` payload,
/// with no links (single leaf block).
fn encode_pb_node(unixfs_data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(unixfs_data.len() + 8);
    write_bytes_field(&mut buf, 1, unixfs_data); // Data
    buf
}

/// Wrap raw file bytes in the standard single-block UnixFS leaf framing,
/// returning the dag-pb block bytes that get hashed to produce a CIDv0.
#[must_use]
pub fn wrap_unixfs_leaf(raw: &[u8]) -> Vec<u8> {
    let unixfs_data = encode_unixfs_data(raw);
    encode_pb_node(&unixfs_data)
}
