//! zstd-compressed sizes of encoded structures.

use crate::Result;

/// Bytes `data` takes once compressed with zstd at its default level.
pub(crate) fn compressed_len(data: &[u8]) -> Result<usize> {
    Ok(zstd::encode_all(data, zstd::DEFAULT_COMPRESSION_LEVEL)?.len())
}

/// Little-endian encoding of `values`.
pub(crate) fn encode_i64s(values: &[i64], out: &mut Vec<u8>) {
    out.reserve(values.len() * size_of::<i64>());
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
