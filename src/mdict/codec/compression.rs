//! Decompression algorithms for MDict data blocks.
//!
//! MDict files support multiple compression formats:
//! - None (tag 0): No compression
//! - LZO (tag 1): LZO1X via lzokay (cargo feature `lzo`)
//! - Zlib (tag 2): Standard deflate compression

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::trace;

use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::CompressionType;

/// Length of the sub-header in front of every compressed block.
pub const SUBHEADER_LEN: usize = 8;

const MAX_CAPACITY_HINT: u64 = 16 * 1024 * 1024;

/// Upper bound on LZO1X output per input byte. Run lengths grow by at most
/// 255 per extension byte, so no valid stream exceeds this.
#[cfg(feature = "lzo")]
const MAX_LZO_RATIO: u64 = 256;

/// Decompresses a block whose first 8 bytes are its sub-header.
///
/// The sub-header itself is not interpreted here; `compression_type` is
/// resolved by the caller from its first 4 bytes and the checksum in the
/// next 4 bytes is verified by the caller against the returned bytes.
///
/// # Errors
/// - [`MdictError::InvalidFormat`] if the block is shorter than its sub-header
/// - [`MdictError::SizeMismatch`] if the output length differs from `expected_size`
/// - [`MdictError::UnsupportedCompression`] for LZO without the `lzo` feature
/// - [`MdictError::DecompressionError`] if the compressed stream is damaged
pub fn decompress(
    compression_type: CompressionType,
    block: &[u8],
    expected_size: u64,
) -> Result<Vec<u8>> {
    if block.len() < SUBHEADER_LEN {
        return Err(MdictError::InvalidFormat(format!(
            "Block too short ({} bytes, minimum {} required)",
            block.len(),
            SUBHEADER_LEN
        )));
    }
    decompress_payload(&block[SUBHEADER_LEN..], compression_type, expected_size)
}

/// Decompresses a bare payload (no sub-header).
pub fn decompress_payload(
    payload: &[u8],
    compression_type: CompressionType,
    expected_size: u64,
) -> Result<Vec<u8>> {
    let output = match compression_type {
        CompressionType::None => {
            trace!("No compression, copying {} bytes", payload.len());
            payload.to_vec()
        }
        CompressionType::Lzo => {
            trace!(
                "Decompressing with LZO: {} bytes -> {} bytes (expected)",
                payload.len(),
                expected_size
            );
            decompress_lzo(payload, expected_size)?
        }
        CompressionType::Zlib => {
            trace!(
                "Decompressing with Zlib: {} bytes -> {} bytes (expected)",
                payload.len(),
                expected_size
            );
            // expected_size comes from the file, so cap the preallocation
            let mut output = Vec::with_capacity(expected_size.min(MAX_CAPACITY_HINT) as usize);
            ZlibDecoder::new(payload).read_to_end(&mut output).map_err(|e| {
                MdictError::DecompressionError(format!("Zlib decompression failed: {}", e))
            })?;
            output
        }
    };

    if output.len() as u64 != expected_size {
        return Err(MdictError::SizeMismatch {
            context: "decompressed block",
            expected: expected_size,
            found: output.len() as u64,
        });
    }

    Ok(output)
}

#[cfg(feature = "lzo")]
fn decompress_lzo(payload: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    let limit = (payload.len() as u64).saturating_add(1).saturating_mul(MAX_LZO_RATIO);
    if expected_size > limit {
        return Err(MdictError::SizeMismatch {
            context: "LZO output buffer",
            expected: expected_size,
            found: limit,
        });
    }
    let mut output = Vec::new();
    output.try_reserve_exact(expected_size as usize).map_err(|e| {
        MdictError::DecompressionError(format!("Cannot allocate LZO output buffer: {}", e))
    })?;
    output.resize(expected_size as usize, 0);
    let written = lzokay::decompress::decompress(payload, &mut output).map_err(|e| {
        MdictError::DecompressionError(format!("LZO decompression failed: {:?}", e))
    })?;
    output.truncate(written);
    Ok(output)
}

#[cfg(not(feature = "lzo"))]
fn decompress_lzo(_payload: &[u8], _expected_size: u64) -> Result<Vec<u8>> {
    Err(MdictError::UnsupportedCompression(
        "LZO support is not compiled in (enable the `lzo` feature)",
    ))
}
