//! # Block Content Parsing & Decoding
//!
//! Turns a raw, on-disk block into usable bytes, and those bytes into
//! structured data. It sits between the `reader`/`index` layers (which
//! handle I/O) and the low-level `codec` (pure data transformation).
//!
//! ## Responsibilities
//! 1.  **Parse Block Sub-header**: the 4-byte compression tag and 4-byte
//!     Adler-32 of the decompressed content.
//! 2.  **Decompress**: via the `codec::compression` dispatcher.
//! 3.  **Verify Checksum**: a mismatch is always an error.
//! 4.  **Parse Entries**: splits a key block into `KeyEntry` records.
//! 5.  **Extract Record**: slices one record out of a record block.

use adler2::adler32_slice;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::trace;

use crate::mdict::codec::compression::{self, SUBHEADER_LEN};
use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{
    CompressionType, KeyEntry, MdictEncoding, MdictVersion, RecordLocator,
};
use crate::mdict::utils;

/// The 8-byte sub-header in front of every key and record block.
#[derive(Debug, Clone, Copy)]
pub struct BlockSubheader {
    pub compression: CompressionType,
    pub checksum: u32,
}

impl BlockSubheader {
    pub fn parse(raw_block: &[u8]) -> Result<Self> {
        if raw_block.len() < SUBHEADER_LEN {
            return Err(MdictError::InvalidFormat(format!(
                "Block too short ({} bytes, minimum {} required)",
                raw_block.len(),
                SUBHEADER_LEN
            )));
        }
        let tag = LittleEndian::read_u32(&raw_block[0..4]);
        Ok(Self {
            compression: CompressionType::try_from(tag)?,
            checksum: BigEndian::read_u32(&raw_block[4..8]),
        })
    }
}

/// Decodes a raw block (sub-header + payload) and verifies its checksum.
pub fn decode_block(raw_block: &[u8], expected_decompressed_size: u64) -> Result<Vec<u8>> {
    let subheader = BlockSubheader::parse(raw_block)?;

    trace!(
        "Decoding block: compression={:?}, expected_size={} bytes",
        subheader.compression, expected_decompressed_size
    );

    let decompressed =
        compression::decompress(subheader.compression, raw_block, expected_decompressed_size)?;
    verify_checksum(&decompressed, subheader.checksum)?;
    Ok(decompressed)
}

/// Checks `data` against the Adler-32 stored in a block sub-header.
pub fn verify_checksum(data: &[u8], expected: u32) -> Result<()> {
    let actual = adler32_slice(data);
    trace!("Block checksum: expected={:#010x}, actual={:#010x}", expected, actual);
    if actual != expected {
        return Err(MdictError::CorruptBlock { expected, actual });
    }
    Ok(())
}

/// Parses key entries from a decompressed key block.
///
/// Each record is a record offset (version number width) followed by the key
/// text and its terminator (`00` narrow, aligned `00 00` for UTF-16).
pub fn parse_key_entries(
    data: &[u8],
    version: MdictVersion,
    encoding: MdictEncoding,
) -> Result<Vec<KeyEntry>> {
    let mut entries = Vec::new();
    let mut reader = data;

    while !reader.is_empty() {
        let record_offset = utils::read_number(&mut reader, version.number_width())?;
        let text = read_null_terminated_string(&mut reader, encoding)?;
        entries.push(KeyEntry { record_offset, text });
    }

    Ok(entries)
}

/// Slices one record out of a decompressed record block.
pub fn slice_record<'a>(block_bytes: &'a [u8], locator: &RecordLocator) -> Result<&'a [u8]> {
    let start = locator.start as usize;
    let end = locator.end as usize;
    if start > end || end > block_bytes.len() {
        return Err(MdictError::InvalidFormat(format!(
            "Record location [{}..{}] is out of bounds for block of size {}",
            start,
            end,
            block_bytes.len()
        )));
    }
    Ok(&block_bytes[start..end])
}

/// Reads a null-terminated string from a byte slice and advances the slice.
///
/// The decoded text is trimmed of surrounding whitespace.
fn read_null_terminated_string(reader: &mut &[u8], encoding: MdictEncoding) -> Result<String> {
    let width = utils::unit_width(encoding);
    let end_pos = if width == 2 {
        reader
            .chunks_exact(2)
            .position(|chunk| chunk == [0, 0])
            .map(|chunk_index| chunk_index * 2)
    } else {
        reader.iter().position(|&byte| byte == 0)
    }
    .ok_or_else(|| MdictError::InvalidFormat("Missing null terminator in key text".to_string()))?;

    let (decoded, _, _) = encoding.decode(&reader[..end_pos]);
    *reader = &reader[end_pos + width..];

    Ok(decoded.trim().to_string())
}
