//! Record index parsing and the key → record location walk.
//!
//! ```text
//! [record block count][entry count][info size][record blocks size]
//! [info: block count × (compressed size, decompressed size)]
//! [record blocks]
//! ```

use std::io::{Read, Seek, SeekFrom};

use log::{debug, info, trace};

use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{BlockMeta, KeyEntry, MdictHeader, RecordBlockInfo, RecordLocator};
use crate::mdict::utils;

/// Everything read from the record half of the index.
#[derive(Debug, Clone)]
pub struct RecordIndex {
    pub info: RecordBlockInfo,
    pub blocks: Vec<BlockMeta>,
    /// One locator per key, in key order.
    pub locators: Vec<RecordLocator>,
}

/// Parses the record index at `offset` and locates the record of every key.
pub fn parse<R: Read + Seek>(
    file: &mut R,
    header: &MdictHeader,
    offset: u64,
    keys: &[KeyEntry],
) -> Result<RecordIndex> {
    info!("Parsing record index at offset {}", offset);
    file.seek(SeekFrom::Start(offset))?;

    let width = header.version.number_width();
    let info = RecordBlockInfo {
        num_record_blocks: utils::read_number(file, width)?,
        num_entries: utils::read_number(file, width)?,
        record_info_len: utils::read_number(file, width)?,
        record_blocks_len: utils::read_number(file, width)?,
    };
    debug!(
        "Record block info: blocks={}, entries={}, info_size={} bytes, record_blocks={} bytes",
        info.num_record_blocks, info.num_entries, info.record_info_len, info.record_blocks_len
    );

    if info.num_entries != keys.len() as u64 {
        return Err(MdictError::RecordCountMismatch {
            expected: keys.len() as u64,
            found: info.num_entries,
        });
    }

    let pair_size = 2 * width as u64;
    let expected_info_len = info.num_record_blocks.checked_mul(pair_size);
    if expected_info_len != Some(info.record_info_len) {
        return Err(MdictError::SizeMismatch {
            context: "record block info",
            expected: expected_info_len.unwrap_or(u64::MAX),
            found: info.record_info_len,
        });
    }

    let info_data = utils::read_section(file, info.record_info_len, "record block info")?;
    let section_offset = file.stream_position()?;
    let blocks = extract_block_metas(&info_data, width, section_offset)?;

    if blocks.len() as u64 != info.num_record_blocks {
        return Err(MdictError::CountMismatch {
            item_type: "record blocks in index",
            expected: info.num_record_blocks,
            found: blocks.len() as u64,
        });
    }

    let total_compressed = blocks
        .iter()
        .fold(0u64, |sum, b| sum.saturating_add(b.compressed_size));
    if total_compressed != info.record_blocks_len {
        return Err(MdictError::RecordBlockSizeMismatch {
            expected: info.record_blocks_len,
            found: total_compressed,
        });
    }

    let file_len = file.seek(SeekFrom::End(0))?;
    let available = file_len.saturating_sub(section_offset);
    if info.record_blocks_len > available {
        return Err(MdictError::SizeMismatch {
            context: "record blocks",
            expected: info.record_blocks_len,
            found: available,
        });
    }

    let locators = locate_records(keys, &blocks)?;
    info!(
        "Record index parsed: {} record blocks, {} records located",
        blocks.len(),
        locators.len()
    );

    Ok(RecordIndex {
        info,
        blocks,
        locators,
    })
}

fn extract_block_metas(info_data: &[u8], width: usize, section_offset: u64) -> Result<Vec<BlockMeta>> {
    let mut blocks = Vec::new();
    let mut reader = info_data;
    let mut file_offset = section_offset;
    let mut decompressed_offset = 0u64;

    while !reader.is_empty() {
        let compressed_size = utils::read_number(&mut reader, width)?;
        let decompressed_size = utils::read_number(&mut reader, width)?;
        blocks.push(BlockMeta {
            compressed_size,
            decompressed_size,
            file_offset,
            decompressed_offset,
        });
        file_offset = file_offset.saturating_add(compressed_size);
        decompressed_offset = decompressed_offset.saturating_add(decompressed_size);
    }

    Ok(blocks)
}

/// Assigns every key its byte range inside one record block.
///
/// Keys are consumed in order. A record ends where the next key's record
/// begins when both share a block, otherwise at the end of its block.
pub fn locate_records(keys: &[KeyEntry], blocks: &[BlockMeta]) -> Result<Vec<RecordLocator>> {
    let mut locators = Vec::with_capacity(keys.len());
    let mut cursor = 0usize;

    for block in blocks {
        let cumulative = block.decompressed_offset;

        while let Some(key) = keys.get(cursor) {
            if key.record_offset < cumulative {
                return Err(MdictError::InvalidFormat(format!(
                    "Record offset {} of '{}' precedes record block starting at {}",
                    key.record_offset, key.text, cumulative
                )));
            }
            let start = key.record_offset - cumulative;
            if start >= block.decompressed_size {
                break;
            }

            let end = match keys.get(cursor + 1) {
                Some(next) if next.record_offset < key.record_offset => {
                    return Err(MdictError::InvalidFormat(format!(
                        "Record offsets decrease: '{}' at {} follows '{}' at {}",
                        next.text, next.record_offset, key.text, key.record_offset
                    )));
                }
                Some(next) if next.record_offset - cumulative < block.decompressed_size => {
                    next.record_offset - cumulative
                }
                _ => block.decompressed_size,
            };

            trace!("Record '{}': [{}..{}] in block at {}", key.text, start, end, block.file_offset);
            locators.push(RecordLocator {
                start,
                end,
                block: *block,
            });
            cursor += 1;
        }
    }

    if cursor < keys.len() {
        return Err(MdictError::InvalidFormat(format!(
            "{} keys point past the end of the record data (first: '{}')",
            keys.len() - cursor,
            keys[cursor].text
        )));
    }

    Ok(locators)
}
