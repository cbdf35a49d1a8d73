//! # Index Parsing
//!
//! Entry point for reading the key and record indexes of a container. The
//! key half yields the ordered key list, the record half turns each key's
//! record offset into a location inside one record block.

use std::io::{Read, Seek};

use log::info;

use crate::mdict::types::error::Result;
use crate::mdict::types::index::Index;
use crate::mdict::types::models::{BlockMeta, KeyBlockInfo, MdictHeader, RecordBlockInfo};

pub mod common;
pub mod keys;
pub mod records;

/// The parsed index plus the section metadata it was built from.
#[derive(Debug, Clone)]
pub struct ParsedIndex {
    pub index: Index,
    pub key_info: KeyBlockInfo,
    pub record_info: RecordBlockInfo,
    pub key_blocks: Vec<BlockMeta>,
    pub record_blocks: Vec<BlockMeta>,
}

/// Reads both index halves, starting at [`MdictHeader::key_index_offset`].
pub fn parse<R: Read + Seek>(file: &mut R, header: &MdictHeader) -> Result<ParsedIndex> {
    let key_index = keys::parse(file, header)?;
    let record_index = records::parse(file, header, key_index.end_offset, &key_index.entries)?;

    info!(
        "Index built: {} keys, {} key blocks, {} record blocks",
        key_index.entries.len(),
        key_index.blocks.len(),
        record_index.blocks.len()
    );

    Ok(ParsedIndex {
        index: Index::new(key_index.entries, record_index.locators),
        key_info: key_index.info,
        record_info: record_index.info,
        key_blocks: key_index.blocks,
        record_blocks: record_index.blocks,
    })
}
