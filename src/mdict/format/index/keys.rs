//! Key index parsing: index header fields, key block info and key blocks.
//!
//! ```text
//! [index header fields: 4 (v1) or 5 (v2) numbers][v2: 4B BE Adler32]
//! [key block info]   v1: raw records, v2: 8B sub-header + zlib payload
//! [key blocks]       each: 8B sub-header + payload
//! ```

use std::io::{Read, Seek, SeekFrom};

use adler2::adler32_slice;
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, info, trace};

use super::common;
use crate::mdict::codec::compression::{self, SUBHEADER_LEN};
use crate::mdict::codec::crypto;
use crate::mdict::format::content;
use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{
    BlockMeta, CompressionType, KeyBlockInfo, KeyEntry, MdictHeader, MdictVersion,
};
use crate::mdict::utils;

/// Everything read from the key half of the index.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    pub info: KeyBlockInfo,
    pub blocks: Vec<BlockMeta>,
    pub entries: Vec<KeyEntry>,
    /// File offset just past the key blocks, where the record index starts.
    pub end_offset: u64,
}

/// Parses the key index starting at [`MdictHeader::key_index_offset`].
pub fn parse<R: Read + Seek>(file: &mut R, header: &MdictHeader) -> Result<KeyIndex> {
    info!("Parsing key index at offset {}", header.key_index_offset);
    file.seek(SeekFrom::Start(header.key_index_offset))?;

    let info = read_index_header(file, header)?;
    info!(
        "Key block info: blocks={}, entries={}, info_size={} bytes, key_blocks={} bytes",
        info.num_key_blocks, info.num_entries, info.key_info_comp_len, info.key_blocks_len
    );

    let raw_info = utils::read_section(file, info.key_info_comp_len, "key block info")?;
    let info_data = decode_key_block_info(raw_info, &info, header)?;

    let section_offset = file.stream_position()?;
    let blocks = extract_block_metas(&info_data, header, &info, section_offset)?;

    let declared = blocks
        .iter()
        .fold(0u64, |sum, b| sum.saturating_add(b.compressed_size));
    if declared > info.key_blocks_len {
        return Err(MdictError::SizeMismatch {
            context: "key block section",
            expected: info.key_blocks_len,
            found: declared,
        });
    }

    let section = utils::read_section(file, info.key_blocks_len, "key block section")?;
    let entries = decode_key_blocks(&section, &blocks, header, section_offset)?;
    if entries.len() as u64 != info.num_entries {
        return Err(MdictError::IndexCountMismatch {
            item_type: "decoded key entries",
            expected: info.num_entries,
            found: entries.len() as u64,
        });
    }

    let end_offset = file.stream_position()?;
    debug!("Key index parsed: {} keys, record index at {}", entries.len(), end_offset);

    Ok(KeyIndex {
        info,
        blocks,
        entries,
        end_offset,
    })
}

/// Reads (and, for encrypted containers, decrypts) the index header fields.
fn read_index_header<R: Read>(file: &mut R, header: &MdictHeader) -> Result<KeyBlockInfo> {
    let field_count = match header.version {
        MdictVersion::V1 => 4,
        MdictVersion::V2 => 5,
    };
    let mut field_bytes = vec![0u8; field_count * header.version.number_width()];
    file.read_exact(&mut field_bytes)?;

    if header.encryption.payload_encrypted() {
        let key = header.master_key.ok_or(MdictError::CredentialRequired)?;
        debug!("Decrypting key index header fields (Salsa20/8)");
        crypto::salsa_decrypt(&mut field_bytes, &key);
    }

    if header.version == MdictVersion::V2 {
        let expected = file.read_u32::<BigEndian>()?;
        let actual = adler32_slice(&field_bytes);
        trace!(
            "Index header checksum: expected={:#010x}, actual={:#010x}",
            expected, actual
        );
        if actual != expected {
            return Err(MdictError::CorruptIndexHeader(format!(
                "field checksum mismatch (expected {:#010x}, actual {:#010x})",
                expected, actual
            )));
        }
    }

    let width = header.version.number_width();
    let mut reader = field_bytes.as_slice();
    let num_key_blocks = utils::read_number(&mut reader, width)?;
    let num_entries = utils::read_number(&mut reader, width)?;
    let key_info_decomp_len = match header.version {
        MdictVersion::V1 => None,
        MdictVersion::V2 => Some(utils::read_number(&mut reader, width)?),
    };
    let key_info_comp_len = utils::read_number(&mut reader, width)?;
    let key_blocks_len = utils::read_number(&mut reader, width)?;

    Ok(KeyBlockInfo {
        num_key_blocks,
        num_entries,
        key_info_decomp_len,
        key_info_comp_len,
        key_blocks_len,
    })
}

/// Turns the stored key block info into its plain records.
///
/// v1 info is stored as-is. v2 info is zlib behind a sub-header, optionally
/// fast-encrypted; every failure here means the index header is unusable.
fn decode_key_block_info(
    raw: Vec<u8>,
    info: &KeyBlockInfo,
    header: &MdictHeader,
) -> Result<Vec<u8>> {
    let Some(decomp_len) = info.key_info_decomp_len else {
        debug!("Key block info stored uncompressed ({} bytes)", raw.len());
        return Ok(raw);
    };

    if raw.len() < SUBHEADER_LEN {
        return Err(MdictError::CorruptIndexHeader(format!(
            "key block info is {} bytes, shorter than its sub-header",
            raw.len()
        )));
    }

    let tag = LittleEndian::read_u32(&raw[0..4]);
    if tag != CompressionType::Zlib.tag() {
        return Err(MdictError::CorruptIndexHeader(format!(
            "key block info must be zlib-compressed, found tag {}",
            tag
        )));
    }

    let mut payload = raw[SUBHEADER_LEN..].to_vec();
    if header.encryption.index_encrypted() {
        debug!("Decrypting key block info (fast cipher, checksum-derived key)");
        let key = crypto::derive_key_for_index_info(&raw[4..8]);
        crypto::fast_decrypt(&mut payload, &key);
    }

    let decompressed = compression::decompress_payload(&payload, CompressionType::Zlib, decomp_len)
        .map_err(|e| MdictError::CorruptIndexHeader(format!("key block info: {}", e)))?;

    let expected = BigEndian::read_u32(&raw[4..8]);
    let actual = adler32_slice(&decompressed);
    if actual != expected {
        return Err(MdictError::CorruptIndexHeader(format!(
            "key block info checksum mismatch (expected {:#010x}, actual {:#010x})",
            expected, actual
        )));
    }

    debug!("Key block info decoded: {} bytes", decompressed.len());
    Ok(decompressed)
}

/// Walks the key block info records into block metadata.
///
/// Each record is: entry count, head text, tail text, compressed size,
/// decompressed size. The texts are skipped.
fn extract_block_metas(
    info_data: &[u8],
    header: &MdictHeader,
    info: &KeyBlockInfo,
    section_offset: u64,
) -> Result<Vec<BlockMeta>> {
    let width = header.version.number_width();
    let mut blocks = Vec::new();
    let mut reader = info_data;
    let mut total_entries = 0u64;
    let mut file_offset = section_offset;
    let mut decompressed_offset = 0u64;

    while !reader.is_empty() {
        total_entries = total_entries.saturating_add(utils::read_number(&mut reader, width)?);
        common::skip_text(&mut reader, header.version, header.encoding)?;
        common::skip_text(&mut reader, header.version, header.encoding)?;
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

    if blocks.len() as u64 != info.num_key_blocks {
        return Err(MdictError::IndexCountMismatch {
            item_type: "key blocks",
            expected: info.num_key_blocks,
            found: blocks.len() as u64,
        });
    }
    if total_entries != info.num_entries {
        return Err(MdictError::IndexCountMismatch {
            item_type: "key entries in key block info",
            expected: info.num_entries,
            found: total_entries,
        });
    }

    Ok(blocks)
}

/// Decodes every key block of the section, keeping key order.
fn decode_key_blocks(
    section: &[u8],
    blocks: &[BlockMeta],
    header: &MdictHeader,
    section_offset: u64,
) -> Result<Vec<KeyEntry>> {
    let mut entries = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        let start = (block.file_offset - section_offset) as usize;
        let end = start + block.compressed_size as usize;
        trace!(
            "Key block {}: bytes [{}..{}] -> {} bytes",
            i, start, end, block.decompressed_size
        );

        let data = content::decode_block(&section[start..end], block.decompressed_size)?;
        let mut block_entries = content::parse_key_entries(&data, header.version, header.encoding)?;
        trace!("Key block {} holds {} keys", i, block_entries.len());
        entries.append(&mut block_entries);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdict::types::models::{EncryptionMode, MdictMetadata, RegisterBy};
    use flate2::{Compression, write::ZlibEncoder};
    use std::collections::HashMap;
    use std::io::{Cursor, Write};

    fn header(version: MdictVersion, encryption: EncryptionMode) -> MdictHeader {
        MdictHeader {
            version,
            encoding: encoding_rs::UTF_8,
            encryption,
            register_by: RegisterBy::DeviceId,
            master_key: None,
            stylesheet: HashMap::new(),
            metadata: MdictMetadata {
                title: String::new(),
                engine_version: String::new(),
                description: None,
                stylesheet_raw: None,
            },
            attributes: HashMap::new(),
            key_index_offset: 0,
        }
    }

    fn raw_key_block(keys: &[(u64, &str)]) -> (Vec<u8>, u64) {
        let mut data = Vec::new();
        for (offset, text) in keys {
            data.extend_from_slice(&offset.to_be_bytes());
            data.extend_from_slice(text.as_bytes());
            data.push(0);
        }
        let mut block = 0u32.to_le_bytes().to_vec();
        block.extend_from_slice(&adler32_slice(&data).to_be_bytes());
        block.extend_from_slice(&data);
        (block, data.len() as u64)
    }

    /// A v2 key index holding one uncompressed key block.
    fn v2_key_index(keys: &[(u64, &str)], info_tag: u32) -> Vec<u8> {
        let n = keys.len() as u64;
        v2_key_index_with_counts(keys, info_tag, Counts { blocks: 1, entries: n, block_entries: n })
    }

    /// Declared counts: header block count, header entry count and the
    /// entry count recorded for the single key block.
    struct Counts {
        blocks: u64,
        entries: u64,
        block_entries: u64,
    }

    fn v2_key_index_with_counts(keys: &[(u64, &str)], info_tag: u32, counts: Counts) -> Vec<u8> {
        let (block, decomp) = raw_key_block(keys);
        let (first, last) = (keys[0].1, keys[keys.len() - 1].1);

        let mut info = Vec::new();
        info.extend_from_slice(&counts.block_entries.to_be_bytes());
        for text in [first, last] {
            info.extend_from_slice(&(text.len() as u16).to_be_bytes());
            info.extend_from_slice(text.as_bytes());
            info.push(0);
        }
        info.extend_from_slice(&(block.len() as u64).to_be_bytes());
        info.extend_from_slice(&decomp.to_be_bytes());

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&info).unwrap();
        let mut info_section = info_tag.to_le_bytes().to_vec();
        info_section.extend_from_slice(&adler32_slice(&info).to_be_bytes());
        info_section.extend_from_slice(&encoder.finish().unwrap());

        let mut fields = Vec::new();
        for n in [counts.blocks, counts.entries, info.len() as u64, info_section.len() as u64, block.len() as u64] {
            fields.extend_from_slice(&n.to_be_bytes());
        }

        let mut out = fields.clone();
        out.extend_from_slice(&adler32_slice(&fields).to_be_bytes());
        out.extend_from_slice(&info_section);
        out.extend_from_slice(&block);
        out
    }

    #[test]
    fn parses_v2_key_index() {
        let bytes = v2_key_index(&[(0, "able"), (5, "about")], 2);
        let total = bytes.len() as u64;
        let index = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::None)).unwrap();
        assert_eq!(index.info.num_entries, 2);
        assert_eq!(index.blocks.len(), 1);
        assert_eq!(index.entries[1], KeyEntry { record_offset: 5, text: "about".into() });
        assert_eq!(index.end_offset, total);
    }

    #[test]
    fn encrypted_fields_need_a_credential() {
        let bytes = v2_key_index(&[(0, "able")], 2);
        let err = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::PayloadEncrypted));
        assert!(matches!(err, Err(MdictError::CredentialRequired)));
    }

    #[test]
    fn field_checksum_is_verified() {
        let mut bytes = v2_key_index(&[(0, "able")], 2);
        bytes[40] ^= 0x01;
        let err = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::None));
        assert!(matches!(err, Err(MdictError::CorruptIndexHeader(_))));
    }

    #[test]
    fn key_block_info_must_be_zlib() {
        let bytes = v2_key_index(&[(0, "able")], 0);
        let err = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::None));
        assert!(matches!(err, Err(MdictError::CorruptIndexHeader(_))));
    }

    #[test]
    fn declared_block_count_must_match_info_records() {
        let keys = [(0, "able"), (5, "about")];
        let bytes = v2_key_index_with_counts(&keys, 2, Counts { blocks: 2, entries: 2, block_entries: 2 });
        let err = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::None));
        assert!(matches!(
            err,
            Err(MdictError::IndexCountMismatch { item_type: "key blocks", expected: 2, found: 1 })
        ));
    }

    #[test]
    fn per_block_entry_counts_must_sum_to_declared_total() {
        let keys = [(0, "able"), (5, "about")];
        let bytes = v2_key_index_with_counts(&keys, 2, Counts { blocks: 1, entries: 2, block_entries: 3 });
        let err = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::None));
        assert!(matches!(
            err,
            Err(MdictError::IndexCountMismatch {
                item_type: "key entries in key block info",
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn decoded_keys_must_match_declared_total() {
        let keys = [(0, "able"), (5, "about")];
        let bytes = v2_key_index_with_counts(&keys, 2, Counts { blocks: 1, entries: 3, block_entries: 3 });
        let err = parse(&mut Cursor::new(bytes), &header(MdictVersion::V2, EncryptionMode::None));
        assert!(matches!(
            err,
            Err(MdictError::IndexCountMismatch { item_type: "decoded key entries", expected: 3, found: 2 })
        ));
    }

    #[test]
    fn parses_v1_key_index() {
        let (block, decomp) = {
            let mut data = Vec::new();
            for (offset, text) in [(0u32, "a"), (3, "b")] {
                data.extend_from_slice(&offset.to_be_bytes());
                data.extend_from_slice(text.as_bytes());
                data.push(0);
            }
            let mut block = 0u32.to_le_bytes().to_vec();
            block.extend_from_slice(&adler32_slice(&data).to_be_bytes());
            block.extend_from_slice(&data);
            (block, data.len() as u32)
        };
        let mut info = 2u32.to_be_bytes().to_vec();
        info.extend_from_slice(&[1, b'a', 1, b'b']);
        info.extend_from_slice(&(block.len() as u32).to_be_bytes());
        info.extend_from_slice(&decomp.to_be_bytes());

        let mut bytes = Vec::new();
        for n in [1u32, 2, info.len() as u32, block.len() as u32] {
            bytes.extend_from_slice(&n.to_be_bytes());
        }
        bytes.extend_from_slice(&info);
        bytes.extend_from_slice(&block);

        let index = parse(&mut Cursor::new(bytes), &header(MdictVersion::V1, EncryptionMode::None)).unwrap();
        let texts: Vec<_> = index.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["a", "b"]);
        assert_eq!(index.info.key_info_decomp_len, None);
    }
}
