//! Core data structures for MDict format components.
//!
//! This module defines the fundamental types used throughout the library:
//! - File metadata and headers
//! - Block, key and locator information
//! - Version, encryption and compression enumerations

use std::collections::HashMap;

use encoding_rs::Encoding;

use super::error::{MdictError, Result};

/// Text encoding used for keys and records.
pub type MdictEncoding = &'static Encoding;

/// 16-byte master key derived from a credential, if any.
pub type MasterKey = Option<[u8; 16]>;

/// Encryption mode parsed from the `Encrypted` header attribute.
///
/// The attribute is a bitmask:
/// - Bit 0x01: the key index header fields are Salsa20/8-encrypted with the
///   user's master key (requires a credential)
/// - Bit 0x02: the key block info section is encrypted with a key derived
///   from its own checksum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncryptionMode {
    #[default]
    None,
    PayloadEncrypted,
    IndexEncrypted,
    Both,
}

impl EncryptionMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0x00 => EncryptionMode::None,
            0x01 => EncryptionMode::PayloadEncrypted,
            0x02 => EncryptionMode::IndexEncrypted,
            _ => EncryptionMode::Both,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            EncryptionMode::None => 0x00,
            EncryptionMode::PayloadEncrypted => 0x01,
            EncryptionMode::IndexEncrypted => 0x02,
            EncryptionMode::Both => 0x03,
        }
    }

    /// Whether the key index header fields need the master key.
    pub fn payload_encrypted(&self) -> bool {
        matches!(self, EncryptionMode::PayloadEncrypted | EncryptionMode::Both)
    }

    /// Whether the key block info section is fast-encrypted.
    pub fn index_encrypted(&self) -> bool {
        matches!(self, EncryptionMode::IndexEncrypted | EncryptionMode::Both)
    }
}

/// Which user identifier the registration code was issued against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegisterBy {
    /// The identifier is an e-mail address, hashed as UTF-16LE.
    Email,
    /// The identifier is a device id, hashed as its raw bytes.
    #[default]
    DeviceId,
}

/// One stylesheet entry: text inserted before and after a styled span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub prefix: String,
    pub suffix: String,
}

/// Stylesheet rules keyed by their numeric tag id.
pub type StyleSheet = HashMap<String, StyleRule>;

/// User-visible metadata carried by the header.
#[derive(Debug, Clone)]
pub struct MdictMetadata {
    pub title: String,
    pub engine_version: String,
    pub description: Option<String>,
    pub stylesheet_raw: Option<String>,
}

/// Complete parsed header from an MDict file.
///
/// Contains everything needed to parse the rest of the file: version-driven
/// number widths, text encoding, encryption mode and the master key.
#[derive(Debug)]
pub struct MdictHeader {
    pub version: MdictVersion,
    pub encoding: MdictEncoding,
    pub encryption: EncryptionMode,
    pub register_by: RegisterBy,
    /// Master decryption key derived from the credential.
    /// `None` if the file needs none or no credential was provided.
    pub master_key: MasterKey,
    pub stylesheet: StyleSheet,
    pub metadata: MdictMetadata,
    /// Every attribute of the header root element, verbatim.
    pub attributes: HashMap<String, String>,
    /// Absolute file offset of the key index section (right after the header checksum).
    pub key_index_offset: u64,
}

impl MdictHeader {
    /// Returns `true` if record text should go through stylesheet substitution.
    pub fn has_stylesheet(&self) -> bool {
        !self.stylesheet.is_empty()
    }
}

/// Counts and sizes from the key index header.
#[derive(Debug, Clone, Copy)]
pub struct KeyBlockInfo {
    pub num_key_blocks: u64,
    pub num_entries: u64,
    /// Only present in v2.0+ (decompressed size of key block info)
    pub key_info_decomp_len: Option<u64>,
    pub key_info_comp_len: u64,
    pub key_blocks_len: u64,
}

/// Counts and sizes from the record index header.
#[derive(Debug, Clone, Copy)]
pub struct RecordBlockInfo {
    pub num_record_blocks: u64,
    pub num_entries: u64,
    pub record_info_len: u64,
    pub record_blocks_len: u64,
}

/// A single key entry from the dictionary index.
///
/// Associates a search key (word/term) with the offset of its record in the
/// virtual concatenation of all decompressed record blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub record_offset: u64,
    pub text: String,
}

/// Metadata describing a single compressed data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    /// Size of the block as stored in the file, sub-header included (bytes).
    pub compressed_size: u64,
    /// Size of the block after decompression (bytes).
    pub decompressed_size: u64,
    /// Absolute byte offset where this block begins in the file.
    pub file_offset: u64,
    /// Offset of this block in the virtual concatenated decompressed stream.
    pub decompressed_offset: u64,
}

/// Where one key's record lives: the containing block plus a slice of its
/// decompressed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocator {
    pub start: u64,
    pub end: u64,
    pub block: BlockMeta,
}

impl RecordLocator {
    /// Length of the record in bytes.
    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdictVersion {
    V1,
    V2,
}

impl MdictVersion {
    /// Returns the byte width for numeric fields in this MDict version.
    ///
    /// - V1: 4 bytes (u32)
    /// - V2: 8 bytes (u64)
    pub fn number_width(&self) -> usize {
        match self {
            MdictVersion::V1 => 4,
            MdictVersion::V2 => 8,
        }
    }

    /// Returns the byte width for text length prefixes in this MDict version.
    ///
    /// - V1: 1 byte (u8)
    /// - V2: 2 bytes (u16)
    pub fn small_number_width(&self) -> usize {
        match self {
            MdictVersion::V1 => 1,
            MdictVersion::V2 => 2,
        }
    }

    /// Number of terminator characters after head/tail text in key block info.
    pub fn text_terminator_units(&self) -> u64 {
        match self {
            MdictVersion::V1 => 0,
            MdictVersion::V2 => 1,
        }
    }
}

impl TryFrom<f32> for MdictVersion {
    type Error = MdictError;
    fn try_from(v: f32) -> Result<Self> {
        if v < 2.0 {
            Ok(Self::V1)
        } else if v < 3.0 {
            Ok(Self::V2)
        } else {
            Err(MdictError::UnsupportedVersion(v))
        }
    }
}

/// Compression algorithm named by a block's 4-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lzo,
    Zlib,
}

impl CompressionType {
    pub fn tag(&self) -> u32 {
        match self {
            CompressionType::None => 0,
            CompressionType::Lzo => 1,
            CompressionType::Zlib => 2,
        }
    }
}

impl TryFrom<u32> for CompressionType {
    type Error = MdictError;
    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzo),
            2 => Ok(Self::Zlib),
            _ => Err(MdictError::UnknownCompressionTag(value)),
        }
    }
}
