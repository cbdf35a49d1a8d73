//! MDict file header parsing and master key derivation.
//!
//! This module handles:
//! - Validating the header checksum
//! - Parsing the XML attribute blob into a flat map
//! - Extracting version, encoding, encryption mode and stylesheet
//! - Deriving the master decryption key from a credential

use std::collections::HashMap;
use std::io::{Read, Seek};

use adler2::adler32_slice;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use log::{debug, info, trace, warn};
use quick_xml::{Reader, events::Event};

use crate::mdict::codec::crypto;
use crate::mdict::types::{
    error::{MdictError, Result},
    models::{
        EncryptionMode, MasterKey, MdictHeader, MdictMetadata, MdictVersion, RegisterBy,
        StyleRule, StyleSheet,
    },
    options::Credential,
};
use crate::mdict::utils;

/// Parses the MDict file header from the beginning of the file.
///
/// # Header Structure
/// ```text
/// [4 bytes] Header length (big-endian u32)
/// [N bytes] XML metadata (UTF-16LE, ending with \x00\x00)
/// [4 bytes] Adler32 checksum (little-endian u32)
/// ```
///
/// On return the reader is positioned at the start of the key index section,
/// whose offset is also recorded in [`MdictHeader::key_index_offset`].
///
/// The master key is derived only when the container needs one (encryption
/// bit 0) and a credential was supplied. A missing credential is reported
/// later, when the key index is actually read.
pub fn parse<R: Read + Seek>(
    file: &mut R,
    credential: Option<&Credential>,
) -> Result<MdictHeader> {
    info!("Parsing MDict header");

    let header_len = file.read_u32::<BigEndian>()?;
    trace!("Header length: {} bytes", header_len);

    let header_bytes = utils::read_section(file, header_len as u64, "header")?;

    let checksum_expected = file.read_u32::<LittleEndian>()?;
    let checksum_actual = adler32_slice(&header_bytes);
    trace!(
        "Header checksum: expected={:#010x}, actual={:#010x}",
        checksum_expected, checksum_actual
    );
    if checksum_actual != checksum_expected {
        return Err(MdictError::CorruptHeader {
            expected: checksum_expected,
            actual: checksum_actual,
        });
    }

    let key_index_offset = file.stream_position()?;

    let text_bytes = header_bytes
        .strip_suffix(&[0, 0])
        .unwrap_or(header_bytes.as_slice());
    let (decoded, _, had_errors) = UTF_16LE.decode(text_bytes);
    if had_errors {
        warn!("Header text contains invalid UTF-16 sequences");
    }

    // Remove control characters except whitespace before handing to the XML reader
    let sanitized: String = decoded
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let attributes = parse_xml_attributes(&sanitized)?;
    let mut header = build_header_from_attributes(attributes, key_index_offset)?;
    header.master_key = try_derive_master_key(&header, credential)?;

    info!(
        "Header parsed successfully: version={}, title='{}', encoding={}, encryption={:?}, styles={}",
        header.metadata.engine_version,
        header.metadata.title,
        header.encoding.name(),
        header.encryption,
        header.stylesheet.len()
    );

    Ok(header)
}

/// Extracts all attributes from the root XML element.
///
/// The MDict header is a single XML element with all metadata as attributes.
fn parse_xml_attributes(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e
                    .attributes()
                    .map(|attr_result| {
                        let attr = attr_result.map_err(|e| {
                            MdictError::MalformedHeader(format!("Failed to parse XML attribute: {}", e))
                        })?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|e| {
                                MdictError::MalformedHeader(format!("Failed to decode XML value: {}", e))
                            })?
                            .into_owned();
                        Ok((key, value))
                    })
                    .collect();
            }
            Ok(Event::Eof) => {
                return Err(MdictError::MalformedHeader(
                    "No root element found in header XML".to_string(),
                ));
            }
            Err(e) => {
                return Err(MdictError::MalformedHeader(format!("Failed to read header XML: {}", e)));
            }
            _ => {}
        }
    }
}

/// Builds the typed header from the raw attribute map.
fn build_header_from_attributes(
    attributes: HashMap<String, String>,
    key_index_offset: u64,
) -> Result<MdictHeader> {
    let version_str = attributes
        .get("GeneratedByEngineVersion")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "1.0".to_string());
    let version_f32: f32 = version_str.parse().map_err(|e| {
        MdictError::MalformedHeader(format!("Could not parse 'GeneratedByEngineVersion': {}", e))
    })?;
    let version = MdictVersion::try_from(version_f32)?;
    debug!("MDict version: {} (parsed as {:?})", version_str, version);

    let encoding = attributes
        .get("Encoding")
        .map(|s| utils::parse_encoding(s))
        .unwrap_or(encoding_rs::UTF_8);
    debug!("Header text encoding: {}", encoding.name());

    let encryption = parse_encryption(attributes.get("Encrypted").map(String::as_str))?;
    debug!("Encryption mode: {:?}", encryption);

    let register_by = match attributes.get("RegisterBy").map(String::as_str) {
        Some(by) if by.eq_ignore_ascii_case("EMail") => RegisterBy::Email,
        _ => RegisterBy::DeviceId,
    };

    let stylesheet_raw = attributes.get("StyleSheet").cloned();
    let stylesheet = stylesheet_raw
        .as_deref()
        .map(parse_stylesheet)
        .unwrap_or_default();

    let metadata = MdictMetadata {
        title: attributes
            .get("Title")
            .cloned()
            .unwrap_or_else(|| "Untitled Dictionary".to_string()),
        engine_version: version_str,
        description: attributes.get("Description").cloned(),
        stylesheet_raw,
    };

    Ok(MdictHeader {
        version,
        encoding,
        encryption,
        register_by,
        master_key: None,
        stylesheet,
        metadata,
        attributes,
        key_index_offset,
    })
}

/// `"No"` or absent → none, `"Yes"` → bit 0, anything else is the bitmask itself.
fn parse_encryption(value: Option<&str>) -> Result<EncryptionMode> {
    match value.map(str::trim) {
        None | Some("No") | Some("") => Ok(EncryptionMode::None),
        Some("Yes") => Ok(EncryptionMode::PayloadEncrypted),
        Some(other) => other
            .parse::<u8>()
            .map(EncryptionMode::from_bits)
            .map_err(|_| MdictError::MalformedHeader(format!("Invalid 'Encrypted' value: {}", other))),
    }
}

/// Parses the `StyleSheet` attribute: repeating groups of three lines
/// (tag id, prefix, suffix).
fn parse_stylesheet(raw: &str) -> StyleSheet {
    let lines: Vec<&str> = raw.lines().collect();
    let mut sheet = StyleSheet::new();

    for group in lines.chunks(3) {
        let [id, prefix, suffix] = group else {
            warn!("Ignoring incomplete stylesheet entry: {:?}", group);
            continue;
        };
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            warn!("Ignoring stylesheet entry with non-numeric id '{}'", id);
            continue;
        }
        sheet.insert(
            id.to_string(),
            StyleRule {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
        );
    }

    debug!("Parsed {} stylesheet rules", sheet.len());
    sheet
}

fn try_derive_master_key(header: &MdictHeader, credential: Option<&Credential>) -> Result<MasterKey> {
    let Some(credential) = credential else {
        return Ok(None);
    };
    if !header.encryption.payload_encrypted() {
        debug!("Credential supplied but the key index is not encrypted; ignoring it");
        return Ok(None);
    }

    info!("Deriving master decryption key from provided credential");
    let master_key =
        crypto::derive_master_key(credential.reg_code(), credential.user_id(), header.register_by)?;
    Ok(Some(master_key))
}
