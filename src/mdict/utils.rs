//! Low-level byte reading utilities

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use encoding_rs::{Encoding, GB18030, UTF_8, UTF_16BE, UTF_16LE};
use log::warn;

use super::types::error::{MdictError, Result};
use super::types::models::MdictEncoding;

/// Read a 4 or 8 byte big-endian number.
///
/// Used throughout MDict format for size and count fields.
/// Width depends on format version (v1.x uses 4 bytes, v2.x uses 8 bytes).
pub fn read_number(reader: &mut impl Read, number_width: usize) -> Result<u64> {
    match number_width {
        8 => Ok(reader.read_u64::<BigEndian>()?),
        4 => Ok(reader.read_u32::<BigEndian>()? as u64),
        _ => Err(MdictError::InvalidFormat(format!("Invalid number width: {}", number_width))),
    }
}

/// Read a 1 or 2 byte big-endian number.
///
/// Used for text length prefixes in MDict format.
pub fn read_small_number(reader: &mut impl Read, number_width: usize) -> Result<u64> {
    match number_width {
        2 => Ok(reader.read_u16::<BigEndian>()? as u64),
        1 => Ok(reader.read_u8()? as u64),
        _ => Err(MdictError::InvalidFormat(format!(
            "Invalid small number width: {}",
            number_width
        ))),
    }
}

/// Reads a section whose length comes from the file itself.
///
/// The length is checked against the bytes left in the file before
/// allocating, so a corrupt size field fails cleanly instead of exhausting
/// memory.
pub fn read_section<R: Read + Seek>(
    file: &mut R,
    len: u64,
    context: &'static str,
) -> Result<Vec<u8>> {
    let position = file.stream_position()?;
    let file_len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(position))?;

    let available = file_len.saturating_sub(position);
    if len > available {
        return Err(MdictError::SizeMismatch {
            context,
            expected: len,
            found: available,
        });
    }

    let mut section = vec![0u8; len as usize];
    file.read_exact(&mut section)?;
    Ok(section)
}

/// Resolves an encoding label from a header or caller.
///
/// `GBK` and `GB2312` are widened to `GB18030`; an empty or unknown label
/// falls back to UTF-8.
pub fn parse_encoding(label: &str) -> MdictEncoding {
    let label = label.trim();
    if label.is_empty() {
        return UTF_8;
    }
    if label.eq_ignore_ascii_case("GBK") || label.eq_ignore_ascii_case("GB2312") {
        return GB18030;
    }
    Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
        warn!("Unknown encoding label '{}', falling back to UTF-8", label);
        UTF_8
    })
}

/// Bytes per text unit: 2 for UTF-16, 1 for everything else.
pub fn unit_width(encoding: MdictEncoding) -> usize {
    if encoding == UTF_16LE || encoding == UTF_16BE { 2 } else { 1 }
}
