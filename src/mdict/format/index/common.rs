//! Helpers shared by the key and record index parsers.

use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{MdictEncoding, MdictVersion};
use crate::mdict::utils;

/// Skips a length-prefixed head/tail text field of a key block info record.
///
/// The prefix counts characters, not bytes: the byte length is the count
/// (plus one terminator from v2 on) times the encoding's unit width.
pub fn skip_text(reader: &mut &[u8], version: MdictVersion, encoding: MdictEncoding) -> Result<()> {
    let text_len_units = utils::read_small_number(reader, version.small_number_width())?;
    let total_units = text_len_units + version.text_terminator_units();
    let total_bytes = total_units as usize * utils::unit_width(encoding);

    if reader.len() < total_bytes {
        return Err(MdictError::InvalidFormat(format!(
            "Incomplete key text in key block info: need {} bytes, {} left",
            total_bytes,
            reader.len()
        )));
    }

    *reader = &reader[total_bytes..];
    Ok(())
}
