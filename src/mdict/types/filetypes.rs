//! Specialization logic for MDict file types (.mdx vs .mdd).

use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_16LE};
use regex::Regex;

use super::error::Result;
use super::models::StyleSheet;

/// Compiled regex for stylesheet markers such as `` `1` `` or `` `42` ``.
static STYLE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn style_regex() -> &'static Regex {
    STYLE_PATTERN.get_or_init(|| Regex::new(r"`((?-u:\d)+)`").expect("Invalid stylesheet regex pattern"))
}

/// Applies stylesheet substitution to record text.
///
/// Each `` `N` `` marker styles the span up to the next marker (or the end of
/// the text): the span is wrapped in rule `N`'s prefix and suffix. A span that
/// ends with a newline is right-trimmed and followed by `\r\n` after the
/// suffix. Text before the first marker is copied unchanged; an unknown tag
/// id leaves its span unwrapped.
pub fn substitute_stylesheet(text: &str, stylesheet: &StyleSheet) -> String {
    let re = style_regex();
    let markers: Vec<(usize, usize, &str)> = re
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            Some((whole.start(), whole.end(), cap.get(1)?.as_str()))
        })
        .collect();

    let Some(&(first_start, _, _)) = markers.first() else {
        return text.to_string();
    };

    let mut result = String::with_capacity(text.len() * 2);
    result.push_str(&text[..first_start]);

    for (i, &(_, span_start, tag)) in markers.iter().enumerate() {
        let span_end = markers.get(i + 1).map_or(text.len(), |next| next.0);
        let span = &text[span_start..span_end];
        let (prefix, suffix) = stylesheet
            .get(tag)
            .map_or(("", ""), |rule| (rule.prefix.as_str(), rule.suffix.as_str()));

        if span.ends_with('\n') {
            result.push_str(prefix);
            result.push_str(span.trim_end());
            result.push_str(suffix);
            result.push_str("\r\n");
        } else {
            result.push_str(prefix);
            result.push_str(span);
            result.push_str(suffix);
        }
    }

    result
}

/// A trait that defines the behavior of a specific MDict file type (MDX or MDD).
pub trait FileType {
    /// A short name used for debugging and logging.
    const DEBUG_NAME: &'static str;

    /// The type of record data contained in this file.
    /// - `String` for MDX files.
    /// - `Vec<u8>` for MDD files.
    type Record;

    /// The mandatory encoding for this file type, if any.
    ///
    /// - `None`: Use the encoding specified in the file header. (MDX behavior)
    /// - `Some(encoding)`: Always use this encoding instead of the header. (MDD behavior)
    const ENCODING_OVERRIDE: Option<&'static Encoding>;

    /// Processes raw record bytes into the final record type.
    ///
    /// `stylesheet` is `None` when substitution is disabled or the header
    /// declares no stylesheet.
    fn process_record(
        bytes: &[u8],
        encoding: &'static Encoding,
        stylesheet: Option<&StyleSheet>,
    ) -> Result<Self::Record>;
}

/// Zero-cost marker struct for MDX files.
#[derive(Debug)]
pub struct Mdx;

impl FileType for Mdx {
    const DEBUG_NAME: &'static str = "MDX";
    type Record = String;
    const ENCODING_OVERRIDE: Option<&'static Encoding> = None;

    fn process_record(
        bytes: &[u8],
        encoding: &'static Encoding,
        stylesheet: Option<&StyleSheet>,
    ) -> Result<Self::Record> {
        let (text, _, _) = encoding.decode(bytes);

        // Strip null terminators
        let content = text.trim_end_matches('\0');

        Ok(match stylesheet {
            Some(styles) if !styles.is_empty() => substitute_stylesheet(content, styles),
            _ => content.to_owned(),
        })
    }
}

/// Zero-cost marker struct for MDD files.
#[derive(Debug)]
pub struct Mdd;

impl FileType for Mdd {
    const DEBUG_NAME: &'static str = "MDD";
    type Record = Vec<u8>;
    const ENCODING_OVERRIDE: Option<&'static Encoding> = Some(UTF_16LE);

    fn process_record(
        bytes: &[u8],
        _encoding: &'static Encoding,
        _stylesheet: Option<&StyleSheet>,
    ) -> Result<Self::Record> {
        // MDD bytes are the final record.
        Ok(bytes.to_vec())
    }
}
