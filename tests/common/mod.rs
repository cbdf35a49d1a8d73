//! Writes small MDict containers for the integration tests.
//!
//! Every layout knob the reader cares about is configurable: engine version,
//! key text encoding, block compression, encryption flags, stylesheet and how
//! many keys/records go into each block.
#![allow(dead_code)]

use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use adler2::adler32_slice;
use encoding_rs::GB18030;
use flate2::{Compression, write::ZlibEncoder};
use mdict_index::Credential;
use mdict_index::mdict::codec::crypto;

pub const RAW: u32 = 0;
pub const LZO: u32 = 1;
pub const ZLIB: u32 = 2;

/// Master key of every encrypted fixture.
pub const MASTER_KEY: [u8; 16] = *b"fixture-master-k";
pub const USER_ID: &str = "reader@example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16,
    Gbk,
}

impl TextEncoding {
    fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16 => "UTF-16",
            TextEncoding::Gbk => "GBK",
        }
    }

    fn unit(self) -> usize {
        match self {
            TextEncoding::Utf16 => 2,
            _ => 1,
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16 => utf16le(text),
            TextEncoding::Gbk => GB18030.encode(text).0.into_owned(),
        }
    }
}

#[derive(Debug, Clone)]
enum Record {
    Text(String),
    Bytes(Vec<u8>),
}

/// Byte ranges of the stored blocks inside the written file.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub key_blocks: Vec<Range<usize>>,
    pub record_blocks: Vec<Range<usize>>,
}

#[derive(Debug, Clone)]
pub struct Fixture {
    engine_version: &'static str,
    encoding: TextEncoding,
    declared_encoding: Option<&'static str>,
    key_compression: u32,
    record_compression: u32,
    encrypted: u8,
    register_by_email: bool,
    stylesheet: Option<String>,
    keys_per_block: usize,
    records_per_block: usize,
    entries: Vec<(String, Record)>,
}

impl Fixture {
    /// A v2 UTF-8 dictionary with text records, two keys and records per block.
    pub fn mdx(entries: &[(&str, &str)]) -> Self {
        Self::with_entries(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), Record::Text(v.to_string())))
                .collect(),
        )
    }

    /// A v2 resource container with UTF-16 keys and binary records.
    pub fn mdd(entries: &[(&str, &[u8])]) -> Self {
        let mut fixture = Self::with_entries(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), Record::Bytes(v.to_vec())))
                .collect(),
        );
        fixture.encoding = TextEncoding::Utf16;
        fixture
    }

    fn with_entries(entries: Vec<(String, Record)>) -> Self {
        Self {
            engine_version: "2.0",
            encoding: TextEncoding::Utf8,
            declared_encoding: None,
            key_compression: ZLIB,
            record_compression: ZLIB,
            encrypted: 0,
            register_by_email: true,
            stylesheet: None,
            keys_per_block: 2,
            records_per_block: 2,
            entries,
        }
    }

    pub fn version(mut self, engine_version: &'static str) -> Self {
        self.engine_version = engine_version;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Encoding label written to the header, when it should differ from the data.
    pub fn declared_encoding(mut self, label: &'static str) -> Self {
        self.declared_encoding = Some(label);
        self
    }

    /// Compression tag for both key and record blocks.
    pub fn compression(mut self, tag: u32) -> Self {
        self.key_compression = tag;
        self.record_compression = tag;
        self
    }

    pub fn record_compression(mut self, tag: u32) -> Self {
        self.record_compression = tag;
        self
    }

    pub fn encrypted(mut self, flags: u8) -> Self {
        self.encrypted = flags;
        self
    }

    pub fn register_by_device(mut self) -> Self {
        self.register_by_email = false;
        self
    }

    pub fn stylesheet(mut self, sheet: &str) -> Self {
        self.stylesheet = Some(sheet.to_string());
        self
    }

    pub fn keys_per_block(mut self, n: usize) -> Self {
        self.keys_per_block = n;
        self
    }

    pub fn records_per_block(mut self, n: usize) -> Self {
        self.records_per_block = n;
        self
    }

    /// The credential that unlocks this fixture when it is encrypted.
    pub fn credential(&self) -> Credential {
        let digest = if self.register_by_email {
            crypto::ripemd128(&utf16le(USER_ID))
        } else {
            crypto::ripemd128(USER_ID.as_bytes())
        };
        let mut reg_code = MASTER_KEY;
        crypto::salsa_decrypt(&mut reg_code, &digest);
        Credential::new(reg_code.to_vec(), USER_ID)
    }

    /// The stored bytes of entry `i`'s record, as `lookup_raw` returns them.
    pub fn record_bytes(&self, i: usize) -> Vec<u8> {
        match &self.entries[i].1 {
            Record::Text(text) => {
                let mut bytes = self.encoding.encode(text);
                bytes.extend(std::iter::repeat_n(0u8, self.encoding.unit()));
                bytes
            }
            Record::Bytes(bytes) => bytes.clone(),
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn is_v2(&self) -> bool {
        self.engine_version.parse::<f32>().map_or(true, |v| v >= 2.0)
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build().0).expect("write fixture");
        path
    }

    /// Writes the fixture and returns the path and block layout.
    pub fn write_with_layout(&self, dir: &Path, name: &str) -> (PathBuf, Layout) {
        let path = dir.join(name);
        let (bytes, layout) = self.build();
        std::fs::write(&path, bytes).expect("write fixture");
        (path, layout)
    }

    pub fn build(&self) -> (Vec<u8>, Layout) {
        let v2 = self.is_v2();
        let records: Vec<Vec<u8>> = (0..self.entries.len()).map(|i| self.record_bytes(i)).collect();

        let mut offsets = Vec::with_capacity(records.len());
        let mut cumulative = 0u64;
        for record in &records {
            offsets.push(cumulative);
            cumulative += record.len() as u64;
        }

        let mut out = self.header_bytes();
        let mut layout = Layout::default();

        // Key blocks and their info records
        let keyed: Vec<(u64, &str)> = offsets
            .iter()
            .zip(&self.entries)
            .map(|(&offset, (key, _))| (offset, key.as_str()))
            .collect();
        let mut key_info = Vec::new();
        let mut key_section = Vec::new();
        let mut key_block_ranges = Vec::new();
        for chunk in keyed.chunks(self.keys_per_block) {
            let mut plain = Vec::new();
            for (offset, key) in chunk {
                write_number(&mut plain, *offset, v2);
                plain.extend(self.encoding.encode(key));
                plain.extend(std::iter::repeat_n(0u8, self.encoding.unit()));
            }
            let block = compress_block(self.key_compression, &plain);

            write_number(&mut key_info, chunk.len() as u64, v2);
            self.write_info_text(&mut key_info, chunk[0].1, v2);
            self.write_info_text(&mut key_info, chunk[chunk.len() - 1].1, v2);
            write_number(&mut key_info, block.len() as u64, v2);
            write_number(&mut key_info, plain.len() as u64, v2);

            key_block_ranges.push(key_section.len()..key_section.len() + block.len());
            key_section.extend(block);
        }

        let key_info_section = if v2 {
            let checksum = adler32_slice(&key_info).to_be_bytes();
            let mut payload = zlib(&key_info);
            if self.encrypted & 2 != 0 {
                let mut seed = checksum.to_vec();
                seed.extend_from_slice(&0x3695u32.to_le_bytes());
                fast_encrypt(&mut payload, &crypto::ripemd128(&seed));
            }
            let mut section = ZLIB.to_le_bytes().to_vec();
            section.extend_from_slice(&checksum);
            section.extend(payload);
            section
        } else {
            key_info.clone()
        };

        let num_key_blocks = key_block_ranges.len() as u64;
        let num_entries = self.entries.len() as u64;
        let fields: Vec<u64> = if v2 {
            vec![
                num_key_blocks,
                num_entries,
                key_info.len() as u64,
                key_info_section.len() as u64,
                key_section.len() as u64,
            ]
        } else {
            vec![
                num_key_blocks,
                num_entries,
                key_info_section.len() as u64,
                key_section.len() as u64,
            ]
        };
        let mut field_bytes = Vec::new();
        for n in fields {
            write_number(&mut field_bytes, n, v2);
        }
        let field_checksum = adler32_slice(&field_bytes);
        if self.encrypted & 1 != 0 {
            crypto::salsa_decrypt(&mut field_bytes, &MASTER_KEY);
        }
        out.extend(field_bytes);
        if v2 {
            out.extend_from_slice(&field_checksum.to_be_bytes());
        }
        out.extend(key_info_section);
        let key_section_start = out.len();
        layout.key_blocks = key_block_ranges
            .into_iter()
            .map(|r| r.start + key_section_start..r.end + key_section_start)
            .collect();
        out.extend(key_section);

        // Record blocks
        let mut pairs = Vec::new();
        let mut record_section = Vec::new();
        let mut record_block_ranges = Vec::new();
        for chunk in records.chunks(self.records_per_block) {
            let plain = chunk.concat();
            let block = compress_block(self.record_compression, &plain);
            pairs.push((block.len() as u64, plain.len() as u64));
            record_block_ranges.push(record_section.len()..record_section.len() + block.len());
            record_section.extend(block);
        }

        let width = if v2 { 8 } else { 4 };
        write_number(&mut out, pairs.len() as u64, v2);
        write_number(&mut out, num_entries, v2);
        write_number(&mut out, (pairs.len() * 2 * width) as u64, v2);
        write_number(&mut out, record_section.len() as u64, v2);
        for (compressed, decompressed) in pairs {
            write_number(&mut out, compressed, v2);
            write_number(&mut out, decompressed, v2);
        }
        let record_section_start = out.len();
        layout.record_blocks = record_block_ranges
            .into_iter()
            .map(|r| r.start + record_section_start..r.end + record_section_start)
            .collect();
        out.extend(record_section);

        (out, layout)
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut xml = format!(
            r#"<Dictionary GeneratedByEngineVersion="{}" RequiredEngineVersion="{}" Encrypted="{}" Encoding="{}" Format="Html" Title="Fixture Dictionary" Description="Generated for tests" RegisterBy="{}""#,
            self.engine_version,
            self.engine_version,
            self.encrypted,
            self.declared_encoding.unwrap_or(self.encoding.label()),
            if self.register_by_email { "EMail" } else { "DeviceID" },
        );
        if let Some(sheet) = &self.stylesheet {
            xml.push_str(&format!(r#" StyleSheet="{}""#, escape_attribute(sheet)));
        }
        xml.push_str("/>\r\n");

        let mut text = utf16le(&xml);
        text.extend_from_slice(&[0, 0]);
        let mut out = (text.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&text);
        out.extend_from_slice(&adler32_slice(&text).to_le_bytes());
        out
    }

    fn write_info_text(&self, out: &mut Vec<u8>, text: &str, v2: bool) {
        let bytes = self.encoding.encode(text);
        let units = bytes.len() / self.encoding.unit();
        if v2 {
            out.extend_from_slice(&(units as u16).to_be_bytes());
        } else {
            out.push(units as u8);
        }
        out.extend(bytes);
        if v2 {
            out.extend(std::iter::repeat_n(0u8, self.encoding.unit()));
        }
    }
}

pub fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn write_number(out: &mut Vec<u8>, n: u64, v2: bool) {
    if v2 {
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        out.extend_from_slice(&(n as u32).to_be_bytes());
    }
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("zlib write");
    encoder.finish().expect("zlib finish")
}

fn compress_block(tag: u32, plain: &[u8]) -> Vec<u8> {
    let payload = match tag {
        RAW => plain.to_vec(),
        LZO => lzokay::compress::compress(plain).expect("lzo compress"),
        ZLIB => zlib(plain),
        other => panic!("fixture cannot write compression tag {}", other),
    };
    let mut block = tag.to_le_bytes().to_vec();
    block.extend_from_slice(&adler32_slice(plain).to_be_bytes());
    block.extend(payload);
    block
}

/// Inverse of the reader's fast decryption.
fn fast_encrypt(data: &mut [u8], key: &[u8; 16]) {
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let cipher = (*byte ^ prev ^ (i as u8) ^ key[i % key.len()]).rotate_left(4);
        *byte = cipher;
        prev = cipher;
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
}

/// Handy dictionary used by several tests.
pub fn sample_entries() -> Vec<(&'static str, &'static str)> {
    vec![
        ("able", "having the power to do something"),
        ("about", "on the subject of"),
        ("apple", "a round fruit"),
        ("bank", "the land alongside a river"),
        ("zebra", "a striped animal"),
    ]
}
