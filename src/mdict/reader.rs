use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::format;
use super::format::content;
use super::iter::RecordIterator;
use super::types::error::{MdictError, Result};
use super::types::filetypes::FileType;
use super::types::index::{Index, IndexEntry};
use super::types::models::*;
use super::types::options::{Credential, OpenOptions};
use super::utils;

/// The main reader for MDict dictionary files.
///
/// Parses both .mdx (dictionary) and .mdd (data) files, format versions 1.x
/// and 2.x. The whole key index is built when the file is opened; record
/// blocks are read and decoded on demand.
///
/// The reader holds no open file handle. Every lookup opens its own, so a
/// shared `&MdictReader` can serve lookups from many threads at once.
#[derive(Debug)]
pub struct MdictReader<T: FileType> {
    file_path: PathBuf,
    pub header: MdictHeader,
    pub key_block_info: KeyBlockInfo,
    pub record_block_info: RecordBlockInfo,

    index: Index,
    key_blocks: Vec<BlockMeta>,
    record_blocks: Vec<BlockMeta>,
    substitute_styles: bool,
    _file_type: PhantomData<T>,
}

impl<T: FileType> MdictReader<T> {
    /// Opens a container with default options and an optional credential.
    pub fn new(path: impl AsRef<Path>, credential: Option<Credential>) -> Result<Self> {
        let mut options = OpenOptions::new();
        if let Some(credential) = credential {
            options = options.credential(credential);
        }
        Self::open(path, options)
    }

    /// Read an MDict file from the given path.
    ///
    /// Priority for determining text encoding (highest → lowest):
    /// 1. `FileType::ENCODING_OVERRIDE` (MDD always uses UTF-16LE)
    /// 2. The encoding set in `options`
    /// 3. Encoding declared in the dictionary header
    ///
    /// # Errors
    /// Returns an error if:
    /// - File cannot be opened
    /// - File format is invalid or corrupted
    /// - Unsupported version (3.0+)
    /// - The index is encrypted and no (or a wrong) credential was given
    /// - Checksum verification fails
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening {} file: {}", T::DEBUG_NAME, path.display());
        let mut file = BufReader::new(File::open(path)?);

        let mut header = format::header::parse(&mut file, options.credential.as_ref())?;

        let final_encoding = T::ENCODING_OVERRIDE
            .or_else(|| options.encoding.as_deref().map(utils::parse_encoding))
            .unwrap_or(header.encoding);
        if header.encoding != final_encoding {
            info!(
                "Text encoding overridden: header='{}', final='{}'",
                header.encoding.name(),
                final_encoding.name()
            );
        }
        header.encoding = final_encoding;

        let parsed = format::index::parse(&mut file, &header)?;

        info!(
            "MDict file opened: {} entries, {} key blocks, {} record blocks",
            parsed.index.len(),
            parsed.key_blocks.len(),
            parsed.record_blocks.len()
        );

        Ok(Self {
            file_path: path.to_path_buf(),
            header,
            key_block_info: parsed.key_info,
            record_block_info: parsed.record_info,
            index: parsed.index,
            key_blocks: parsed.key_blocks,
            record_blocks: parsed.record_blocks,
            substitute_styles: options.substitute_styles,
            _file_type: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Returns the number of key blocks.
    pub fn num_key_blocks(&self) -> usize {
        self.key_blocks.len()
    }

    /// Returns the number of record blocks.
    pub fn num_record_blocks(&self) -> usize {
        self.record_blocks.len()
    }

    /// Returns the total number of entries in the dictionary.
    pub fn num_entries(&self) -> usize {
        self.index.len()
    }

    /// O(1) membership test.
    pub fn has_key(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Every key in file order, duplicates included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.entries().iter().map(|e| e.key.text.as_str())
    }

    /// Every entry in file order.
    pub fn entries(&self) -> &[IndexEntry] {
        self.index.entries()
    }

    /// Where the record of `key` lives. The last entry wins for duplicated keys.
    pub fn locator(&self, key: &str) -> Option<&RecordLocator> {
        self.index.get(key).map(|e| &e.locator)
    }

    /// Looks up `key` and returns its processed record.
    ///
    /// - For `MdictReader<Mdx>`, this returns `Result<String>`.
    /// - For `MdictReader<Mdd>`, this returns `Result<Vec<u8>>`.
    pub fn lookup(&self, key: &str) -> Result<T::Record> {
        let bytes = self.lookup_raw(key)?;
        self.process_record(&bytes)
    }

    /// Looks up `key` and returns the record bytes before any decoding.
    pub fn lookup_raw(&self, key: &str) -> Result<Vec<u8>> {
        let entry = self
            .index
            .get(key)
            .ok_or_else(|| MdictError::KeyNotFound(key.to_string()))?;
        self.read_record_bytes(&entry.locator)
    }

    /// Returns the records of every entry named `key`, in file order.
    pub fn lookup_all(&self, key: &str) -> Result<Vec<T::Record>> {
        let entries = self.index.get_all(key);
        if entries.is_empty() {
            return Err(MdictError::KeyNotFound(key.to_string()));
        }
        entries
            .into_iter()
            .map(|entry| {
                let bytes = self.read_record_bytes(&entry.locator)?;
                self.process_record(&bytes)
            })
            .collect()
    }

    /// Returns up to `limit` keys matching the regex `pattern`, in file order.
    ///
    /// The match is unanchored; use `^` / `$` to anchor it.
    pub fn search(&self, pattern: &str, limit: usize) -> Result<Vec<String>> {
        self.index.search(pattern, limit)
    }

    /// Returns an iterator over all `(key, record)` pairs in file order.
    ///
    /// Consecutive entries share a record block, so each block is decoded
    /// once while the iterator walks through it.
    pub fn iter_records(&self) -> RecordIterator<'_, T> {
        RecordIterator::new(self)
    }

    /// Releases the reader. No file handle is held between lookups, so this
    /// only drops the in-memory index.
    pub fn close(self) {
        debug!("Closing {}", self.file_path.display());
    }

    /// Extracts and processes a record from a pre-loaded block.
    pub(crate) fn parse_record(&self, block_bytes: &[u8], locator: &RecordLocator) -> Result<T::Record> {
        let bytes = content::slice_record(block_bytes, locator)?;
        self.process_record(bytes)
    }

    fn process_record(&self, bytes: &[u8]) -> Result<T::Record> {
        let stylesheet = (self.substitute_styles && self.header.has_stylesheet())
            .then_some(&self.header.stylesheet);
        T::process_record(bytes, self.header.encoding, stylesheet)
    }

    fn read_record_bytes(&self, locator: &RecordLocator) -> Result<Vec<u8>> {
        let block_bytes = self.read_block(&locator.block)?;
        content::slice_record(&block_bytes, locator).map(<[u8]>::to_vec)
    }

    /// Reads a block from disk and decodes it, verifying its checksum.
    pub(crate) fn read_block(&self, block: &BlockMeta) -> Result<Vec<u8>> {
        let mut file = File::open(&self.file_path)?;
        file.seek(SeekFrom::Start(block.file_offset))?;
        let raw_block = utils::read_section(&mut file, block.compressed_size, "record block")?;

        content::decode_block(&raw_block, block.decompressed_size)
    }
}
