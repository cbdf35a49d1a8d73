//! Sequential access to every record of a container.
//!
//! # Example
//! ```no_run
//! # use mdict_index::{MdictReader, Mdx};
//! # let reader = MdictReader::<Mdx>::new("dict.mdx", None).unwrap();
//! for result in reader.iter_records() {
//!     let (key, definition) = result.unwrap();
//!     println!("{}: {}", key, definition);
//! }
//! ```

use std::slice::Iter;

use super::reader::MdictReader;
use super::types::error::Result;
use super::types::filetypes::FileType;
use super::types::index::IndexEntry;

/// Iterator over complete dictionary entries with record data.
///
/// Yields `Result<(String, T::Record)>` where `T::Record` is `String` for MDX
/// files and `Vec<u8>` for MDD files. A block error is yielded for each entry
/// of that block; iteration continues with the next entry.
///
/// # Performance
/// The last decoded record block is cached, so entries sharing a block cost
/// one read and one decompression.
///
/// Created by [`MdictReader::iter_records()`].
pub struct RecordIterator<'a, T: FileType> {
    reader: &'a MdictReader<T>,
    entries: Iter<'a, IndexEntry>,
    cached_block_offset: Option<u64>,
    cached_block_bytes: Vec<u8>,
}

impl<'a, T: FileType> RecordIterator<'a, T> {
    pub(super) fn new(reader: &'a MdictReader<T>) -> Self {
        Self {
            reader,
            entries: reader.entries().iter(),
            cached_block_offset: None,
            cached_block_bytes: Vec::new(),
        }
    }
}

impl<'a, T: FileType> Iterator for RecordIterator<'a, T> {
    type Item = Result<(String, T::Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        let block = &entry.locator.block;

        if self.cached_block_offset != Some(block.file_offset) {
            match self.reader.read_block(block) {
                Ok(bytes) => {
                    self.cached_block_bytes = bytes;
                    self.cached_block_offset = Some(block.file_offset);
                }
                Err(e) => return Some(Err(e)),
            }
        }

        match self.reader.parse_record(&self.cached_block_bytes, &entry.locator) {
            Ok(record) => Some(Ok((entry.key.text.clone(), record))),
            Err(e) => Some(Err(e)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
