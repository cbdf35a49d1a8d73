//! # mdict-index
//!
//! A reader for MDict dictionary containers (`.mdx` and `.mdd`), format
//! versions 1.x and 2.x. Opening a file builds an in-memory key index;
//! records are decompressed on demand for lookups.
//!
//! Supports encrypted key indexes (with a registration credential), raw,
//! zlib and LZO blocks (LZO behind the default `lzo` feature), regex search
//! over keys and MDX stylesheet substitution.
//!
//! ```no_run
//! use mdict_index::{MdictReader, Mdx};
//!
//! let reader = MdictReader::<Mdx>::new("dict.mdx", None)?;
//! let definition = reader.lookup("apple")?;
//! let similar = reader.search("^app", 10)?;
//! # Ok::<(), mdict_index::MdictError>(())
//! ```
pub mod mdict;

// Re-export the main types for convenience
pub use mdict::{
    Credential, FileType, Index, IndexEntry, MdictError, MdictReader, Mdd, Mdx, OpenOptions,
    Result,
    iter::RecordIterator,
    types::models::{
        BlockMeta, EncryptionMode, KeyBlockInfo, KeyEntry, MdictHeader, MdictMetadata,
        MdictVersion, RecordBlockInfo, RecordLocator, RegisterBy,
    },
};
