//! Custom error types for the mdict-index crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Errors raised while opening a container are fatal for that handle. Errors
/// raised by a single lookup (a corrupt record block, an unsupported
/// compression) only affect that lookup.
#[derive(Debug, Error)]
pub enum MdictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header blob does not match its Adler-32 checksum.
    #[error("Corrupt header: checksum expected {expected:#010x}, got {actual:#010x}")]
    CorruptHeader { expected: u32, actual: u32 },

    /// The header text could not be parsed into attributes.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// The MDict engine version is not supported (3.0+).
    #[error("Unsupported MDict version: {0}. Only v1.x and v2.x are supported.")]
    UnsupportedVersion(f32),

    /// The key index is encrypted but no credential was supplied.
    #[error("Encrypted container requires a credential, but none was provided.")]
    CredentialRequired,

    /// The supplied credential cannot be used to derive a key.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// The key index header or key block info failed validation.
    #[error("Corrupt index header: {0}")]
    CorruptIndexHeader(String),

    /// Key block or key entry counts disagree with the index header.
    #[error("Key index count mismatch for {item_type}: expected {expected}, found {found}")]
    IndexCountMismatch {
        item_type: &'static str,
        expected: u64,
        found: u64,
    },

    /// The record section declares a different number of entries than the key index.
    #[error("Record count mismatch: key index has {expected} entries, record index declares {found}")]
    RecordCountMismatch { expected: u64, found: u64 },

    /// The record blocks do not add up to the declared record section size.
    #[error("Record block size mismatch: declared {expected} bytes, blocks sum to {found} bytes")]
    RecordBlockSizeMismatch { expected: u64, found: u64 },

    /// A declared count of items does not match the actual number of items found.
    #[error("Count mismatch for {item_type}: expected {expected}, but found {found}")]
    CountMismatch {
        item_type: &'static str,
        expected: u64,
        found: u64,
    },

    /// A buffer or data block has an unexpected size.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// A decompressed block does not match the Adler-32 stored in its sub-header.
    #[error("Corrupt block: checksum expected {expected:#010x}, got {actual:#010x}")]
    CorruptBlock { expected: u32, actual: u32 },

    /// The block uses a compression this build cannot decode.
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(&'static str),

    /// The block's compression tag is not one of the known values.
    #[error("Unknown compression tag: {0:#010x}")]
    UnknownCompressionTag(u32),

    /// The compressed stream itself is damaged.
    #[error("Decompression failed: {0}")]
    DecompressionError(String),

    /// The requested key is not present in the index.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The search pattern is not a valid regular expression.
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The file is structurally invalid in a way not covered above.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// A convenience `Result` type alias using the crate's `MdictError` type.
pub type Result<T> = std::result::Result<T, MdictError>;
