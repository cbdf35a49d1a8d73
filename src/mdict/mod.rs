//! Core MDict container module.
//!
//! - [`codec`]: pure transforms (decompression, decryption)
//! - [`format`]: on-disk structures (header, index, blocks)
//! - [`types`]: shared data types, options and errors
//! - [`reader`]: the user-facing [`MdictReader`]

pub mod codec;
pub mod format;
pub mod iter;
pub mod reader;
pub mod types;
pub mod utils;

pub use reader::MdictReader;
pub use types::error::{MdictError, Result};
pub use types::filetypes::{FileType, Mdd, Mdx};
pub use types::index::{Index, IndexEntry};
pub use types::options::{Credential, OpenOptions};
