//! File format parsing layer for MDict dictionary files.
//!
//! This module provides the mid-level parsing layer that bridges between
//! raw file I/O and the high-level [`MdictReader`](crate::mdict::reader::MdictReader).
//!
//! # Module Organization
//!
//! - [`header`]: Parses the XML header containing metadata and settings
//! - [`index`]: Parses the key and record block indexes
//! - [`content`]: Decodes and decompresses individual content blocks
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌─────────────────┐
//! │  XML Header     │ ← header::parse()
//! ├─────────────────┤
//! │  Key Index      │ ← index::keys::parse()
//! ├─────────────────┤
//! │  Record Index   │ ← index::records::parse()
//! ├─────────────────┤
//! │  Content Blocks │ ← content::decode_block()
//! │  (compressed)   │
//! └─────────────────┘
//! ```

pub mod content;
pub mod header;
pub mod index;
