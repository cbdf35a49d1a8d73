//! Codec layer for decryption and decompression operations.
//!
//! This module provides the cryptographic and compression primitives
//! used by the MDict format parsers.
//!
//! # Submodules
//!
//! - [`crypto`][]: Decryption (Salsa20/8, fast XOR) and key derivation
//! - [`compression`][]: Decompression dispatch (raw, LZO, zlib)

pub mod compression;
pub mod crypto;
