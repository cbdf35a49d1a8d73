//! Foundational data structures, error types, and file type definitions.

pub mod error;
pub mod filetypes;
pub mod index;
pub mod models;
pub mod options;
