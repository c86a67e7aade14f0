//! Tree-sitter based Java processing for unitsmith.
//!
//! Sanitizes decompiler output, prunes class sources down to the methods a
//! caller needs, counts decision points for the complexity gate, and indexes
//! Java sources into the project model.

pub mod complexity;
pub mod index;
pub mod prune;
pub mod sanitize;
pub mod treesitter;

pub use treesitter::ParseError;
