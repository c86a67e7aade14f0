//! Core types for unitsmith: the parsed project model, the per-attempt prompt
//! context, attempt results and records, configuration, and on-disk storage.
//!
//! Everything here is collaborator-agnostic. Parsing lives in `unitsmith-parser`,
//! orchestration in `unitsmith-engine`.

pub mod config;
pub mod context;
pub mod model;
pub mod record;
pub mod storage;
