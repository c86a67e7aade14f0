//! Interfaces to the external collaborators the engine drives.
//!
//! The oracle writes tests, the validator judges them, the coverage
//! collaborator scores passing ones and the record writer exports results.
//! All of them are blocking and must be shareable across attempt threads.

use crate::cancel::CancellationToken;
use std::path::PathBuf;
use std::sync::Mutex;
use unitsmith_core::context::{GeneratedTest, PromptContext};
use unitsmith_core::record::AttemptRecord;

/// Errors from the generation oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not be reached or refused the request.
    #[error("oracle request failed: {0}")]
    Request(String),
    /// The oracle answered but the answer holds no usable test.
    #[error("oracle returned no usable test: {0}")]
    NoTest(String),
    #[error("oracle call cancelled")]
    Cancelled,
}

/// Produces and repairs unit tests.
pub trait GenerationOracle: Send + Sync {
    /// Write a first test from the assembled context (round 0).
    fn generate(
        &self,
        ctx: &PromptContext,
        cancel: &CancellationToken,
    ) -> Result<GeneratedTest, OracleError>;

    /// Rewrite `ctx.unit_test` given the diagnostics of its failed validation.
    fn repair(
        &self,
        ctx: &PromptContext,
        diagnostics: &str,
        cancel: &CancellationToken,
    ) -> Result<GeneratedTest, OracleError>;
}

/// Outcome of compiling and running one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { diagnostics: String },
}

/// Errors that keep the validator from reaching a verdict at all.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
    #[error("validation cancelled")]
    Cancelled,
}

/// Compiles and executes a generated test.
pub trait Validator: Send + Sync {
    fn validate(
        &self,
        test: &GeneratedTest,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ValidatorError>;
}

/// Inputs for one coverage measurement.
#[derive(Debug, Clone, Copy)]
pub struct CoverageRequest<'a> {
    pub test_source: &'a str,
    /// Fully-qualified test class name.
    pub test_name: &'a str,
    pub target_class: &'a str,
    pub target_method: &'a str,
    pub build_paths: &'a [PathBuf],
    pub source_roots: &'a [PathBuf],
    pub classpath: &'a [PathBuf],
}

/// Measures branch coverage of a passing test.
///
/// Failures are reported as a description, never as a panic or error type.
pub trait CoverageCollaborator: Send + Sync {
    fn measure(&self, request: &CoverageRequest<'_>) -> Result<f64, String>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to export attempt record: {0}")]
pub struct RecordError(pub String);

/// Exports terminal attempt records.
pub trait RecordWriter: Send + Sync {
    fn write(&self, record: &AttemptRecord) -> Result<(), RecordError>;
}

/// Keeps every exported record in memory.
#[derive(Debug, Default)]
pub struct RecordLog {
    records: Mutex<Vec<AttemptRecord>>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records written so far, in write order.
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl RecordWriter for RecordLog {
    fn write(&self, record: &AttemptRecord) -> Result<(), RecordError> {
        self.records
            .lock()
            .map_err(|e| RecordError(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Writes to every inner writer; the first failure is returned after all ran.
pub struct FanOut<'a>(pub Vec<&'a dyn RecordWriter>);

impl RecordWriter for FanOut<'_> {
    fn write(&self, record: &AttemptRecord) -> Result<(), RecordError> {
        let mut first_error = None;
        for writer in &self.0 {
            if let Err(e) = writer.write(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
