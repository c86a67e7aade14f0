//! Orchestration engine for unitsmith.
//!
//! Builds a bounded source context for a target method (falling back to
//! decompiled dependency jars when no source model exists), gates methods that
//! are not worth testing, and drives the generate/validate/repair loop across
//! independent attempts.

pub mod assembler;
pub mod cancel;
pub mod collaborators;
pub mod controller;
pub mod decompiler;
pub mod diagnostics;
pub mod gate;
pub mod harness;
pub mod resolver;
pub mod scheduler;

pub use assembler::DependencyContextAssembler;
pub use cancel::CancellationToken;
pub use controller::{AttemptError, GenerationRepairController};
pub use gate::{ComplexityGate, GateDecision};
pub use resolver::{Resolution, SourceResolver};
pub use scheduler::{ConcurrencyScheduler, RunSummary, ScheduleMode};
