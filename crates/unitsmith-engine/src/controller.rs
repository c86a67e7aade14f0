//! The generate → validate → repair loop for one attempt.

use crate::assembler::DependencyContextAssembler;
use crate::cancel::CancellationToken;
use crate::collaborators::{
    CoverageCollaborator, CoverageRequest, GenerationOracle, OracleError, RecordWriter, Validator,
    ValidatorError, Verdict,
};
use crate::diagnostics::extract_class_names;
use crate::gate::{ComplexityGate, GateDecision};
use crate::scheduler::AttemptRunner;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use unitsmith_core::context::PromptContext;
use unitsmith_core::model::{ClassUnit, MethodUnit};
use unitsmith_core::record::{AttemptRecord, AttemptResult, AttemptStatus, Coverage};

/// A fault that ends an attempt without a terminal round.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Validator(#[from] ValidatorError),
}

/// Where coverage of passing tests is measured, and with what.
pub struct CoveragePlan<'a> {
    pub collaborator: &'a dyn CoverageCollaborator,
    pub build_paths: Vec<PathBuf>,
    pub source_roots: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
}

/// What one round produced before validation.
enum RoundOutcome {
    Passed,
    Failed(String),
    Cancelled,
}

/// Drives one attempt from gate decision to a terminal, exported record.
///
/// The round counter starts at 0 (initial generation) and counts repairs, so
/// an attempt runs at most `max_rounds + 1` validations.
pub struct GenerationRepairController<'a> {
    oracle: &'a dyn GenerationOracle,
    validator: &'a dyn Validator,
    records: &'a dyn RecordWriter,
    gate: ComplexityGate,
    max_rounds: usize,
    coverage: Option<CoveragePlan<'a>>,
    enrichment: Option<&'a DependencyContextAssembler<'a>>,
}

impl<'a> GenerationRepairController<'a> {
    pub fn new(
        oracle: &'a dyn GenerationOracle,
        validator: &'a dyn Validator,
        records: &'a dyn RecordWriter,
    ) -> Self {
        Self {
            oracle,
            validator,
            records,
            gate: ComplexityGate::default(),
            max_rounds: 3,
            coverage: None,
            enrichment: None,
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: ComplexityGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    #[must_use]
    pub fn with_coverage(mut self, plan: CoveragePlan<'a>) -> Self {
        self.coverage = Some(plan);
        self
    }

    /// Resolve classes named in failure diagnostics before each repair.
    #[must_use]
    pub fn with_enrichment(mut self, assembler: &'a DependencyContextAssembler<'a>) -> Self {
        self.enrichment = Some(assembler);
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Run one attempt over an assembled context.
    pub fn run(
        &self,
        mut ctx: PromptContext,
        cancel: &CancellationToken,
    ) -> Result<AttemptResult, AttemptError> {
        if cancel.is_cancelled() {
            return Ok(cancelled(&ctx, Duration::ZERO));
        }

        if let GateDecision::Reject(reason) = self.gate.admit(&ctx) {
            tracing::info!(
                class = %ctx.class_name,
                method = %ctx.method_signature,
                attempt = ctx.attempt,
                reason = %reason,
                "skipped by complexity gate"
            );
            self.export(&AttemptRecord::skipped(&ctx, reason.to_string()));
            return Ok(AttemptResult::skipped());
        }

        let started = Instant::now();
        ctx.round = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok(cancelled(&ctx, started.elapsed()));
            }

            let diagnostics = match self.round(&mut ctx, cancel)? {
                RoundOutcome::Passed => return Ok(self.succeed(&ctx, started)),
                RoundOutcome::Cancelled => return Ok(cancelled(&ctx, started.elapsed())),
                RoundOutcome::Failed(diagnostics) => diagnostics,
            };

            tracing::info!(
                class = %ctx.class_name,
                method = %ctx.method_signature,
                attempt = ctx.attempt,
                round = ctx.round,
                "validation failed"
            );
            ctx.push_failure(diagnostics);

            if ctx.round >= self.max_rounds {
                let result = AttemptResult {
                    status: AttemptStatus::Exhausted,
                    round: ctx.round,
                    elapsed: started.elapsed(),
                    coverage: None,
                };
                tracing::info!(
                    class = %ctx.class_name,
                    method = %ctx.method_signature,
                    attempt = ctx.attempt,
                    rounds = ctx.round,
                    "repair rounds exhausted"
                );
                self.export(&AttemptRecord::finished(&ctx, &result));
                return Ok(result);
            }

            ctx.round += 1;
            self.enrich(&mut ctx);
        }
    }

    /// Generate (round 0) or repair, then validate.
    fn round(
        &self,
        ctx: &mut PromptContext,
        cancel: &CancellationToken,
    ) -> Result<RoundOutcome, AttemptError> {
        let produced = if ctx.round == 0 {
            tracing::debug!(class = %ctx.class_name, attempt = ctx.attempt, "generating test");
            self.oracle.generate(ctx, cancel)
        } else {
            let diagnostics = ctx
                .last_failure()
                .map(|f| f.diagnostics.clone())
                .unwrap_or_default();
            tracing::debug!(
                class = %ctx.class_name,
                attempt = ctx.attempt,
                round = ctx.round,
                "repairing test"
            );
            self.oracle.repair(ctx, &diagnostics, cancel)
        };

        let test = match produced {
            Ok(test) => test,
            Err(OracleError::NoTest(message)) => return Ok(RoundOutcome::Failed(message)),
            Err(OracleError::Cancelled) => return Ok(RoundOutcome::Cancelled),
            Err(e) => return Err(e.into()),
        };

        let verdict = self.validator.validate(&test, cancel);
        ctx.unit_test = Some(test);
        match verdict {
            Ok(Verdict::Pass) => Ok(RoundOutcome::Passed),
            Ok(Verdict::Fail { diagnostics }) => Ok(RoundOutcome::Failed(diagnostics)),
            Err(ValidatorError::Cancelled) => Ok(RoundOutcome::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    fn succeed(&self, ctx: &PromptContext, started: Instant) -> AttemptResult {
        let coverage = self.measure(ctx);
        let result = AttemptResult {
            status: AttemptStatus::Succeeded,
            round: ctx.round,
            elapsed: started.elapsed(),
            coverage,
        };
        tracing::info!(
            class = %ctx.class_name,
            method = %ctx.method_signature,
            attempt = ctx.attempt,
            round = ctx.round,
            elapsed_ms = result.elapsed.as_millis(),
            "test passed"
        );
        self.export(&AttemptRecord::finished(ctx, &result));
        result
    }

    fn measure(&self, ctx: &PromptContext) -> Option<Coverage> {
        let plan = self.coverage.as_ref()?;
        let test = ctx.unit_test.as_ref()?;
        let request = CoverageRequest {
            test_source: &test.source,
            test_name: &test.class_name,
            target_class: &ctx.class_name,
            target_method: &ctx.method_signature,
            build_paths: &plan.build_paths,
            source_roots: &plan.source_roots,
            classpath: &plan.classpath,
        };
        Some(match plan.collaborator.measure(&request) {
            Ok(percent) => Coverage::Percent(percent),
            Err(message) => {
                tracing::warn!(test = %test.class_name, error = %message, "coverage measurement failed");
                Coverage::Error(message)
            }
        })
    }

    fn enrich(&self, ctx: &mut PromptContext) {
        let Some(assembler) = self.enrichment else {
            return;
        };
        let Some(failure) = ctx.last_failure() else {
            return;
        };
        let names = extract_class_names(&failure.diagnostics);
        if !names.is_empty() {
            assembler.enrich(ctx, &names);
        }
    }

    fn export(&self, record: &AttemptRecord) {
        if let Err(e) = self.records.write(record) {
            tracing::warn!(
                class = %record.class_name,
                attempt = record.attempt,
                error = %e,
                "record export failed"
            );
        }
    }
}

fn cancelled(ctx: &PromptContext, elapsed: Duration) -> AttemptResult {
    tracing::info!(
        class = %ctx.class_name,
        attempt = ctx.attempt,
        round = ctx.round,
        "attempt cancelled"
    );
    AttemptResult {
        status: AttemptStatus::Cancelled,
        round: ctx.round,
        elapsed,
        coverage: None,
    }
}

/// Attempts at one target method: assemble a fresh context, then run the loop.
pub struct MethodAttempts<'a> {
    pub assembler: &'a DependencyContextAssembler<'a>,
    pub controller: &'a GenerationRepairController<'a>,
    pub class: &'a ClassUnit,
    pub method: &'a MethodUnit,
}

impl AttemptRunner for MethodAttempts<'_> {
    fn run_attempt(
        &self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<AttemptResult, AttemptError> {
        let ctx = self.assembler.assemble(self.class, self.method, index);
        self.controller.run(ctx, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RecordLog;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use unitsmith_core::context::GeneratedTest;

    const BRANCHY: &str =
        "int f(int a) { if (a > 1) { a--; } if (a > 2) { a--; } if (a > 3) { a--; } return a; }";

    struct ScriptedOracle {
        calls: AtomicUsize,
        seen_diagnostics: Mutex<Vec<String>>,
        outcome: fn(usize) -> Result<GeneratedTest, OracleError>,
    }

    impl ScriptedOracle {
        fn new(outcome: fn(usize) -> Result<GeneratedTest, OracleError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen_diagnostics: Mutex::new(Vec::new()),
                outcome,
            }
        }
    }

    fn test_named(round: usize) -> Result<GeneratedTest, OracleError> {
        Ok(GeneratedTest {
            class_name: format!("T{round}"),
            source: format!("class T{round} {{}}"),
        })
    }

    impl GenerationOracle for ScriptedOracle {
        fn generate(
            &self,
            _ctx: &PromptContext,
            _cancel: &CancellationToken,
        ) -> Result<GeneratedTest, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(n)
        }

        fn repair(
            &self,
            _ctx: &PromptContext,
            diagnostics: &str,
            _cancel: &CancellationToken,
        ) -> Result<GeneratedTest, OracleError> {
            self.seen_diagnostics
                .lock()
                .unwrap()
                .push(diagnostics.to_string());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(n)
        }
    }

    /// Passes exactly the test class named in `pass`.
    struct NamedValidator {
        pass: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Validator for NamedValidator {
        fn validate(
            &self,
            test: &GeneratedTest,
            _cancel: &CancellationToken,
        ) -> Result<Verdict, ValidatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(test.class_name.as_str()) == self.pass {
                Ok(Verdict::Pass)
            } else {
                Ok(Verdict::Fail {
                    diagnostics: format!("{} failed", test.class_name),
                })
            }
        }
    }

    struct FixedCoverage(Result<f64, String>);

    impl CoverageCollaborator for FixedCoverage {
        fn measure(&self, _request: &CoverageRequest<'_>) -> Result<f64, String> {
            self.0.clone()
        }
    }

    fn admitted_ctx() -> PromptContext {
        let mut ctx = PromptContext::default();
        ctx.class_name = "com.acme.Cart".into();
        ctx.simple_class_name = "Cart".into();
        ctx.method_name = "f".into();
        ctx.method_signature = "f(int)".into();
        ctx.method_source = BRANCHY.into();
        ctx.record_activation("org.lib.Money");
        ctx
    }

    fn validator(pass: Option<&'static str>) -> NamedValidator {
        NamedValidator {
            pass,
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_repair_until_pass() {
        let oracle = ScriptedOracle::new(test_named);
        let validator = validator(Some("T2"));
        let log = RecordLog::new();
        let controller = GenerationRepairController::new(&oracle, &validator, &log);

        let result = controller
            .run(admitted_ctx(), &CancellationToken::new())
            .unwrap();
        assert_eq!(result.status, AttemptStatus::Succeeded);
        assert_eq!(result.round, 2);
        assert_eq!(
            *oracle.seen_diagnostics.lock().unwrap(),
            vec!["T0 failed".to_string(), "T1 failed".to_string()]
        );
        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].test_class.as_deref(), Some("T2"));
    }

    #[test]
    fn test_never_exceeds_max_rounds() {
        for max_rounds in [0, 1, 4] {
            let oracle = ScriptedOracle::new(test_named);
            let validator = validator(None);
            let log = RecordLog::new();
            let controller =
                GenerationRepairController::new(&oracle, &validator, &log).with_max_rounds(max_rounds);

            let result = controller
                .run(admitted_ctx(), &CancellationToken::new())
                .unwrap();
            assert_eq!(result.status, AttemptStatus::Exhausted);
            assert_eq!(result.round, max_rounds);
            assert_eq!(oracle.seen_diagnostics.lock().unwrap().len(), max_rounds);
            assert_eq!(validator.calls.load(Ordering::SeqCst), max_rounds + 1);
            let records = log.records();
            assert_eq!(records.len(), 1);
            assert!(!records[0].passed);
        }
    }

    #[test]
    fn test_no_test_in_answer_counts_as_failed_round() {
        let oracle = ScriptedOracle::new(|n| {
            if n == 0 {
                Err(OracleError::NoTest("no java block".into()))
            } else {
                test_named(n)
            }
        });
        let validator = validator(Some("T1"));
        let log = RecordLog::new();
        let controller = GenerationRepairController::new(&oracle, &validator, &log);

        let result = controller
            .run(admitted_ctx(), &CancellationToken::new())
            .unwrap();
        assert!(result.passed());
        assert_eq!(result.round, 1);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_failure_is_attempt_error_without_record() {
        let oracle = ScriptedOracle::new(|_| Err(OracleError::Request("HTTP 500".into())));
        let validator = validator(None);
        let log = RecordLog::new();
        let controller = GenerationRepairController::new(&oracle, &validator, &log);

        let err = controller
            .run(admitted_ctx(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, AttemptError::Oracle(OracleError::Request(_))));
        assert!(log.records().is_empty());
    }

    #[test]
    fn test_cancelled_before_start_makes_no_calls() {
        let oracle = ScriptedOracle::new(test_named);
        let validator = validator(Some("T0"));
        let log = RecordLog::new();
        let controller = GenerationRepairController::new(&oracle, &validator, &log);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = controller.run(admitted_ctx(), &cancel).unwrap();
        assert_eq!(result.status, AttemptStatus::Cancelled);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        assert!(log.records().is_empty());
    }

    #[test]
    fn test_coverage_error_degrades_to_marker() {
        let oracle = ScriptedOracle::new(test_named);
        let validator = validator(Some("T0"));
        let log = RecordLog::new();
        let coverage = FixedCoverage(Err("Error during code coverage analysis".into()));
        let controller = GenerationRepairController::new(&oracle, &validator, &log).with_coverage(
            CoveragePlan {
                collaborator: &coverage,
                build_paths: vec![PathBuf::from("target/classes")],
                source_roots: Vec::new(),
                classpath: Vec::new(),
            },
        );

        let result = controller
            .run(admitted_ctx(), &CancellationToken::new())
            .unwrap();
        assert!(result.passed());
        assert_eq!(
            result.coverage,
            Some(Coverage::Error("Error during code coverage analysis".into()))
        );
        assert_eq!(log.records()[0].coverage, result.coverage);
    }

    #[test]
    fn test_gate_rejection_records_skip_only() {
        let oracle = ScriptedOracle::new(test_named);
        let validator = validator(Some("T0"));
        let log = RecordLog::new();
        let controller = GenerationRepairController::new(&oracle, &validator, &log);
        let mut ctx = admitted_ctx();
        ctx.method_source = "int f(int a) { return a; }".into();

        let result = controller.run(ctx, &CancellationToken::new()).unwrap();
        assert_eq!(result, AttemptResult::skipped());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttemptStatus::Skipped);
    }
}
