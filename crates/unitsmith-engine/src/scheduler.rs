//! Runs the attempts for one method under the configured scheduling mode.

use crate::cancel::CancellationToken;
use crate::controller::AttemptError;
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use unitsmith_core::record::{AttemptResult, AttemptStatus};

/// How attempts are ordered and when they stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Sequential in index order, stopping at the first success.
    StopOnFirstSuccess,
    /// All attempts concurrently on a pool with one thread per attempt.
    Parallel,
    /// Sequential, every attempt runs regardless of earlier successes.
    Exhaustive,
}

impl ScheduleMode {
    pub fn from_flags(stop_when_success: bool, parallel: bool) -> Self {
        match (stop_when_success, parallel) {
            (true, _) => Self::StopOnFirstSuccess,
            (false, true) => Self::Parallel,
            (false, false) => Self::Exhaustive,
        }
    }
}

/// One independent attempt, identified by its index.
pub trait AttemptRunner: Sync {
    fn run_attempt(
        &self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<AttemptResult, AttemptError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Finished(AttemptResult),
    /// The attempt returned an error or panicked.
    Faulted(String),
    /// Never started: an earlier attempt succeeded or shutdown was requested.
    NotStarted,
}

impl AttemptOutcome {
    fn passed(&self) -> bool {
        matches!(self, Self::Finished(result) if result.passed())
    }
}

/// Outcomes of every attempt index, in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: ScheduleMode,
    pub outcomes: Vec<AttemptOutcome>,
}

impl RunSummary {
    /// Lowest attempt index that passed.
    pub fn first_success(&self) -> Option<usize> {
        self.outcomes.iter().position(AttemptOutcome::passed)
    }

    /// Whether some attempt produced a passing test.
    pub fn satisfied(&self) -> bool {
        self.first_success().is_some()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn faulted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AttemptOutcome::Faulted(_)))
            .count()
    }

    pub fn not_started(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AttemptOutcome::NotStarted))
            .count()
    }

    pub fn count_status(&self, status: AttemptStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AttemptOutcome::Finished(r) if r.status == status))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyScheduler {
    attempt_count: usize,
    mode: ScheduleMode,
}

impl ConcurrencyScheduler {
    pub fn new(attempt_count: usize, mode: ScheduleMode) -> Self {
        Self {
            attempt_count,
            mode,
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    /// Run every attempt the mode calls for. Never fails; faults are
    /// contained per attempt and reported in the summary.
    pub fn run<R>(&self, runner: &R, cancel: &CancellationToken) -> RunSummary
    where
        R: AttemptRunner + ?Sized,
    {
        tracing::info!(
            attempts = self.attempt_count,
            mode = ?self.mode,
            "scheduling attempts"
        );
        let outcomes = match self.mode {
            ScheduleMode::StopOnFirstSuccess => self.sequential(runner, cancel, true),
            ScheduleMode::Exhaustive => self.sequential(runner, cancel, false),
            ScheduleMode::Parallel => self.parallel(runner, cancel),
        };
        let summary = RunSummary {
            mode: self.mode,
            outcomes,
        };
        tracing::info!(
            succeeded = summary.succeeded(),
            faulted = summary.faulted(),
            not_started = summary.not_started(),
            "attempts finished"
        );
        summary
    }

    fn sequential<R>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
        stop_on_success: bool,
    ) -> Vec<AttemptOutcome>
    where
        R: AttemptRunner + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(self.attempt_count);
        for index in 0..self.attempt_count {
            let outcome = run_contained(runner, index, cancel);
            let stop = stop_on_success && outcome.passed();
            outcomes.push(outcome);
            if stop {
                tracing::debug!(index, "stopping after first success");
                break;
            }
        }
        outcomes.resize(self.attempt_count, AttemptOutcome::NotStarted);
        outcomes
    }

    fn parallel<R>(&self, runner: &R, cancel: &CancellationToken) -> Vec<AttemptOutcome>
    where
        R: AttemptRunner + ?Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.attempt_count.max(1))
            .thread_name(|i| format!("attempt-{i}"))
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                (0..self.attempt_count)
                    .into_par_iter()
                    .map(|index| run_contained(runner, index, cancel))
                    .collect()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "cannot build attempt pool, running sequentially");
                self.sequential(runner, cancel, false)
            }
        }
    }
}

/// Run one attempt, turning errors and panics into a `Faulted` outcome.
fn run_contained<R>(runner: &R, index: usize, cancel: &CancellationToken) -> AttemptOutcome
where
    R: AttemptRunner + ?Sized,
{
    if cancel.is_cancelled() {
        return AttemptOutcome::NotStarted;
    }
    match catch_unwind(AssertUnwindSafe(|| runner.run_attempt(index, cancel))) {
        Ok(Ok(result)) => AttemptOutcome::Finished(result),
        Ok(Err(e)) => {
            tracing::warn!(index, error = %e, "attempt failed");
            AttemptOutcome::Faulted(e.to_string())
        }
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::warn!(index, panic = %message, "attempt panicked");
            AttemptOutcome::Faulted(message)
        }
    }
}
