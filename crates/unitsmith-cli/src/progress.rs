//! Terminal progress display for a generation run.

use indicatif::{ProgressBar, ProgressStyle};
use unitsmith_core::record::{AttemptRecord, AttemptStatus};
use unitsmith_engine::collaborators::{RecordError, RecordWriter};

/// One bar over the attempts of a method, advanced as records are exported.
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(attempts: usize) -> Self {
        let bar = ProgressBar::new(attempts as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("##-"),
        );
        bar.set_prefix("attempts");
        Self { bar }
    }

    pub fn set_message(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RecordWriter for RunProgress {
    fn write(&self, record: &AttemptRecord) -> Result<(), RecordError> {
        let label = match record.status {
            AttemptStatus::Succeeded => format!("attempt {} passed in round {}", record.attempt, record.round),
            AttemptStatus::Exhausted => format!("attempt {} exhausted", record.attempt),
            AttemptStatus::Skipped => format!("attempt {} skipped", record.attempt),
            AttemptStatus::Cancelled => format!("attempt {} cancelled", record.attempt),
        };
        self.bar.set_message(label);
        self.bar.inc(1);
        Ok(())
    }
}

/// A spinner for single long-running steps such as indexing.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
