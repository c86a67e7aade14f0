//! Exports attempt records as JSON reports under `.unitsmith/reports/`.

use std::path::PathBuf;
use unitsmith_core::record::AttemptRecord;
use unitsmith_core::storage;
use unitsmith_engine::collaborators::{RecordError, RecordWriter};

pub struct JsonReports {
    project_root: PathBuf,
}

impl JsonReports {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }
}

impl RecordWriter for JsonReports {
    fn write(&self, record: &AttemptRecord) -> Result<(), RecordError> {
        let path = storage::write_report(&self.project_root, record)
            .map_err(|e| RecordError(format!("{e:#}")))?;
        tracing::debug!(path = %path.display(), "wrote attempt report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitsmith_core::context::PromptContext;

    #[test]
    fn test_report_lands_in_reports_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = PromptContext::default();
        ctx.class_name = "com.acme.Cart".into();
        ctx.method_signature = "add(int)".into();
        let record = AttemptRecord::skipped(&ctx, "below threshold");

        JsonReports::new(tmp.path()).write(&record).unwrap();

        let written: Vec<_> = std::fs::read_dir(storage::reports_dir(tmp.path()))
            .unwrap()
            .collect();
        assert_eq!(written.len(), 1);
    }
}
