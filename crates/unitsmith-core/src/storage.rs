//! Read/write the project index and attempt reports under `.unitsmith/`.

use crate::model::ProjectIndex;
use crate::record::AttemptRecord;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const UNITSMITH_DIR: &str = ".unitsmith";
const INDEX_FILE: &str = "project.json";
const REPORTS_DIR: &str = "reports";

/// Get the path to the unitsmith directory for a given project root.
pub fn unitsmith_dir(project_root: &Path) -> PathBuf {
    project_root.join(UNITSMITH_DIR)
}

/// Get the path to the project index file.
pub fn index_file(project_root: &Path) -> PathBuf {
    unitsmith_dir(project_root).join(INDEX_FILE)
}

/// Get the path to the reports directory.
pub fn reports_dir(project_root: &Path) -> PathBuf {
    unitsmith_dir(project_root).join(REPORTS_DIR)
}

/// Check if a project index exists for the given project root.
pub fn index_exists(project_root: &Path) -> bool {
    index_file(project_root).exists()
}

/// Load the project index from disk.
pub fn load_index(project_root: &Path) -> Result<ProjectIndex> {
    let path = index_file(project_root);
    let json = fs::read_to_string(&path)
        .with_context(|| format!("failed to read project index from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("failed to parse project index {}", path.display()))
}

/// Save the project index, creating the `.unitsmith` directory if needed.
pub fn save_index(project_root: &Path, index: &ProjectIndex) -> Result<()> {
    let dir = unitsmith_dir(project_root);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let path = index_file(project_root);
    let json = serde_json::to_string_pretty(index)?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write project index to {}", path.display()))?;
    Ok(())
}

/// Write one attempt report as JSON and return its path.
pub fn write_report(project_root: &Path, record: &AttemptRecord) -> Result<PathBuf> {
    let dir = reports_dir(project_root);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create reports directory {}", dir.display()))?;

    let path = dir.join(format!("{}.json", record.report_stem()));
    let json = serde_json::to_string_pretty(record)?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(path)
}

/// Ensure .unitsmith is in .gitignore. Returns true if it was already there.
pub fn ensure_gitignore(project_root: &Path) -> Result<bool> {
    let gitignore = project_root.join(".gitignore");

    if gitignore.exists() {
        let content = fs::read_to_string(&gitignore)?;
        if content
            .lines()
            .any(|line| line.trim() == UNITSMITH_DIR || line.trim() == ".unitsmith/")
        {
            return Ok(true);
        }
        let mut new_content = content;
        if !new_content.ends_with('\n') {
            new_content.push('\n');
        }
        new_content.push_str("\n# unitsmith index and reports\n.unitsmith/\n");
        fs::write(&gitignore, new_content)?;
    } else {
        fs::write(&gitignore, "# unitsmith index and reports\n.unitsmith/\n")?;
    }

    Ok(false)
}
