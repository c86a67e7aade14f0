//! Bytecode decompilation behind a trait, with a CFR process implementation.

use std::path::{Path, PathBuf};
use std::process::Command;
use unitsmith_core::config::DecompilerConfig;

/// Errors from extracting or decompiling one compiled class.
#[derive(Debug, thiserror::Error)]
pub enum DecompileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
    #[error("{entry} not found in {location}")]
    MissingEntry { entry: String, location: PathBuf },
    #[error("failed to launch decompiler {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
    #[error("decompiler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("decompiler produced no output")]
    Empty,
}

/// Turns one `.class` file into Java source text.
pub trait Decompiler: Send + Sync {
    fn decompile(&self, class_file: &Path) -> Result<String, DecompileError>;
}

/// Runs the CFR jar as a child process.
#[derive(Debug, Clone)]
pub struct CfrDecompiler {
    java: PathBuf,
    cfr_jar: PathBuf,
}

impl CfrDecompiler {
    const OPTIONS: &[&str] = &[
        "--comments",
        "false",
        "--recover",
        "true",
        "--hideutf",
        "true",
        "--decodesignatures",
        "false",
    ];

    pub fn new(java: impl Into<PathBuf>, cfr_jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            cfr_jar: cfr_jar.into(),
        }
    }

    /// `None` when no CFR jar is configured.
    pub fn from_config(config: &DecompilerConfig) -> Option<Self> {
        config
            .cfr_jar
            .as_ref()
            .map(|jar| Self::new(&config.java, jar))
    }
}

impl Decompiler for CfrDecompiler {
    fn decompile(&self, class_file: &Path) -> Result<String, DecompileError> {
        let output = Command::new(&self.java)
            .arg("-jar")
            .arg(&self.cfr_jar)
            .arg(class_file)
            .args(Self::OPTIONS)
            .output()
            .map_err(|source| DecompileError::Launch {
                program: self.java.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(DecompileError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(DecompileError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_jar() {
        let mut config = DecompilerConfig::default();
        assert!(CfrDecompiler::from_config(&config).is_none());
        config.cfr_jar = Some(PathBuf::from("tools/cfr.jar"));
        let cfr = CfrDecompiler::from_config(&config).unwrap();
        assert_eq!(cfr.java, PathBuf::from("java"));
        assert_eq!(cfr.cfr_jar, PathBuf::from("tools/cfr.jar"));
    }

    #[test]
    fn test_missing_launcher_is_launch_error() {
        let cfr = CfrDecompiler::new("/nonexistent/bin/java", "cfr.jar");
        let err = cfr.decompile(Path::new("A.class")).unwrap_err();
        assert!(matches!(err, DecompileError::Launch { .. }));
    }
}
