//! Process-backed validator and coverage collaborators.

use crate::cancel::CancellationToken;
use crate::collaborators::{CoverageCollaborator, CoverageRequest, Validator, ValidatorError, Verdict};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use unitsmith_core::config::HarnessConfig;
use unitsmith_core::context::GeneratedTest;
use unitsmith_core::model::simple_name;

/// Compiles a generated test with `javac` and runs it with the JUnit console
/// launcher. Without a launcher, a clean compile is a pass.
#[derive(Debug, Clone)]
pub struct JavacValidator {
    javac: PathBuf,
    java: PathBuf,
    classpath: Vec<PathBuf>,
    work_dir: PathBuf,
    junit_launcher: Option<PathBuf>,
}

impl JavacValidator {
    /// Relative paths in the harness config are resolved against `project_root`.
    pub fn from_config(config: &HarnessConfig, project_root: &Path) -> Self {
        let mut classpath = vec![project_root.join(&config.build_path)];
        classpath.extend(config.classpath.iter().map(|p| project_root.join(p)));
        Self {
            javac: config.javac.clone(),
            java: config.java.clone(),
            classpath,
            work_dir: project_root.join(&config.work_dir),
            junit_launcher: config.junit_launcher.as_ref().map(|p| project_root.join(p)),
        }
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ValidatorError + '_ {
        move |source| ValidatorError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn run(program: &Path, command: &mut Command) -> Result<Output, ValidatorError> {
        command.output().map_err(|source| ValidatorError::Launch {
            program: program.display().to_string(),
            source,
        })
    }
}

impl Validator for JavacValidator {
    fn validate(
        &self,
        test: &GeneratedTest,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ValidatorError> {
        if cancel.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }
        std::fs::create_dir_all(&self.work_dir).map_err(Self::io_err(&self.work_dir))?;
        let scratch = tempfile::Builder::new()
            .prefix("attempt")
            .tempdir_in(&self.work_dir)
            .map_err(Self::io_err(&self.work_dir))?;

        let source_file = scratch.path().join(test_file_path(&test.class_name));
        if let Some(parent) = source_file.parent() {
            std::fs::create_dir_all(parent).map_err(Self::io_err(parent))?;
        }
        std::fs::write(&source_file, &test.source).map_err(Self::io_err(&source_file))?;
        let classes = scratch.path().join("classes");
        std::fs::create_dir_all(&classes).map_err(Self::io_err(&classes))?;

        let classpath = join_paths(&self.classpath).map_err(Self::io_err(&self.work_dir))?;
        let compiled = Self::run(
            &self.javac,
            Command::new(&self.javac)
                .arg("-d")
                .arg(&classes)
                .arg("-cp")
                .arg(&classpath)
                .arg(&source_file),
        )?;
        if !compiled.status.success() {
            tracing::debug!(test = %test.class_name, "test failed to compile");
            return Ok(Verdict::Fail {
                diagnostics: combined_output(&compiled),
            });
        }

        let Some(launcher) = &self.junit_launcher else {
            return Ok(Verdict::Pass);
        };
        if cancel.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }

        let mut run_path = vec![classes];
        run_path.extend(self.classpath.iter().cloned());
        let run_path = join_paths(&run_path).map_err(Self::io_err(&self.work_dir))?;
        let executed = Self::run(
            &self.java,
            Command::new(&self.java)
                .arg("-jar")
                .arg(launcher)
                .arg("--disable-banner")
                .arg("--class-path")
                .arg(&run_path)
                .arg("--select-class")
                .arg(&test.class_name),
        )?;
        if executed.status.success() {
            Ok(Verdict::Pass)
        } else {
            tracing::debug!(test = %test.class_name, "test failed to run");
            Ok(Verdict::Fail {
                diagnostics: combined_output(&executed),
            })
        }
    }
}

/// `com.acme.CartTest` → `com/acme/CartTest.java`.
fn test_file_path(class_name: &str) -> PathBuf {
    let mut path: PathBuf = class_name.split('.').collect();
    path.set_extension("java");
    path
}

fn join_paths(paths: &[PathBuf]) -> std::io::Result<OsString> {
    std::env::join_paths(paths)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, _) => stderr.trim().to_string(),
        (false, true) => stdout.trim().to_string(),
        (false, false) => format!("{}\n{}", stderr.trim(), stdout.trim()),
    }
}

/// Runs a configured coverage command and reads `branchCoverage` from its
/// JSON output.
///
/// Arguments may use `{test_file}`, `{test_name}`, `{class}`, `{method}`,
/// `{build_path}`, `{source_root}` and `{classpath}`.
#[derive(Debug, Clone)]
pub struct CommandCoverage {
    argv: Vec<String>,
    work_dir: PathBuf,
}

impl CommandCoverage {
    pub fn new(argv: Vec<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            work_dir: work_dir.into(),
        }
    }

    /// `None` when no coverage command is configured.
    pub fn from_config(config: &HarnessConfig, project_root: &Path) -> Option<Self> {
        (!config.coverage_command.is_empty()).then(|| {
            Self::new(
                config.coverage_command.clone(),
                project_root.join(&config.work_dir),
            )
        })
    }

    fn substitute(arg: &str, vars: &[(&str, String)]) -> String {
        vars.iter()
            .fold(arg.to_string(), |acc, (key, value)| acc.replace(key, value))
    }
}

impl CoverageCollaborator for CommandCoverage {
    fn measure(&self, request: &CoverageRequest<'_>) -> Result<f64, String> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err("no coverage command configured".to_string());
        };

        std::fs::create_dir_all(&self.work_dir).map_err(|e| e.to_string())?;
        let scratch = tempfile::Builder::new()
            .prefix("coverage")
            .tempdir_in(&self.work_dir)
            .map_err(|e| e.to_string())?;
        let test_file = scratch
            .path()
            .join(format!("{}.java", simple_name(request.test_name)));
        std::fs::write(&test_file, request.test_source).map_err(|e| e.to_string())?;

        let list = |paths: &[PathBuf]| -> Result<String, String> {
            join_paths(paths)
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| e.to_string())
        };
        let vars = [
            ("{test_file}", test_file.display().to_string()),
            ("{test_name}", request.test_name.to_string()),
            ("{class}", request.target_class.to_string()),
            ("{method}", request.target_method.to_string()),
            ("{build_path}", list(request.build_paths)?),
            ("{source_root}", list(request.source_roots)?),
            ("{classpath}", list(request.classpath)?),
        ];

        let output = Command::new(Self::substitute(program, &vars))
            .args(args.iter().map(|a| Self::substitute(a, &vars)))
            .output()
            .map_err(|e| format!("failed to launch coverage command {program}: {e}"))?;
        if !output.status.success() {
            return Err(format!(
                "coverage command exited with {}: {}",
                output.status,
                combined_output(&output)
            ));
        }
        parse_branch_coverage(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Read `branchCoverage` (a number, or a numeric string with optional `%`)
/// from a JSON object.
fn parse_branch_coverage(stdout: &str) -> Result<f64, String> {
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).map_err(|e| format!("coverage output is not JSON: {e}"))?;
    match value.get("branchCoverage") {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("branchCoverage out of range: {n}")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .trim_end_matches('%')
            .parse()
            .map_err(|e| format!("branchCoverage {s:?} is not a number: {e}")),
        Some(other) => Err(format!("branchCoverage has unexpected value {other}")),
        None => Err("coverage output has no branchCoverage".to_string()),
    }
}
