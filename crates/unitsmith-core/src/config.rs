//! Configuration for generation, context assembly, gating and collaborators.
//!
//! Load order: `.unitsmith/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted `oracle.max_retries`.
pub const MAX_ORACLE_RETRIES: usize = 10;

/// Top-level unitsmith configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsmithConfig {
    pub generation: GenerationConfig,
    pub context: ContextConfig,
    pub gate: GateConfig,
    pub decompiler: DecompilerConfig,
    pub oracle: OracleConfig,
    pub harness: HarnessConfig,
}

/// Generate/validate/repair loop and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum repair rounds after the initial generation.
    pub max_rounds: usize,
    /// Independent attempts per method.
    pub attempt_count: usize,
    /// Run attempts sequentially and stop at the first success.
    pub stop_when_success: bool,
    /// Run all attempts on a worker pool (ignored when `stop_when_success`).
    pub enable_multithreading: bool,
    /// Write a JSON report per finished attempt.
    pub generate_report: bool,
    /// Measure branch coverage of passing tests.
    pub coverage: bool,
    /// Resolve classes named in compiler diagnostics before each repair.
    pub enrich_from_diagnostics: bool,
}

/// Dependency context assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Additional call-dependency hops walked beyond the immediate edge.
    pub dependency_depth: usize,
    /// Ordered archives searched for compiled dependency classes.
    pub dependency_paths: Vec<PathBuf>,
    /// Share decompiled sources across attempts and hops.
    pub cache_decompiled: bool,
}

/// Complexity gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub policy: GatePolicy,
}

/// How the gate counts a method's branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GatePolicy {
    /// Conditionals, switch arms and for/while/do loops; admit at `threshold`.
    BranchConstructs { threshold: usize },
    /// Every decision point, including for-each loops, `&&`/`||` and ternaries.
    DecisionPoints { threshold: usize },
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::BranchConstructs { threshold: 2 }
    }
}

impl GatePolicy {
    pub fn threshold(&self) -> usize {
        match self {
            Self::BranchConstructs { threshold } | Self::DecisionPoints { threshold } => *threshold,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BranchConstructs { .. } => "branch-constructs",
            Self::DecisionPoints { .. } => "decision-points",
        }
    }
}

/// External decompiler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompilerConfig {
    /// Java launcher used to run the decompiler.
    pub java: PathBuf,
    /// Path to the CFR jar. Fallback reconstruction is disabled without it.
    pub cfr_jar: Option<PathBuf>,
}

/// Generation oracle (LLM provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_retries: usize,
}

/// Compile/run harness and coverage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Classpath entries needed to compile and run tests.
    pub classpath: Vec<PathBuf>,
    /// Compiled classes of the project under test.
    pub build_path: PathBuf,
    /// Source roots of the project under test.
    pub source_roots: Vec<PathBuf>,
    /// Scratch directory for generated tests, relative to the project root.
    pub work_dir: PathBuf,
    pub javac: PathBuf,
    pub java: PathBuf,
    /// JUnit platform console launcher jar.
    pub junit_launcher: Option<PathBuf>,
    /// Coverage command argv with `{placeholders}`.
    pub coverage_command: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            attempt_count: 1,
            stop_when_success: true,
            enable_multithreading: false,
            generate_report: true,
            coverage: false,
            enrich_from_diagnostics: true,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            dependency_depth: 1,
            dependency_paths: Vec::new(),
            cache_decompiled: true,
        }
    }
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            cfr_jar: None,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            base_url: None,
            max_retries: 2,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            classpath: Vec::new(),
            build_path: PathBuf::from("target/classes"),
            source_roots: vec![PathBuf::from("src/main/java")],
            work_dir: PathBuf::from(".unitsmith/work"),
            javac: PathBuf::from("javac"),
            java: PathBuf::from("java"),
            junit_launcher: None,
            coverage_command: Vec::new(),
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl UnitsmithConfig {
    /// Load config from `.unitsmith/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".unitsmith").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        env_override("UNITSMITH_MAX_ROUNDS", &mut self.generation.max_rounds);
        env_override("UNITSMITH_ATTEMPTS", &mut self.generation.attempt_count);
        env_override(
            "UNITSMITH_STOP_WHEN_SUCCESS",
            &mut self.generation.stop_when_success,
        );
        env_override(
            "UNITSMITH_MULTITHREADING",
            &mut self.generation.enable_multithreading,
        );
        env_override(
            "UNITSMITH_DEPENDENCY_DEPTH",
            &mut self.context.dependency_depth,
        );
        if let Some(paths) = std::env::var_os("UNITSMITH_DEPENDENCY_PATHS") {
            self.context.dependency_paths = std::env::split_paths(&paths).collect();
        }
    }

    /// Reject settings no run can honour.
    pub fn validate(&self) -> Result<()> {
        if self.generation.attempt_count == 0 {
            anyhow::bail!("generation.attempt_count must be at least 1");
        }
        if self.gate.policy.threshold() == 0 {
            anyhow::bail!(
                "gate threshold for policy '{}' must be at least 1",
                self.gate.policy.name()
            );
        }
        if self.oracle.max_retries > MAX_ORACLE_RETRIES {
            anyhow::bail!(
                "oracle.max_retries must be at most {MAX_ORACLE_RETRIES}, got {}",
                self.oracle.max_retries
            );
        }
        Ok(())
    }
}
