//! CLI binary for unitsmith: synthesize Java unit tests with an LLM.

mod progress;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unitsmith_core::config::UnitsmithConfig;
use unitsmith_core::context::PromptContext;
use unitsmith_core::model::{ClassUnit, MethodUnit, ProjectIndex, ProjectModel, normalize_signatures};
use unitsmith_core::record::Coverage;
use unitsmith_core::storage;
use unitsmith_engine::collaborators::{FanOut, RecordWriter};
use unitsmith_engine::controller::{CoveragePlan, MethodAttempts};
use unitsmith_engine::decompiler::CfrDecompiler;
use unitsmith_engine::diagnostics::extract_class_names;
use unitsmith_engine::harness::{CommandCoverage, JavacValidator};
use unitsmith_engine::scheduler::AttemptOutcome;
use unitsmith_engine::{
    CancellationToken, ComplexityGate, ConcurrencyScheduler, DependencyContextAssembler,
    GateDecision, GenerationRepairController, Resolution, ScheduleMode, SourceResolver,
};
use unitsmith_oracle::{LlmOracle, provider_from_config};

use crate::progress::RunProgress;
use crate::report::JsonReports;

#[derive(Parser)]
#[command(name = "unitsmith", about = "LLM unit-test synthesis for Java")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse Java sources and save the project index
    Index {
        /// Source roots to index (repeatable; defaults to harness.source_roots)
        #[arg(long = "source-root")]
        source_roots: Vec<PathBuf>,
    },

    /// Print the assembled prompt context for a method
    Context {
        /// Fully-qualified (or unambiguous simple) class name
        class: String,
        /// Method signature, e.g. "add(int,String)"
        signature: String,
    },

    /// Print the decision profile and gate decision for a method
    Gate {
        class: String,
        signature: String,
    },

    /// Generate, validate and repair tests for a method
    Run {
        class: String,
        signature: String,

        /// Independent attempts (defaults to generation.attempt_count)
        #[arg(long)]
        attempts: Option<usize>,

        /// Repair rounds after the first generation (defaults to generation.max_rounds)
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Run every attempt concurrently
        #[arg(long, conflicts_with = "exhaustive")]
        parallel: bool,

        /// Run every attempt sequentially, even after a success
        #[arg(long)]
        exhaustive: bool,
    },

    /// Reconstruct a compiled dependency class from the search path
    Decompile {
        /// Fully-qualified class name
        class: String,

        /// Keep the body of this method (repeatable)
        #[arg(long = "method")]
        methods: Vec<String>,
    },

    /// Print class names implicated in compiler or test diagnostics
    ExtractClasses {
        /// Diagnostics file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Index { source_roots } => cmd_index(&project_root, source_roots),
        Commands::Context { class, signature } => cmd_context(&project_root, &class, &signature),
        Commands::Gate { class, signature } => cmd_gate(&project_root, &class, &signature),
        Commands::Run {
            class,
            signature,
            attempts,
            max_rounds,
            parallel,
            exhaustive,
        } => cmd_run(
            &project_root,
            &class,
            &signature,
            &RunOptions {
                attempts,
                max_rounds,
                parallel,
                exhaustive,
            },
        ),
        Commands::Decompile { class, methods } => cmd_decompile(&project_root, &class, &methods),
        Commands::ExtractClasses { file } => cmd_extract_classes(file.as_deref()),
    }
}

/// Resolver over the configured dependency archives.
fn build_resolver(project_root: &Path, config: &UnitsmithConfig) -> SourceResolver {
    let Some(cfr_jar) = &config.decompiler.cfr_jar else {
        tracing::warn!("decompiler.cfr_jar is not set; compiled dependencies will not be reconstructed");
        return SourceResolver::without_fallback();
    };
    let search_path = config
        .context
        .dependency_paths
        .iter()
        .map(|p| project_root.join(p))
        .collect();
    let decompiler = CfrDecompiler::new(&config.decompiler.java, project_root.join(cfr_jar));
    SourceResolver::new(
        search_path,
        Arc::new(decompiler),
        config.context.cache_decompiled,
    )
}

fn load_model(project_root: &Path) -> Result<ProjectIndex> {
    if !storage::index_exists(project_root) {
        anyhow::bail!("no project index found. Run `unitsmith index` first.");
    }
    storage::load_index(project_root)
}

fn find_target<'m>(
    model: &'m ProjectIndex,
    class_name: &str,
    signature: &str,
) -> Result<(&'m ClassUnit, &'m MethodUnit)> {
    let class = model
        .class_unit(class_name)
        .with_context(|| format!("class '{class_name}' is not in the project index"))?;
    let method = model.method_unit(class, signature).with_context(|| {
        let known: Vec<&str> = class.methods.keys().map(String::as_str).collect();
        format!(
            "method '{signature}' not found in {} (known: {})",
            class.full_name,
            known.join(", ")
        )
    })?;
    Ok((class, method))
}

fn cmd_index(project_root: &Path, source_roots: Vec<PathBuf>) -> Result<()> {
    let config = UnitsmithConfig::load(project_root)?;
    let source_roots = if source_roots.is_empty() {
        config.harness.source_roots
    } else {
        source_roots
    };
    let roots: Vec<PathBuf> = source_roots
        .iter()
        .map(|root| project_root.join(root))
        .collect();

    let spinner = progress::spinner("Indexing Java sources...");
    let index = unitsmith_parser::index::index_sources(&roots);
    spinner.finish_and_clear();
    let index = index?;

    storage::save_index(project_root, &index)?;
    if !storage::ensure_gitignore(project_root)? {
        eprintln!("  Added .unitsmith/ to .gitignore");
    }

    eprintln!(
        "Indexed {} classes, {} methods → {}",
        index.len(),
        index.method_count(),
        storage::index_file(project_root).display()
    );
    Ok(())
}

/// Assemble attempt 0's context for a method.
fn assemble(project_root: &Path, class_name: &str, signature: &str) -> Result<(UnitsmithConfig, PromptContext)> {
    let config = UnitsmithConfig::load(project_root)?;
    let model = load_model(project_root)?;
    let (class, method) = find_target(&model, class_name, signature)?;
    let resolver = build_resolver(project_root, &config);
    let assembler =
        DependencyContextAssembler::new(&model, &resolver, config.context.dependency_depth);
    let ctx = assembler.assemble(class, method, 0);
    Ok((config, ctx))
}

fn print_dependencies(title: &str, deps: &std::collections::BTreeMap<String, String>) {
    if deps.is_empty() {
        return;
    }
    println!("\n=== {title} ===");
    for (class, source) in deps {
        println!("\n--- {class} ---\n{}", source.trim());
    }
}

fn print_decision(decision: &GateDecision) {
    match decision {
        GateDecision::Admit { score } => println!("Gate: admit (score {score})"),
        GateDecision::Reject(reason) => println!("Gate: skip ({reason})"),
    }
}

fn cmd_context(project_root: &Path, class_name: &str, signature: &str) -> Result<()> {
    let (config, ctx) = assemble(project_root, class_name, signature)?;

    println!("=== {} :: {} ===", ctx.class_name, ctx.method_signature);
    println!("{}", ctx.full_context());
    print_dependencies("Constructor dependencies", &ctx.constructor_deps);
    print_dependencies("Constructor dependencies (reconstructed)", &ctx.external_constructor_deps);
    print_dependencies("Called classes", &ctx.method_deps);
    print_dependencies("Called classes (reconstructed)", &ctx.external_method_deps);

    println!();
    println!("Activations: {}", ctx.activations);
    for class in ctx.fallback_classes() {
        println!("  {class}");
    }
    print_decision(&ComplexityGate::new(config.gate.policy).admit(&ctx));
    Ok(())
}

fn cmd_gate(project_root: &Path, class_name: &str, signature: &str) -> Result<()> {
    let (config, ctx) = assemble(project_root, class_name, signature)?;
    let gate = ComplexityGate::new(config.gate.policy);
    let profile = gate.profile(&ctx.method_source);

    println!("{} :: {}", ctx.class_name, ctx.method_signature);
    println!("  conditionals:   {}", profile.conditionals);
    println!("  switch arms:    {}", profile.switch_arms);
    println!("  loops:          {}", profile.loops);
    println!("  for-each loops: {}", profile.foreach_loops);
    println!("  && / ||:        {}", profile.short_circuits);
    println!("  ternaries:      {}", profile.ternaries);
    println!(
        "  policy {} (threshold {}): score {}",
        gate.policy().name(),
        gate.policy().threshold(),
        gate.score(&ctx.method_source)
    );
    println!("  activations:    {}", ctx.activations);
    print_decision(&gate.admit(&ctx));
    Ok(())
}

struct RunOptions {
    attempts: Option<usize>,
    max_rounds: Option<usize>,
    parallel: bool,
    exhaustive: bool,
}

impl RunOptions {
    /// Command-line flags override the configured scheduling mode.
    fn schedule_mode(&self, config: &UnitsmithConfig) -> ScheduleMode {
        if self.parallel {
            ScheduleMode::Parallel
        } else if self.exhaustive {
            ScheduleMode::Exhaustive
        } else {
            ScheduleMode::from_flags(
                config.generation.stop_when_success,
                config.generation.enable_multithreading,
            )
        }
    }
}

/// Flip `cancel` on the first Ctrl-C; exit on the second.
fn install_shutdown_handler(cancel: CancellationToken) {
    let spawned = std::thread::Builder::new()
        .name("shutdown".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!(error = %e, "Ctrl-C handling unavailable");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                eprintln!("\nShutting down after the rounds in flight (Ctrl-C again to abort)");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to start shutdown handler");
    }
}

fn cmd_run(project_root: &Path, class_name: &str, signature: &str, opts: &RunOptions) -> Result<()> {
    let config = UnitsmithConfig::load(project_root)?;
    let model = load_model(project_root)?;
    let (class, method) = find_target(&model, class_name, signature)?;

    let attempts = opts.attempts.unwrap_or(config.generation.attempt_count);
    if attempts == 0 {
        anyhow::bail!("--attempts must be at least 1");
    }
    let max_rounds = opts.max_rounds.unwrap_or(config.generation.max_rounds);
    let mode = opts.schedule_mode(&config);

    let resolver = build_resolver(project_root, &config);
    let assembler =
        DependencyContextAssembler::new(&model, &resolver, config.context.dependency_depth);

    let provider = provider_from_config(&config.oracle)?;
    let oracle = LlmOracle::new(provider, config.oracle.max_retries);
    let validator = JavacValidator::from_config(&config.harness, project_root);

    let progress = RunProgress::new(attempts);
    let reports = JsonReports::new(project_root);
    let mut writers: Vec<&dyn RecordWriter> = vec![&progress];
    if config.generation.generate_report {
        writers.push(&reports);
    }
    let records = FanOut(writers);

    let coverage = if config.generation.coverage {
        let coverage = CommandCoverage::from_config(&config.harness, project_root);
        if coverage.is_none() {
            tracing::warn!("generation.coverage is set but harness.coverage_command is empty");
        }
        coverage
    } else {
        None
    };

    let mut controller = GenerationRepairController::new(&oracle, &validator, &records)
        .with_gate(ComplexityGate::new(config.gate.policy))
        .with_max_rounds(max_rounds);
    if config.generation.enrich_from_diagnostics {
        controller = controller.with_enrichment(&assembler);
    }
    if let Some(collaborator) = &coverage {
        let harness = &config.harness;
        controller = controller.with_coverage(CoveragePlan {
            collaborator,
            build_paths: vec![project_root.join(&harness.build_path)],
            source_roots: harness.source_roots.iter().map(|p| project_root.join(p)).collect(),
            classpath: harness.classpath.iter().map(|p| project_root.join(p)).collect(),
        });
    }

    eprintln!(
        "Running {attempts} attempt(s) for {} :: {} ({mode:?}, model {}, up to {max_rounds} repair rounds)",
        class.full_name,
        method.signature,
        oracle.model_name()
    );

    let cancel = CancellationToken::new();
    install_shutdown_handler(cancel.clone());

    let runner = MethodAttempts {
        assembler: &assembler,
        controller: &controller,
        class,
        method,
    };
    let summary = ConcurrencyScheduler::new(attempts, mode).run(&runner, &cancel);
    progress.finish();

    for (index, outcome) in summary.outcomes.iter().enumerate() {
        match outcome {
            AttemptOutcome::Finished(result) => {
                let coverage = match &result.coverage {
                    Some(Coverage::Percent(p)) => format!(", coverage {p:.1}%"),
                    Some(Coverage::Error(e)) => format!(", coverage failed: {e}"),
                    None => String::new(),
                };
                eprintln!(
                    "  attempt {index}: {:?} at round {} in {:.1}s{coverage}",
                    result.status,
                    result.round,
                    result.elapsed.as_secs_f64()
                );
            }
            AttemptOutcome::Faulted(reason) => eprintln!("  attempt {index}: faulted: {reason}"),
            AttemptOutcome::NotStarted => eprintln!("  attempt {index}: not started"),
        }
    }

    eprintln!("Usage: {}", oracle.usage());
    if config.generation.generate_report {
        eprintln!("Reports: {}", storage::reports_dir(project_root).display());
    }
    match summary.first_success() {
        Some(index) => eprintln!("Passing test produced by attempt {index}"),
        None => eprintln!("No attempt produced a passing test"),
    }
    Ok(())
}

fn cmd_decompile(project_root: &Path, class_name: &str, methods: &[String]) -> Result<()> {
    let config = UnitsmithConfig::load(project_root)?;
    if config.decompiler.cfr_jar.is_none() {
        anyhow::bail!("decompiler.cfr_jar must be set in .unitsmith/config.toml");
    }
    let resolver = build_resolver(project_root, &config);
    let wanted = normalize_signatures(methods);

    match resolver.resolve(&ProjectIndex::new(), class_name, &wanted) {
        Resolution::Found {
            reconstructed,
            pruned,
        } => {
            eprintln!(
                "{} from {} ({} kept, {} stubbed, {} removed)",
                reconstructed.class_name,
                reconstructed.origin.display(),
                pruned.kept.len(),
                pruned.stubbed,
                pruned.removed
            );
            println!("{}", pruned.source);
            Ok(())
        }
        Resolution::NotFound => anyhow::bail!(
            "{class_name} not found in {} search path entries",
            resolver.search_path().len()
        ),
        Resolution::Unusable(reason) => {
            anyhow::bail!("{class_name} was reconstructed but is unusable: {reason}")
        }
        Resolution::NotApplicable => anyhow::bail!("{class_name} has a source model"),
    }
}

fn cmd_extract_classes(file: Option<&Path>) -> Result<()> {
    let diagnostics = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read diagnostics from stdin")?;
            text
        }
    };
    for class in extract_class_names(&diagnostics) {
        println!("{class}");
    }
    Ok(())
}
