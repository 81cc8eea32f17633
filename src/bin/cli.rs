use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cropsim::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cropsim")]
#[command(about = "Run configuration-driven daily crop simulations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the run modes of a workflow and their outputs
    Modes {
        /// Path to the workflow YAML file
        #[arg(value_name = "WORKFLOW")]
        workflow: PathBuf,
    },

    /// Print the parameter schema of every step used by a workflow
    Params {
        #[arg(value_name = "WORKFLOW")]
        workflow: PathBuf,
    },

    /// Run one simulation and print its outputs as JSON
    Run {
        #[arg(value_name = "WORKFLOW")]
        workflow: PathBuf,

        /// Path to the run inputs (YAML or JSON)
        #[arg(short, long)]
        inputs: PathBuf,

        /// Run mode (default: first enabled run mode)
        #[arg(short, long)]
        mode: Option<String>,

        /// Include per-day outputs
        #[arg(short, long)]
        daily: bool,
    },

    /// Run every inputs file in a directory in parallel
    RunDir {
        #[arg(value_name = "WORKFLOW")]
        workflow: PathBuf,

        /// Directory of run inputs files
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[arg(short, long)]
        mode: Option<String>,

        /// Maximum number of parallel runs
        #[arg(short, long, default_value = "4")]
        parallel: usize,

        /// Stop starting new runs after the first failure
        #[arg(short, long)]
        fail_fast: bool,
    },

    /// Validate workflow files without running them
    Validate {
        /// Path to workflow file or directory
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "cropsim=debug" } else { "cropsim=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "cropsim failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Modes { workflow } => list_modes(&workflow),
        Commands::Params { workflow } => list_params(&workflow),
        Commands::Run {
            workflow,
            inputs,
            mode,
            daily,
        } => run_single(&workflow, &inputs, mode, daily),
        Commands::RunDir {
            workflow,
            dir,
            mode,
            parallel,
            fail_fast,
        } => run_directory(&workflow, &dir, mode, parallel, fail_fast).await,
        Commands::Validate { path } => validate(&path),
    }
}

fn load_engine(workflow: &Path) -> anyhow::Result<SimulationEngine> {
    let definition = WorkflowLoader::load_definition(workflow, &StepRegistry::with_builtins())?;
    Ok(SimulationEngine::new(definition))
}

fn select_mode(engine: &SimulationEngine, mode: Option<String>) -> anyhow::Result<String> {
    match mode {
        Some(mode) => Ok(mode),
        None => engine
            .default_run_mode()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("workflow enables no run mode; pass --mode")),
    }
}

fn list_modes(workflow: &Path) -> anyhow::Result<bool> {
    let engine = load_engine(workflow)?;

    for mode in engine.definition().run_modes() {
        let flag = if mode.enabled() { "" } else { " [disabled]" };
        println!("{}{}", mode.name(), flag);
        let steps: Vec<_> = mode.steps().iter().map(|s| s.name()).collect();
        println!("  steps: [{}]", steps.join(", "));
        println!("  outputs: [{}]", mode.output_names().join(", "));
    }

    Ok(true)
}

fn list_params(workflow: &Path) -> anyhow::Result<bool> {
    let engine = load_engine(workflow)?;
    println!("{}", serde_json::to_string_pretty(&engine.parameters_list())?);
    Ok(true)
}

fn run_single(
    workflow: &Path,
    inputs: &Path,
    mode: Option<String>,
    daily: bool,
) -> anyhow::Result<bool> {
    let engine = load_engine(workflow)?;
    let mode = select_mode(&engine, mode)?;

    let mut inputs = WorkflowLoader::load_inputs(inputs)?;
    if daily {
        inputs.daily_details = Some(true);
    }

    let summary = engine.run_to_end(inputs, &mode)?;

    let mut out = json!({
        "run_id": summary.run_id,
        "run_mode": summary.run_mode,
        "end_day": summary.end_day,
        "outputs": summary.outputs,
    });
    if let Some(details) = &summary.daily_details {
        out["daily"] = serde_json::to_value(details.rows())?;
    }
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(true)
}

async fn run_directory(
    workflow: &Path,
    dir: &Path,
    mode: Option<String>,
    parallel: usize,
    fail_fast: bool,
) -> anyhow::Result<bool> {
    if !dir.is_dir() {
        anyhow::bail!("Directory not found: {}", dir.display());
    }

    let engine = load_engine(workflow)?;
    let mode = select_mode(&engine, mode)?;

    let result = BatchRunner::new(engine)
        .parallel(parallel)
        .fail_fast(fail_fast)
        .run_mode(mode)
        .run_directory(dir)
        .await?;

    let mut runs = serde_json::Map::new();
    for (id, outcome) in &result.runs {
        let entry = match outcome {
            RunOutcome::Completed(summary) => json!({
                "status": "completed",
                "outputs": summary.outputs,
            }),
            RunOutcome::Failed(e) => json!({ "status": "failed", "error": e.to_string() }),
            RunOutcome::Panicked(e) => json!({ "status": "panicked", "error": e }),
            RunOutcome::Skipped => json!({ "status": "skipped" }),
        };
        runs.insert(id.clone(), entry);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "success": result.success, "runs": runs }))?
    );

    Ok(result.success)
}

fn validate(path: &Path) -> anyhow::Result<bool> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }

    let registry = StepRegistry::with_builtins();

    if path.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file = entry?.path();
            let ext = file.extension().and_then(|e| e.to_str());
            if file.is_file() && matches!(ext, Some("yaml") | Some("yml")) {
                files.push(file);
            }
        }
        files.sort();

        let mut valid = true;
        for file in &files {
            match WorkflowLoader::load_definition(file, &registry) {
                Ok(_) => println!("✓ {}", file.display()),
                Err(e) => {
                    valid = false;
                    println!("✗ {}: {}", file.display(), e);
                }
            }
        }
        if files.is_empty() {
            println!("No workflows found in: {}", path.display());
        }
        Ok(valid)
    } else {
        let definition = WorkflowLoader::load_definition(path, &registry)?;
        println!(
            "✓ {} is valid ({} run modes)",
            path.display(),
            definition.run_mode_names().len()
        );
        Ok(true)
    }
}
