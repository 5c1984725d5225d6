use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};

use folio::config::Config;
use folio::core::{ExecutionPlan, TaskGraph};
use folio::manifest::Manifest;
use folio::orchestration::{aggregate, Executor, RunEvent};
use folio::provider::{ContentProvider, DegradedProvider, HeadlessProvider, ProviderRegistry};
use folio::{flog, Result};

/// Folio - dependency-aware document section orchestrator
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    FOLIO_DEBUG=1   Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.folio/folio.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Folio subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate the document described by a manifest
    Run {
        /// Path to the manifest file
        manifest: PathBuf,

        /// Write the document here instead of the configured output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the offline degraded provider instead of the LLM backend
        #[arg(long)]
        degraded: bool,
    },
    /// Print the staged execution plan for a manifest
    Plan {
        /// Path to the manifest file
        manifest: PathBuf,
    },
    /// Validate a manifest without executing it
    Validate {
        /// Path to the manifest file
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    folio::log::init_with_debug(cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            manifest,
            output,
            degraded,
        } => run_document(&manifest, output, degraded).await,
        Command::Plan { manifest } => print_plan(&manifest),
        Command::Validate { manifest } => validate_manifest(&manifest),
    }
}

fn load_plan(path: &Path) -> Result<(Manifest, TaskGraph, ExecutionPlan)> {
    let manifest = Manifest::load(path)?;
    let graph = TaskGraph::from_tasks(manifest.tasks())?;
    let plan = ExecutionPlan::resolve(&graph)?;
    Ok((manifest, graph, plan))
}

async fn run_document(path: &Path, output: Option<PathBuf>, degraded: bool) -> Result<()> {
    let config = Config::load()?;
    let (manifest, graph, plan) = load_plan(path)?;

    let default_provider: Arc<dyn ContentProvider> = if degraded {
        Arc::new(DegradedProvider::new())
    } else {
        Arc::new(HeadlessProvider::new(config.effective_command())?)
    };
    let registry = Arc::new(ProviderRegistry::new(default_provider));

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(256);
    let executor = Executor::new(registry, config.executor_config()).with_events(event_tx);

    // Ctrl-C cancels the run cooperatively; settled results still aggregate.
    let cancel = executor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flog!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                RunEvent::StageStarted { index, tasks } => {
                    println!("stage {}: {}", index + 1, tasks.join(", "));
                }
                RunEvent::TaskFinished { task, result } => {
                    println!("  {} — {}", task, result);
                }
                _ => {}
            }
        }
    });

    let outcome = executor.execute(&plan, &graph.task_map()).await?;
    drop(executor);
    let _ = printer.await;

    let template = manifest.document_template();
    let doc = aggregate(&outcome.results, &template);
    let markdown = format!(
        "{}\n---\n*Generated {} — run {}*\n",
        doc.markdown,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        outcome.run_id().short()
    );

    let target = match output {
        Some(path) => path,
        None => {
            config.ensure_dirs()?;
            config
                .output_dir()?
                .join(format!("{}.md", slugify(&manifest.project.name)))
        }
    };
    std::fs::write(&target, markdown)?;

    println!(
        "\n{}: {} succeeded, {} failed, {} skipped",
        target.display(),
        outcome.report.succeeded,
        outcome.report.failed,
        outcome.report.skipped
    );
    if !outcome.is_complete_success() {
        for (name, result) in &outcome.results {
            if let Some(reason) = result.reason() {
                println!("  {}: {}", name, reason);
            }
        }
    }

    Ok(())
}

fn print_plan(path: &Path) -> Result<()> {
    let (_, _, plan) = load_plan(path)?;
    for (index, stage) in plan.stages().iter().enumerate() {
        println!("stage {}: {}", index + 1, stage.members().join(", "));
    }
    Ok(())
}

fn validate_manifest(path: &Path) -> Result<()> {
    let (_, graph, plan) = load_plan(path)?;
    println!(
        "manifest OK: {} task(s), {} dependency edge(s), {} stage(s)",
        graph.task_count(),
        graph.dependency_count(),
        plan.stage_count()
    );
    Ok(())
}

/// Filesystem-friendly slug from a project name.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("document");
    }
    slug
}
