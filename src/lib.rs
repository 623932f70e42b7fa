// src/lib.rs

pub mod action;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod warehouse;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PipelineFile;
use crate::dag::graph_from_pipeline;
use crate::engine::{Engine, EngineOptions, RunReport, RunStatus};
use crate::warehouse::{ConnectionParams, PostgresWarehouse};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + graph construction (all validation happens here,
///   before anything executes)
/// - the warehouse connection
/// - the engine
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = graph_from_pipeline(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(ExitCode::SUCCESS);
    }

    let params = ConnectionParams::resolve(&cfg.connection)?;
    let warehouse = Arc::new(PostgresWarehouse::connect(&params)?);

    let options = EngineOptions {
        max_parallel_tasks: cfg.engine.max_parallel_tasks,
        fail_run_on_skip: cfg.engine.fail_run_on_skip,
    };

    let engine = Engine::new(graph, options, warehouse);

    // Ctrl-C → cooperative cancellation.
    {
        let cancel = engine.cancellation_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; cancelling run");
            cancel.cancel();
        });
    }

    let report = engine.run().await;
    print_report(&report);

    Ok(match report.status {
        RunStatus::Succeeded => ExitCode::SUCCESS,
        RunStatus::Failed | RunStatus::Cancelled => ExitCode::FAILURE,
    })
}

/// Simple dry-run output: print engine policy, tasks and dependencies.
fn print_dry_run(cfg: &PipelineFile) {
    println!("pipedag dry-run");
    println!("  engine.retry_limit = {}", cfg.engine.retry_limit);
    println!("  engine.retry_delay_secs = {}", cfg.engine.retry_delay_secs);
    match cfg.engine.max_parallel_tasks {
        Some(n) => println!("  engine.max_parallel_tasks = {n}"),
        None => println!("  engine.max_parallel_tasks = unbounded"),
    }
    println!("  engine.fail_run_on_skip = {}", cfg.engine.fail_run_on_skip);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      kind: {}", task.kind);
        if !task.depends_on.is_empty() {
            println!("      depends_on: {:?}", task.depends_on);
        }
        if let Some(ref table) = task.table {
            println!("      table: {table}");
        }
        if let Some(ref source) = task.source {
            println!("      source: {source}");
        }
        if !task.check.is_empty() {
            println!("      checks: {}", task.check.len());
        }
        if let Some(limit) = task.retry_limit {
            println!("      retry_limit: {limit}");
        }
    }
}

/// Print the final run report to stdout.
fn print_report(report: &RunReport) {
    let status = match report.status {
        RunStatus::Succeeded => "succeeded",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    };
    println!("pipedag run {status}");

    for (id, task) in &report.tasks {
        println!(
            "  {:<32} {:<10} attempts={}",
            id,
            task.state.to_string(),
            task.attempts
        );
        if let Some(ref err) = task.error {
            println!("      error: {err}");
        }
    }
}
