//! CLI entrypoint for the brickalloc storm harness.

use std::path::PathBuf;

use brickalloc_harness::{AllocatorKind, FitChoice, Scenario, StormConfig, run_storm};
use clap::{Parser, Subcommand};

/// Workload tooling for brickalloc.
#[derive(Debug, Parser)]
#[command(name = "brickalloc-harness")]
#[command(about = "Deterministic allocation storms against brickalloc trees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a seeded allocation storm and emit a JSON report.
    Storm {
        /// Allocator tree to drive.
        #[arg(long, value_enum, default_value = "free-list")]
        allocator: AllocatorKind,
        /// Free-list fit policy.
        #[arg(long, value_enum, default_value = "first-fit")]
        fit: FitChoice,
        /// Workload shape.
        #[arg(long, value_enum, default_value = "random-churn")]
        scenario: Scenario,
        /// Random seed.
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Number of allocate/deallocate operations.
        #[arg(long, default_value_t = 10_000)]
        ops: usize,
        /// Arena capacity in bytes.
        #[arg(long, default_value_t = 64 * 1024)]
        capacity: usize,
        /// Audit invariants every N ops (0 audits only at the end).
        #[arg(long, default_value_t = 1)]
        audit_every: usize,
        /// Output JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Storm {
            allocator,
            fit,
            scenario,
            seed,
            ops,
            capacity,
            audit_every,
            output,
        } => {
            let config = StormConfig {
                allocator,
                fit: fit.into(),
                scenario,
                seed,
                ops,
                capacity,
                audit_every,
            };
            eprintln!(
                "Running {} storm on {} ({}), seed={seed}, ops={ops}, capacity={capacity}",
                scenario.as_str(),
                allocator.as_str(),
                config.fit.as_str(),
            );
            let report = run_storm(&config).map_err(|err| format!("storm failed: {err}"))?;
            let body = serde_json::to_string_pretty(&report)?;
            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, body)?;
                eprintln!("Wrote storm report to {}", path.display());
            } else {
                println!("{body}");
            }
        }
    }

    Ok(())
}
