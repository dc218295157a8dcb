//! GridPhase Simulator CLI
//!
//! Runs presets, a config file, or a seeded exploration loop, then prints
//! the per-category leaderboards.

use clap::Parser;
use gridphase_core::RunConfig;
use gridphase_sim::{
    BatchRunner, EngineContext, ExplorationPolicy, FixedConfig, PresetId, RunOutcome, RunStore,
    SeededSweep,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Seed extension reserved for the exploration policy.
const POLICY_SEED_EXTENSION: u64 = 1;

#[derive(Parser, Debug)]
#[command(name = "gridphase-sim")]
#[command(about = "Run phase-grid simulations and rank their anomaly scores", long_about = None)]
struct Args {
    /// Master seed for determinism
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Preset to run (canonical, reflect_box, sticky_corner, inversion_storm, clamp_drift, all)
    #[arg(short = 'P', long, default_value = "canonical")]
    preset: String,

    /// JSON file holding a RunConfig (overrides --preset)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mutate the config between iterations instead of repeating it
    #[arg(long)]
    explore: bool,

    /// Number of driver iterations
    #[arg(short, long, default_value = "1")]
    iterations: u64,

    /// Delay between iterations in milliseconds
    #[arg(long, default_value = "0")]
    interval_ms: u64,

    /// Entries kept per leaderboard category
    #[arg(long, default_value = "1000")]
    capacity: usize,

    /// Directory for run artifacts and leaderboard files
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Leaderboard entries shown per category
    #[arg(long, default_value = "5")]
    top: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,
}

fn load_config(path: &Path) -> Result<RunConfig, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    RunConfig::from_json(&json).map_err(|e| {
        format!("cannot load {}: {} (field {})", path.display(), e, e.field())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("GridPhase Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Build the owning context, restoring persisted categories if asked
    let mut context = EngineContext::new(args.seed, args.capacity);
    let store = match &args.out {
        Some(dir) => match RunStore::new(dir) {
            Ok(store) => Some(store),
            Err(e) => {
                error!("Cannot open store at {}: {}", dir.display(), e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    if let Some(store) = &store {
        store.load_all(context.leaderboards_mut());
        let next = store.next_run_counter(context.leaderboards()).unwrap_or_else(|e| {
            warn!("Cannot scan {}: {} - numbering from 0", store.dir().display(), e);
            0
        });
        context = context.with_run_counter(next);
    }

    let mut runner = BatchRunner::new(context);
    if let Some(store) = store {
        runner = runner.with_store(store);
    }

    // Run
    let mut outcomes: Vec<RunOutcome> = Vec::new();

    if args.config.is_none() && args.preset == "all" && !args.explore {
        let configs = PresetId::all().iter().map(PresetId::config).collect();
        outcomes.extend(runner.run_batch(configs));
    } else {
        let base = match &args.config {
            Some(path) => load_config(path).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }),
            None => args
                .preset
                .parse::<PresetId>()
                .unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    let names: Vec<&str> = PresetId::all().iter().map(PresetId::name).collect();
                    eprintln!("Available presets: {}, all", names.join(", "));
                    std::process::exit(1);
                })
                .config(),
        };

        let mut policy: Box<dyn ExplorationPolicy> = if args.explore {
            let seed = runner.context().derive_seed(POLICY_SEED_EXTENSION);
            Box::new(SeededSweep::new(base, seed))
        } else {
            Box::new(FixedConfig::new(base))
        };

        // One iteration per tick; each finishes before the next tick is awaited.
        let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
        for _ in 0..args.iterations {
            ticker.tick().await;
            outcomes.push(runner.run_iteration(policy.as_mut()));
        }
    }

    match runner.checkpoint() {
        Ok(removed) if removed > 0 => info!("Pruned {} unranked run files", removed),
        Ok(_) => {}
        Err(e) => warn!("Checkpoint failed: {}", e),
    }

    // Summary
    let failed_count = outcomes.iter().filter(|o| !o.passed).count();
    let total = outcomes.len();
    let leaderboards = runner.context().leaderboards();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "runs": outcomes.iter().map(|o| {
                serde_json::json!({
                    "run_id": o.run_id,
                    "passed": o.passed,
                    "steps": o.total_steps,
                    "events": o.event_count,
                    "inversions": o.inversion_count,
                    "optimal": o.scores.as_ref().map(|s| s.is_optimal()),
                    "ranked_in": o.ranked_in,
                    "failure_reason": o.failure_reason,
                })
            }).collect::<Vec<_>>(),
            "leaderboards": leaderboards.categories().map(|category| {
                let top = leaderboards.query(category, args.top).iter().map(|entry| {
                    serde_json::json!({ "run_id": entry.run_id, "score": entry.score })
                }).collect::<Vec<_>>();
                (category.to_string(), serde_json::Value::Array(top))
            }).collect::<serde_json::Map<_, _>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Cannot render summary: {}", e),
        }
    } else {
        for outcome in &outcomes {
            if outcome.passed {
                info!(
                    "✓ {} {} steps, {} events ({} inversions)",
                    outcome.run_id,
                    outcome.total_steps,
                    outcome.event_count,
                    outcome.inversion_count
                );
            } else {
                error!(
                    "✗ {} REJECTED: {}",
                    outcome.run_id,
                    outcome.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for category in leaderboards.categories() {
            info!("Top {} by {}:", args.top, category);
            for (rank, entry) in leaderboards.query(category, args.top).iter().enumerate() {
                info!("  {:>2}. {} {:.6}", rank + 1, entry.run_id, entry.score);
            }
        }

        if failed_count == 0 {
            info!("✅ All {} runs completed", total);
        } else {
            error!("❌ {}/{} runs rejected", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
