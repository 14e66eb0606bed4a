//! Hazard DST Simulator CLI
//!
//! Enact deadlock, livelock and starvation scenarios and check their
//! properties.

use clap::Parser;
use hazard_core::{AttemptBound, CadenceMode, LockOrder};
use hazard_sim::scenarios::ScenarioId;
use hazard_sim::{ScenarioReport, ScenarioResult, ScenarioRunner, SimConfig, SimExport};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Hazard Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "hazard-sim")]
#[command(about = "Enact deadlock, livelock and starvation scenarios", long_about = None)]
struct Args {
    /// Scenario to run (deadlock, livelock, starvation, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Attempts each negotiating agent makes before giving up
    #[arg(short, long, default_value = "5")]
    attempts: u32,

    /// Negotiate without an attempt bound (runs until the livelock limit)
    #[arg(long)]
    unbounded: bool,

    /// Drive the cadence from a timer instead of releasing it when every
    /// agent is waiting (symmetric runs may then commit and fail)
    #[arg(long)]
    periodic: bool,

    /// Cadence period in microseconds (with --periodic)
    #[arg(long, default_value = "1000")]
    tick_us: u64,

    /// Delay between an agent's first and second lock, in milliseconds
    #[arg(long, default_value = "2000")]
    delay_ms: u64,

    /// Acquire both cells in the same order (no deadlock expected)
    #[arg(long)]
    consistent: bool,

    /// Deadlock hang limit as a multiple of the delay
    #[arg(long, default_value = "2")]
    hang_factor: u32,

    /// Limit for an unbounded negotiation, in milliseconds
    #[arg(long, default_value = "1000")]
    livelock_limit_ms: u64,

    /// Budget of each starvation run, in milliseconds
    #[arg(short, long, default_value = "1000")]
    duration_ms: u64,

    /// Greedy worker hold per loop, in nanoseconds
    #[arg(long, default_value = "3")]
    greedy_hold_ns: u64,

    /// Polite worker hold per cycle, in nanoseconds
    #[arg(long, default_value = "1")]
    polite_hold_ns: u64,

    /// Minimum solo/contended polite throughput ratio
    #[arg(long, default_value = "2.0")]
    min_ratio: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the full results to a JSON file
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        let bound = if self.unbounded {
            AttemptBound::Unbounded
        } else {
            AttemptBound::Limited(self.attempts)
        };
        let cadence = if self.periodic {
            CadenceMode::Periodic(Duration::from_micros(self.tick_us.max(1)))
        } else {
            CadenceMode::Lockstep
        };
        let order = if self.consistent {
            LockOrder::Consistent
        } else {
            LockOrder::Opposed
        };

        let mut config = SimConfig::default()
            .with_deadlock_delay(Duration::from_millis(self.delay_ms))
            .with_attempt_bound(bound)
            .with_cadence(cadence)
            .with_starvation_duration(Duration::from_millis(self.duration_ms))
            .with_holds(
                Duration::from_nanos(self.greedy_hold_ns),
                Duration::from_nanos(self.polite_hold_ns),
            )
            .with_min_degradation(self.min_ratio);
        config.deadlock = config.deadlock.with_order(order);
        config.hang_factor = self.hang_factor;
        config.livelock_limit = Duration::from_millis(self.livelock_limit_ms);
        config
    }
}

fn init_logging(args: &Args) {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Keep stdout clean for the JSON summary.
    let result = if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn log_result(result: &ScenarioResult) {
    if let Some(ScenarioReport::Livelock(run)) = &result.report {
        if let Some(report) = &run.report {
            for agent in &report.agents {
                info!("{}", agent.render());
            }
        }
    }

    if result.passed {
        info!("✓ {} PASSED in {:?}", result.scenario.name(), result.elapsed);
    } else {
        error!(
            "✗ {} FAILED: {}",
            result.scenario.name(),
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    if !args.json {
        info!("Hazard DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: deadlock, livelock, starvation, all");
                std::process::exit(1);
            }
        }
    };

    let config = args.sim_config();
    let runner = ScenarioRunner::new(config.clone());
    let mut export = SimExport::new(config);

    for scenario in &scenarios {
        let result = runner.run(*scenario).await;
        if !args.json {
            log_result(&result);
        }
        export.add_result(result);
    }

    let total = export.results.len();
    let failed_count = export.failed_count();

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": export.results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "code": r.scenario.code(),
                    "passed": r.passed,
                    "elapsed_ms": r.elapsed.as_millis() as u64,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenarios passed!", total);
        } else {
            error!("❌ {}/{} scenarios failed!", failed_count, total);
            for result in export.results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {}: {}",
                    result.scenario.name(),
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} results to {}", total, path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
