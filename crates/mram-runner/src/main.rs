//! Headless runner: load a bridge config and a scenario, clock the system
//! until the script drains, and report every completed transaction.

use std::error::Error;
use std::path::PathBuf;

use axi_mram_bridge::BridgeConfig;
use clap::Parser;
use mram_system::{Completion, Outcome, Scenario, System};
use sim_core::Observable;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mram-runner", about = "Clock an AXI4-to-MRAM bridge through a scripted scenario")]
struct Cli {
    /// Bridge configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario file (JSON) with device setup and transactions.
    #[arg(long)]
    scenario: PathBuf,

    /// Give up after this many cycles.
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: u64,

    /// Print every observable path after the run.
    #[arg(long)]
    dump: bool,

    /// Emit completions as JSON lines instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    let scenario = Scenario::load(&cli.scenario)?;
    tracing::info!(
        transactions = scenario.transactions.len(),
        timeout_budget = config.timeout_budget,
        read_latency = config.read_latency,
        "scenario loaded"
    );

    let mut system = System::from_scenario(config, &scenario)?;
    let result = system.run(cli.max_ticks);

    for completion in system.completions() {
        if cli.json {
            println!("{}", serde_json::to_string(completion)?);
        } else {
            println!("{}", describe(completion));
        }
    }
    if cli.dump {
        for (path, value) in system.snapshot() {
            println!("{path} = {value}");
        }
    }

    result?;
    tracing::info!(cycles = system.cycle(), "run complete");
    Ok(())
}

fn describe(completion: &Completion) -> String {
    let span = format!(
        "#{id} cycles {start}..{end}",
        id = completion.id,
        start = completion.issued_at,
        end = completion.completed_at
    );
    match &completion.outcome {
        Outcome::Write { resp } => format!("{span} write {resp:?}"),
        Outcome::Read { beats } => {
            let words: Vec<String> = beats
                .iter()
                .map(|b| {
                    if b.resp.is_error() {
                        "ERR".to_string()
                    } else {
                        format!("{:#x}", b.data)
                    }
                })
                .collect();
            format!("{span} read [{}]", words.join(", "))
        }
    }
}
