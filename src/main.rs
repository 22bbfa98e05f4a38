use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use bnc_bench::batch::IoBatch;
use bnc_bench::bbb::{wire, BbbIo, TcpTransport};
use bnc_bench::card::BncValidator;
use bnc_bench::config;
use bnc_bench::io_spec::{IoSpec, SuiteValidator};

#[derive(Parser)]
#[command(name = "bnc-host", about = "Batched IO test host for the BNC card")]
struct Cli {
    /// Bench configuration file
    #[arg(short, long, default_value = "bench.toml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a batch file against the card rules without touching
    /// hardware
    Check { batch: PathBuf },
    /// Validate a batch file, execute it on the BBB, and print the
    /// returned readings
    Run { batch: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check { batch } => {
            let batch = load_batch(&batch)?;
            BncValidator.validate(batch.specs())?;
            tracing::info!("Batch is valid ({} IO specifications)", batch.len());
        }
        Command::Run { batch } => {
            let mut batch = load_batch(&batch)?;
            let config = config::load_config(&cli.config)?;
            let mut io = BbbIo::new(TcpTransport::from_config(&config.bbb));
            io.connect().await?;
            let result = io.execute(&mut batch, &BncValidator).await;
            io.disconnect().await?;
            let readings = result?;
            for reading in &readings {
                println!("{} = {}", reading.pin_number, reading.input_value);
            }
        }
    }
    Ok(())
}

/// Reads a wire-format JSON batch file and replays it through the
/// structural checks.
fn load_batch(path: &Path) -> Result<IoBatch, Box<dyn std::error::Error + Send + Sync + 'static>> {
    let raw = std::fs::read_to_string(path)?;
    let wire_specs: Vec<wire::WireSpec> = serde_json::from_str(&raw)?;
    let mut batch = IoBatch::new();
    for wire_spec in &wire_specs {
        batch.specify(IoSpec::try_from(wire_spec)?)?;
    }
    tracing::info!(
        "Loaded {} IO specifications from {}",
        batch.len(),
        path.display()
    );
    Ok(batch)
}
