//! ECU OTA simulator
//!
//! Runs one firmware transfer from a simulated tester to a simulated ECU.
//!
//! # Usage
//!
//! Transfer a generated demo image:
//! ```bash
//! ./ecu-sim
//! ```
//!
//! Transfer an image file, persisting DIDs between runs:
//! ```bash
//! ./ecu-sim --config config/ecu-sim.toml --image firmware.bin --did-store dids.txt
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ecu_sim::{FirmwareImage, SimConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ecu-sim")]
#[command(about = "Simulated ECU receiving an OTA firmware transfer")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Firmware image to transfer; a demo image is generated when omitted
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Payload bytes per TransferData request
    #[arg(long)]
    chunk_size: Option<usize>,

    /// File backing the DID store
    #[arg(long)]
    did_store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "ecu_sim=debug,ecu_uds=debug"
    } else {
        "ecu_sim=info,ecu_uds=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path);
            SimConfig::load(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
        }
        None => SimConfig::default(),
    };
    if let Some(chunk_size) = args.chunk_size {
        config.transfer.chunk_size = chunk_size;
    }
    if let Some(path) = args.did_store {
        config.store.path = Some(path);
    }

    let image = match &args.image {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?,
        None => demo_image(&config.ecu.id)?,
    };

    info!(
        ecu = %config.ecu.id,
        ecu_address = format!("0x{:02X}", config.ecu.address),
        tester_address = format!("0x{:02X}", config.tester.address),
        image_size = image.len(),
        chunk_size = config.transfer.chunk_size,
        "Starting OTA simulation"
    );

    let run = tokio::select! {
        run = ecu_sim::run_ota(&config, &image) => run?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            return Ok(());
        }
    };

    info!(
        blocks = run.transfer.blocks_sent,
        bytes = run.transfer.bytes_sent,
        retries = run.transfer.retries,
        status = ?run.node.final_status,
        "OTA simulation finished"
    );

    if !run.succeeded() {
        anyhow::bail!("OTA transfer did not complete");
    }
    Ok(())
}

fn demo_image(ecu_id: &str) -> Result<Vec<u8>> {
    let payload = (0..4096u32).map(|i| (i.wrapping_mul(31) ^ 0x5A) as u8).collect();
    Ok(FirmwareImage::new(ecu_id, "v1.0.0-demo", payload).to_bytes()?)
}
