//! ecu-sim - OTA transfer over an in-process bus
//!
//! Wires a tester and one simulated ECU together with tokio channels and
//! runs a complete TransferData / RequestTransferExit sequence.

pub mod config;
pub mod firmware;
pub mod node;
pub mod tester;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use ecu_uds::{ChannelSink, ChunkPlanner, DidStore, FileDidStore, MemoryDidStore};
use tracing::info;

pub use config::SimConfig;
pub use firmware::{FirmwareError, FirmwareImage};
pub use node::{EcuNode, InstalledImage, NodeReport};
pub use tester::{Tester, TransferReport};

/// Result of one simulated OTA run
#[derive(Debug, Clone)]
pub struct OtaRun {
    pub transfer: TransferReport,
    pub node: NodeReport,
}

impl OtaRun {
    pub fn succeeded(&self) -> bool {
        self.transfer.exit_accepted && self.node.installed.is_some()
    }
}

pub fn open_store(config: &SimConfig) -> Result<Arc<dyn DidStore>> {
    let store: Arc<dyn DidStore> = match &config.store.path {
        Some(path) => {
            info!(path = %path.display(), "Using file DID store");
            Arc::new(FileDidStore::open(path)?)
        }
        None => Arc::new(MemoryDidStore::new()),
    };
    Ok(store)
}

/// Transfer `image` from the tester to the ECU described by `config`
pub async fn run_ota(config: &SimConfig, image: &[u8]) -> Result<OtaRun> {
    if image.len() > config.transfer.memory_size {
        bail!(
            "Image of {} bytes does not fit in {} bytes of flash",
            image.len(),
            config.transfer.memory_size
        );
    }

    let store = open_store(config)?;
    let (ecu_bus, tester_inbox) = ChannelSink::pair();
    let (tester_bus, ecu_inbox) = ChannelSink::pair();

    let mut node = EcuNode::new(config, Arc::new(ecu_bus), store, ecu_inbox);
    node.begin_download(image.len())?;
    let node_task = tokio::spawn(node.run());

    let mut tester = Tester::new(
        config.tester.address,
        config.ecu.address,
        tester_bus,
        tester_inbox,
    )
    .with_timeout(Duration::from_millis(config.tester.response_timeout_ms))
    .with_max_retries(config.tester.max_retries);

    let planner = ChunkPlanner::new(config.transfer.counters.clone(), config.transfer.chunk_size);
    let transfer = tester.download(&planner, image).await;

    // Closing the tester side ends the node loop if it is still waiting
    drop(tester);
    let node = node_task.await??;

    Ok(OtaRun {
        transfer: transfer?,
        node,
    })
}
