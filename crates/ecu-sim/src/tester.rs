//! Tester side of the in-process bus
//!
//! Sends one request at a time and waits for the matching response, the way a
//! diagnostic tester drives a download.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use ecu_uds::uds::{service_id, Response};
use ecu_uds::{ChannelSink, ChunkPlanner, Frame, FrameAddress, FrameSink, NegativeResponseCode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub blocks_sent: usize,
    pub bytes_sent: usize,
    /// Blocks resent after GeneralProgrammingFailure
    pub retries: u32,
    pub exit_accepted: bool,
}

pub struct Tester {
    address: FrameAddress,
    bus: ChannelSink,
    inbox: mpsc::UnboundedReceiver<Frame>,
    timeout: Duration,
    max_retries: u32,
}

impl Tester {
    pub fn new(
        tester: u8,
        ecu: u8,
        bus: ChannelSink,
        inbox: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        Self {
            address: FrameAddress::new(tester, ecu),
            bus,
            inbox,
            timeout: Duration::from_secs(1),
            max_retries: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Send `request` and wait for the response addressed back to us
    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.bus.send_frame(self.address, request)?;

        let reply_address = self.address.reversed();
        loop {
            let frame = tokio::time::timeout(self.timeout, self.inbox.recv())
                .await
                .context("Timed out waiting for ECU response")?
                .ok_or_else(|| anyhow!("Bus closed before ECU responded"))?;
            if frame.address == reply_address {
                return Ok(frame.data);
            }
            debug!(address = %frame.address, "Skipping frame for another tester");
        }
    }

    /// Transfer `image` block by block, then request transfer exit
    pub async fn download(&mut self, planner: &ChunkPlanner, image: &[u8]) -> Result<TransferReport> {
        let mut report = TransferReport::default();
        let chunks = planner.plan(image);
        info!(
            size = image.len(),
            chunk_size = planner.chunk_size(),
            blocks = chunks.len(),
            "Starting download"
        );

        for chunk in &chunks {
            let request = chunk.to_request();
            let mut attempts = 0;
            loop {
                let response = self.exchange(&request).await?;
                match Response::parse(&response) {
                    Some(Response::Positive {
                        service_id: service_id::TRANSFER_DATA,
                        data,
                    }) if data.first() == Some(&chunk.block) => break,
                    Some(Response::Negative {
                        nrc: NegativeResponseCode::GeneralProgrammingFailure,
                        ..
                    }) if attempts < self.max_retries => {
                        attempts += 1;
                        report.retries += 1;
                        warn!(block = chunk.block, attempts, "Programming failed, resending block");
                    }
                    Some(Response::Negative { nrc, .. }) => {
                        bail!("Block {} rejected: {} (0x{:02X})", chunk.block, nrc, u8::from(nrc))
                    }
                    _ => bail!(
                        "Unexpected response to block {}: {}",
                        chunk.block,
                        hex::encode_upper(&response)
                    ),
                }
            }
            report.blocks_sent += 1;
            report.bytes_sent += chunk.data.len();
        }

        let response = self.exchange(&ChunkPlanner::exit_request(0x00)).await?;
        report.exit_accepted = matches!(
            Response::parse(&response),
            Some(Response::Positive {
                service_id: service_id::REQUEST_TRANSFER_EXIT,
                ..
            })
        );
        if report.exit_accepted {
            info!(blocks = report.blocks_sent, retries = report.retries, "Transfer exit accepted");
        } else {
            warn!(response = %hex::encode_upper(&response), "Transfer exit refused");
        }

        Ok(report)
    }
}
