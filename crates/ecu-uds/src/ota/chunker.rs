//! Tester-side chunk planning
//!
//! Splits an image into TransferData requests using the same block counter
//! rules the ECU enforces.

use super::session::block_checksum;
use crate::config::TransferConfig;
use crate::uds::{self, service_id};

/// One planned TransferData request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChunk<'a> {
    pub block: u8,
    pub data: &'a [u8],
    pub checksum: u8,
}

impl PlannedChunk<'_> {
    /// Request frame `[PCI, 0x36, block, data...]`
    pub fn to_request(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + self.data.len());
        body.push(self.block);
        body.extend_from_slice(self.data);
        uds::request(service_id::TRANSFER_DATA, &body)
    }
}

#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    config: TransferConfig,
    chunk_size: usize,
}

impl ChunkPlanner {
    /// `chunk_size` is clamped to at least one byte
    pub fn new(config: TransferConfig, chunk_size: usize) -> Self {
        Self {
            config,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of TransferData requests needed for `len` bytes
    pub fn block_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Chunks of `image` in transmission order
    pub fn plan<'a>(&self, image: &'a [u8]) -> Vec<PlannedChunk<'a>> {
        let mut block = self.config.block_counter_start;
        image
            .chunks(self.chunk_size)
            .map(|data| {
                let chunk = PlannedChunk {
                    block,
                    data,
                    checksum: block_checksum(data),
                };
                block = self.config.next_block(block);
                chunk
            })
            .collect()
    }

    /// Checksums the ECU should record for `image`
    pub fn checksums(&self, image: &[u8]) -> Vec<u8> {
        self.plan(image).iter().map(|chunk| chunk.checksum).collect()
    }

    /// RequestTransferExit frame carrying `parameter`
    pub fn exit_request(parameter: u8) -> Vec<u8> {
        uds::request(service_id::REQUEST_TRANSFER_EXIT, &[parameter])
    }
}
