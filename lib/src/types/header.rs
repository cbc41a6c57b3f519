use crate::{U256, compact, error::Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The part of a block header retargeting cares about.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// position of the block in the chain, genesis is 0.
    pub height: u64,
    /// seconds since the unix epoch, as declared by the miner. Not guaranteed to increase from
    /// one block to the next.
    pub timestamp: u64,
    /// compact encoding of the target the block hash had to meet.
    pub bits: u32,
}

impl BlockHeader {
    pub fn new(height: u64, timestamp: u64, bits: u32) -> Self {
        BlockHeader {
            height,
            timestamp,
            bits,
        }
    }

    /// decoded target
    pub fn target(&self) -> Result<U256> {
        Ok(compact::decode(self.bits)?)
    }

    /// timestamp as a UTC date, `None` if it is out of chrono's range
    pub fn time(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}
