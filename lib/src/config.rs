use serde::{Deserialize, Serialize};

use crate::{
    DIFFICULTY_UPDATE_INTERVAL, MAX_ADJUSTMENT_RATIO, MIN_ADJUSTMENT_RATIO,
    PRODUCTION_BLOCK_TIME, PRODUCTION_MAX_TARGET_BITS, REGTEST_MAX_TARGET_BITS, TEST_BLOCK_TIME,
    U256, compact,
    error::{Result, RetargetError},
};

/// Networks with preset retarget parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Mainnet,
    Testnet,
    #[default]
    Regtest,
}

impl NetworkProfile {
    pub fn config(self) -> RetargetConfig {
        match self {
            NetworkProfile::Mainnet => RetargetConfig {
                block_time_seconds: PRODUCTION_BLOCK_TIME,
                max_target_bits: PRODUCTION_MAX_TARGET_BITS,
                genesis_bits: PRODUCTION_MAX_TARGET_BITS,
                ..RetargetConfig::regtest()
            },
            NetworkProfile::Testnet => RetargetConfig {
                block_time_seconds: TEST_BLOCK_TIME,
                max_target_bits: PRODUCTION_MAX_TARGET_BITS,
                genesis_bits: PRODUCTION_MAX_TARGET_BITS,
                ..RetargetConfig::regtest()
            },
            NetworkProfile::Regtest => RetargetConfig::regtest(),
        }
    }
}

/// Parameters of the retarget rule. Missing fields fall back to the regtest profile.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetargetConfig {
    /// blocks per retarget period
    pub interval: u64,
    /// ideal seconds between blocks
    pub block_time_seconds: u64,
    /// lower bound of the per-period ratio actual/target timespan
    pub min_ratio: f64,
    /// upper bound of the per-period ratio actual/target timespan
    pub max_ratio: f64,
    /// compact form of the easiest target the network accepts
    pub max_target_bits: u32,
    /// bits of the genesis block
    pub genesis_bits: u32,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self::regtest()
    }
}

impl RetargetConfig {
    fn regtest() -> Self {
        RetargetConfig {
            interval: DIFFICULTY_UPDATE_INTERVAL,
            block_time_seconds: TEST_BLOCK_TIME,
            min_ratio: MIN_ADJUSTMENT_RATIO,
            max_ratio: MAX_ADJUSTMENT_RATIO,
            max_target_bits: REGTEST_MAX_TARGET_BITS,
            genesis_bits: REGTEST_MAX_TARGET_BITS,
        }
    }

    /// seconds one full period should take
    pub fn target_timespan(&self) -> u64 {
        self.interval.saturating_mul(self.block_time_seconds)
    }

    pub fn max_target(&self) -> Result<U256> {
        compact::decode(self.max_target_bits)
            .map_err(|e| RetargetError::InvalidConfig(format!("max target: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(RetargetError::InvalidConfig(
                "interval must be at least one block".into(),
            ));
        }
        if self.block_time_seconds == 0 {
            return Err(RetargetError::InvalidConfig(
                "block time must be at least one second".into(),
            ));
        }
        if self.interval.checked_mul(self.block_time_seconds).is_none() {
            return Err(RetargetError::InvalidConfig(
                "interval * block time overflows".into(),
            ));
        }
        for (name, ratio) in [("min_ratio", self.min_ratio), ("max_ratio", self.max_ratio)] {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(RetargetError::InvalidConfig(format!(
                    "{name} must be a positive number, got {ratio}"
                )));
            }
        }
        if self.min_ratio > self.max_ratio {
            return Err(RetargetError::InvalidConfig(format!(
                "min_ratio {} is above max_ratio {}",
                self.min_ratio, self.max_ratio
            )));
        }

        let max_target = self.max_target()?;
        let genesis = compact::decode(self.genesis_bits)
            .map_err(|e| RetargetError::InvalidConfig(format!("genesis bits: {e}")))?;
        if genesis > max_target {
            return Err(RetargetError::InvalidConfig(format!(
                "genesis bits 0x{:08x} are easier than the max target 0x{:08x}",
                self.genesis_bits, self.max_target_bits
            )));
        }
        Ok(())
    }
}
