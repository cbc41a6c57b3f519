use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use retargetlib::types::{BlockHeader, HeaderChain, HeaderSource};
use retargetlib::{Adjustment, NetworkProfile, RetargetConfig, Retargeter};

use serde::{Deserialize, Serialize};
use tracing::*;

/// Per-field overrides on top of a network profile. Only the fields present in the file apply.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub interval: Option<u64>,
    pub block_time_seconds: Option<u64>,
    pub min_ratio: Option<f64>,
    pub max_ratio: Option<f64>,
    pub max_target_bits: Option<u32>,
    pub genesis_bits: Option<u32>,
}

impl Overrides {
    pub fn apply(&self, mut config: RetargetConfig) -> RetargetConfig {
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(block_time) = self.block_time_seconds {
            config.block_time_seconds = block_time;
        }
        if let Some(min_ratio) = self.min_ratio {
            config.min_ratio = min_ratio;
        }
        if let Some(max_ratio) = self.max_ratio {
            config.max_ratio = max_ratio;
        }
        if let Some(bits) = self.max_target_bits {
            config.max_target_bits = bits;
        }
        if let Some(bits) = self.genesis_bits {
            config.genesis_bits = bits;
        }
        config
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub profile: NetworkProfile,
    pub retarget: Overrides,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// The retarget parameters in effect, `profile` replacing the one from the file.
    pub fn resolve(&self, profile: Option<NetworkProfile>) -> RetargetConfig {
        let profile = profile.unwrap_or(self.profile);
        self.retarget.apply(profile.config())
    }
}

/// One retarget boundary of an analyzed history.
#[derive(Debug, Clone)]
pub struct PeriodReport {
    pub adjustment: Adjustment,
    /// bits the header at the boundary actually carries, if the history reaches it
    pub recorded_bits: Option<u32>,
}

impl PeriodReport {
    pub fn matches_record(&self) -> Option<bool> {
        self.recorded_bits
            .map(|bits| bits == self.adjustment.new_bits)
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub blocks: u64,
    pub interval: u64,
    pub target_block_time: u64,
    pub genesis: Option<BlockHeader>,
    pub tip: Option<BlockHeader>,
    pub periods: Vec<PeriodReport>,
}

impl Analysis {
    pub fn completed_periods(&self) -> u64 {
        self.blocks / self.interval
    }

    /// blocks mined since the last boundary
    pub fn trailing_blocks(&self) -> u64 {
        self.blocks % self.interval
    }

    pub fn average_block_time(&self) -> Option<f64> {
        match (self.genesis, self.tip) {
            (Some(genesis), Some(tip)) if tip.height > genesis.height => {
                let elapsed = tip.timestamp as f64 - genesis.timestamp as f64;
                Some(elapsed / (tip.height - genesis.height) as f64)
            }
            _ => None,
        }
    }
}

pub struct Core {
    pub config: RetargetConfig,
    engine: Retargeter,
}

impl Core {
    pub fn new(config: RetargetConfig) -> Result<Self> {
        let engine =
            Retargeter::new(config.clone()).context("Invalid retarget configuration")?;
        Ok(Core { config, engine })
    }

    /// Load the config file, if any, and build the engine for it.
    pub fn load_config(path: Option<&Path>, profile: Option<NetworkProfile>) -> Result<Self> {
        let file = match path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        let config = file.resolve(profile);
        debug!(?config, "resolved retarget configuration");
        Core::new(config)
    }

    pub fn engine(&self) -> &Retargeter {
        &self.engine
    }

    /// Recompute every retarget boundary the history covers, including the one right after the
    /// tip.
    pub fn analyze(&self, chain: &HeaderChain) -> Result<Analysis> {
        let blocks = chain.len();
        let mut periods = Vec::new();

        let mut height = self.config.interval;
        while height <= blocks {
            let adjustment = self
                .engine
                .adjustment(chain, height)
                .with_context(|| format!("Failed to retarget at height {height}"))?
                .context("boundary height produced no adjustment")?;
            let recorded_bits = chain.header_at(height).map(|header| header.bits);

            info!(
                height,
                old_bits = format_args!("0x{:08x}", adjustment.old_bits),
                new_bits = format_args!("0x{:08x}", adjustment.new_bits),
                "period analyzed"
            );
            if recorded_bits.is_some_and(|bits| bits != adjustment.new_bits) {
                warn!(height, "recorded bits differ from the computed retarget");
            }

            periods.push(PeriodReport {
                adjustment,
                recorded_bits,
            });
            height += self.config.interval;
        }

        Ok(Analysis {
            blocks,
            interval: self.config.interval,
            target_block_time: self.config.block_time_seconds,
            genesis: chain.header_at(0),
            tip: chain.tip().copied(),
            periods,
        })
    }

    /// Bits for `height`, defaulting to the block after the tip.
    pub fn next_bits(&self, chain: &HeaderChain, height: Option<u64>) -> Result<(u64, u32)> {
        let height = height.unwrap_or_else(|| chain.next_height());
        let bits = self
            .engine
            .next_bits(chain, height)
            .with_context(|| format!("Failed to compute bits for height {height}"))?;
        Ok((height, bits))
    }

    /// Build a history of `blocks` headers spaced `spacing` seconds apart, each carrying the
    /// bits the engine prescribes for it.
    pub fn simulate(&self, blocks: u64, spacing: u64, start: u64) -> Result<HeaderChain> {
        let mut chain = HeaderChain::new();
        for height in 0..blocks {
            let bits = self.engine.next_bits(&chain, height)?;
            let timestamp = spacing
                .checked_mul(height)
                .and_then(|offset| start.checked_add(offset))
                .context("timestamp overflow")?;
            chain.push(BlockHeader::new(height, timestamp, bits))?;
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_profile() {
        let config: Config = toml::from_str(
            r#"
            profile = "mainnet"

            [retarget]
            block_time_seconds = 12
            max_ratio = 2.0
            "#,
        )
        .unwrap();

        let resolved = config.resolve(None);
        assert_eq!(resolved.block_time_seconds, 12);
        assert_eq!(resolved.max_ratio, 2.0);
        assert_eq!(resolved.max_target_bits, 0x1d00ffff);

        let regtest = config.resolve(Some(NetworkProfile::Regtest));
        assert_eq!(regtest.max_target_bits, 0x207fffff);
        assert_eq!(regtest.block_time_seconds, 12);
    }

    #[test]
    fn hex_bits_in_config() {
        let config: Config = toml::from_str(
            r#"
            [retarget]
            max_target_bits = 0x1d00ffff
            genesis_bits = 0x1c00ffff
            "#,
        )
        .unwrap();
        let resolved = config.resolve(None);
        assert_eq!(resolved.max_target_bits, 0x1d00ffff);
        assert_eq!(resolved.genesis_bits, 0x1c00ffff);
        assert_eq!(resolved.interval, 2016);
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        let err = toml::from_str::<Config>("[retarget]\nblock_time = 600\n").unwrap_err();
        assert!(err.to_string().contains("block_time"));
        assert!(toml::from_str::<Config>("network = \"mainnet\"\n").is_err());
    }

    #[test]
    fn load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.toml");
        fs::write(&path, "profile = \"testnet\"\n").unwrap();

        let core = Core::load_config(Some(path.as_path()), None).unwrap();
        assert_eq!(core.config, NetworkProfile::Testnet.config());

        fs::write(&path, "[retarget]\ninterval = 0\n").unwrap();
        assert!(Core::load_config(Some(path.as_path()), None).is_err());
    }

    #[test]
    fn simulate_then_analyze() {
        let core = Core::new(NetworkProfile::Regtest.config()).unwrap();
        let chain = core.simulate(4032, 0, 1_704_067_200).unwrap();
        assert_eq!(chain.len(), 4032);

        let analysis = core.analyze(&chain).unwrap();
        assert_eq!(analysis.completed_periods(), 2);
        assert_eq!(analysis.trailing_blocks(), 0);
        assert_eq!(analysis.periods.len(), 2);

        let first = &analysis.periods[0];
        assert_eq!(first.adjustment.new_bits, 0x201fffff);
        assert_eq!(first.matches_record(), Some(true));

        // the boundary right after the tip is computed but not yet mined
        let second = &analysis.periods[1];
        assert_eq!(second.adjustment.height, 4032);
        assert_eq!(second.adjustment.new_bits, 0x2007ffff);
        assert_eq!(second.recorded_bits, None);
        assert_eq!(analysis.average_block_time(), Some(0.0));
    }

    #[test]
    fn analyze_flags_wrong_bits() {
        let core = Core::new(NetworkProfile::Regtest.config()).unwrap();
        let headers = (0..2017).map(|height| BlockHeader::new(height, height, 0x207fffff));
        let chain = HeaderChain::from_headers(headers).unwrap();

        let analysis = core.analyze(&chain).unwrap();
        assert_eq!(analysis.trailing_blocks(), 1);
        assert_eq!(analysis.periods[0].matches_record(), Some(false));
    }

    #[test]
    fn next_bits_defaults_to_tip() {
        let core = Core::new(NetworkProfile::Regtest.config()).unwrap();
        let chain = core.simulate(10, 12, 0).unwrap();
        assert_eq!(core.next_bits(&chain, None).unwrap(), (10, 0x207fffff));
        assert!(core.next_bits(&chain, Some(2016)).is_err());
    }
}
