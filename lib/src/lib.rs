pub mod compact;
pub mod config;
pub mod engine;
pub mod error;
pub mod types;
pub mod util;

pub use compact::CompactError;
pub use config::{NetworkProfile, RetargetConfig};
pub use engine::{Adjustment, Retargeter, TargetClamp, difficulty_factor};
pub use error::RetargetError;
pub use types::{BlockHeader, HeaderChain, HeaderSource};

use serde::{Deserialize, Serialize};
use uint::construct_uint;

construct_uint! {
    // construct an unsigned 256-bit integer
    // 4 x 64bit
    #[derive(Serialize, Deserialize)]
    pub struct U256(4);
}

/// Blocks per retarget period
pub const DIFFICULTY_UPDATE_INTERVAL: u64 = 2016;
/// Ideal block time in seconds for the test networks
pub const TEST_BLOCK_TIME: u64 = 12;
/// Ideal block time in seconds for the production network
pub const PRODUCTION_BLOCK_TIME: u64 = 600;
/// Smallest factor a single period may scale the target by (4x harder)
pub const MIN_ADJUSTMENT_RATIO: f64 = 0.25;
/// Largest factor a single period may scale the target by (4x easier)
pub const MAX_ADJUSTMENT_RATIO: f64 = 4.0;
/// Easiest target on the production and public test networks
pub const PRODUCTION_MAX_TARGET_BITS: u32 = 0x1d00_ffff;
/// Easiest target on a regression-test network
pub const REGTEST_MAX_TARGET_BITS: u32 = 0x207f_ffff;
