use crate::{
    U256, compact,
    config::RetargetConfig,
    error::{Result, RetargetError},
    types::{BlockHeader, HeaderSource},
};

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use tracing::{debug, warn};

/// Why the computed target was replaced before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClamp {
    /// the scaled target was easier than the network allows, 256-bit overflow included
    MaxTarget,
    /// the scaled target rounded to zero, raised to 1
    Floor,
}

/// Everything that went into one retarget.
#[derive(Debug, Clone)]
pub struct Adjustment {
    /// height of the first block that uses `new_bits`
    pub height: u64,
    /// retarget period `height` opens
    pub period: u64,
    pub first_timestamp: u64,
    pub last_timestamp: u64,
    /// seconds between the first and last block of the window, 0 if the clock went backwards
    pub actual_timespan: u64,
    pub target_timespan: u64,
    /// actual / target timespan before clamping
    pub raw_ratio: BigDecimal,
    /// the factor that was applied to the target
    pub clamped_ratio: BigDecimal,
    pub old_bits: u32,
    pub new_bits: u32,
    pub old_target: U256,
    /// target before compact encoding dropped its low bytes
    pub new_target: U256,
    pub clamp: Option<TargetClamp>,
}

impl Adjustment {
    /// whether the ratio hit one of the configured bounds
    pub fn ratio_was_clamped(&self) -> bool {
        self.raw_ratio != self.clamped_ratio
    }

    /// how many times harder the new bits are than the old ones
    pub fn difficulty_factor(&self) -> f64 {
        difficulty_factor(self.old_bits, self.new_bits).unwrap_or(f64::NAN)
    }
}

/// Computes the bits each block has to carry. Holds no chain state, every call reads the
/// history it is given.
#[derive(Debug, Clone)]
pub struct Retargeter {
    config: RetargetConfig,
    max_target: U256,
    max_target_int: BigInt,
    min_ratio: BigDecimal,
    max_ratio: BigDecimal,
}

impl Retargeter {
    pub fn new(config: RetargetConfig) -> Result<Self> {
        config.validate()?;
        let max_target = config.max_target()?;
        let min_ratio = ratio_to_decimal("min_ratio", config.min_ratio)?;
        let max_ratio = ratio_to_decimal("max_ratio", config.max_ratio)?;
        Ok(Retargeter {
            config,
            max_target,
            max_target_int: to_bigint(max_target),
            min_ratio,
            max_ratio,
        })
    }

    pub fn target_timespan(&self) -> u64 {
        self.config.target_timespan()
    }

    /// Heights that open a new period get freshly computed bits. Genesis is not one of them.
    pub fn is_retarget_height(&self, height: u64) -> bool {
        height != 0 && height.is_multiple_of(self.config.interval)
    }

    pub fn period_of(&self, height: u64) -> u64 {
        height / self.config.interval
    }

    /// Bits the block at `height` must carry, given the headers below it.
    pub fn next_bits<H>(&self, history: &H, height: u64) -> Result<u32>
    where
        H: HeaderSource + ?Sized,
    {
        if height == 0 {
            return Ok(self.config.genesis_bits);
        }

        if let Some(adjustment) = self.adjustment(history, height)? {
            return Ok(adjustment.new_bits);
        }

        let prev = self.header(history, height - 1, height)?;
        Ok(prev.bits)
    }

    /// The retarget computed for `height`, or `None` if `height` keeps the previous bits.
    pub fn adjustment<H>(&self, history: &H, height: u64) -> Result<Option<Adjustment>>
    where
        H: HeaderSource + ?Sized,
    {
        if !self.is_retarget_height(height) {
            return Ok(None);
        }

        let first = self.header(history, height - self.config.interval, height)?;
        let last = self.header(history, height - 1, height)?;
        let old_target = self.checked_target(&last)?;

        // clock drift can put the last block before the first, count that as no time at all
        let actual_timespan = last.timestamp.saturating_sub(first.timestamp);
        if last.timestamp < first.timestamp {
            debug!(
                height,
                first = first.timestamp,
                last = last.timestamp,
                "window ends before it starts"
            );
        }

        let target_timespan = self.target_timespan();
        let target_decimal = BigDecimal::from(target_timespan);
        let actual_decimal = BigDecimal::from(actual_timespan);

        // clamp the timespan, i.e. the ratio, before it touches the target
        let lower = &target_decimal * &self.min_ratio;
        let upper = &target_decimal * &self.max_ratio;
        let clamped_timespan = if actual_decimal < lower {
            lower
        } else if actual_decimal > upper {
            upper
        } else {
            actual_decimal.clone()
        };

        let raw_ratio = &actual_decimal / &target_decimal;
        let clamped_ratio = &clamped_timespan / &target_decimal;

        // compare before narrowing, the scaled value may not fit in 256 bits
        let scaled = scale_target(old_target, &clamped_timespan, target_timespan)?;
        let (new_target, clamp) = if scaled > self.max_target_int {
            warn!(height, "retarget is easier than the max target, capping");
            (self.max_target, Some(TargetClamp::MaxTarget))
        } else if scaled.is_zero() {
            warn!(height, "retarget rounded to a zero target, raising to 1");
            (U256::one(), Some(TargetClamp::Floor))
        } else {
            (to_u256(&scaled)?, None)
        };
        let new_bits = compact::encode(new_target);

        debug!(
            height,
            actual_timespan,
            target_timespan,
            ratio = %raw_ratio,
            applied = %clamped_ratio,
            old_bits = format_args!("0x{:08x}", last.bits),
            new_bits = format_args!("0x{new_bits:08x}"),
            "retarget"
        );

        Ok(Some(Adjustment {
            height,
            period: self.period_of(height),
            first_timestamp: first.timestamp,
            last_timestamp: last.timestamp,
            actual_timespan,
            target_timespan,
            raw_ratio,
            clamped_ratio,
            old_bits: last.bits,
            new_bits,
            old_target,
            new_target,
            clamp,
        }))
    }

    /// Fetch the header at `height`, which the block at `for_height` depends on.
    fn header<H>(&self, history: &H, height: u64, for_height: u64) -> Result<BlockHeader>
    where
        H: HeaderSource + ?Sized,
    {
        let header = history
            .header_at(height)
            .ok_or(RetargetError::InsufficientHistory {
                height: for_height,
                needed: for_height,
                available: history.len(),
            })?;

        if header.height != height {
            return Err(RetargetError::invalid_header(
                height,
                format!("stored with height {}", header.height),
            ));
        }
        Ok(header)
    }

    fn checked_target(&self, header: &BlockHeader) -> Result<U256> {
        let target = header
            .target()
            .map_err(|e| RetargetError::invalid_header(header.height, e.to_string()))?;
        if target > self.max_target {
            return Err(RetargetError::invalid_header(
                header.height,
                format!(
                    "bits 0x{:08x} are easier than the max target 0x{:08x}",
                    header.bits, self.config.max_target_bits
                ),
            ));
        }
        Ok(target)
    }
}

/// How many times harder `new_bits` is than `old_bits`: old target / new target.
pub fn difficulty_factor(old_bits: u32, new_bits: u32) -> Result<f64> {
    let old = to_decimal(compact::decode(old_bits)?);
    let new = to_decimal(compact::decode(new_bits)?);
    Ok((old / new).to_f64().unwrap_or(f64::NAN))
}

/// The decimal a config file spells, not the binary expansion of the f64 behind it.
fn ratio_to_decimal(name: &str, ratio: f64) -> Result<BigDecimal> {
    ratio
        .to_string()
        .parse::<BigDecimal>()
        .map_err(|_| RetargetError::InvalidConfig(format!("{name} {ratio} is not representable")))
}

fn to_bigint(value: U256) -> BigInt {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigInt::from_bytes_be(Sign::Plus, &bytes)
}

fn to_u256(value: &BigInt) -> Result<U256> {
    U256::from_dec_str(&value.to_string()).map_err(|_| RetargetError::EncodingOverflow)
}

fn to_decimal(value: U256) -> BigDecimal {
    BigDecimal::from(to_bigint(value))
}

/// floor(target * numerator / denominator), exactly
fn scale_target(target: U256, numerator: &BigDecimal, denominator: u64) -> Result<BigInt> {
    let (digits, exponent) = (to_decimal(target) * numerator).into_bigint_and_exponent();
    let ten = BigInt::from(10u8);
    let (dividend, divisor) = if exponent >= 0 {
        let shift = u32::try_from(exponent).map_err(|_| RetargetError::EncodingOverflow)?;
        (digits, BigInt::from(denominator) * ten.pow(shift))
    } else {
        let shift =
            u32::try_from(exponent.unsigned_abs()).map_err(|_| RetargetError::EncodingOverflow)?;
        (digits * ten.pow(shift), BigInt::from(denominator))
    };

    Ok(dividend / divisor)
}
