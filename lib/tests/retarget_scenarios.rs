use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use retargetlib::{
    BlockHeader, HeaderChain, HeaderSource, NetworkProfile, Retargeter, TargetClamp, U256,
    compact,
};

const GENESIS_TIME: u64 = 1_704_067_200;
const REGTEST_BITS: u32 = 0x207fffff;

fn regtest() -> Retargeter {
    Retargeter::new(NetworkProfile::Regtest.config()).unwrap()
}

/// Mine a chain whose header `h` is stamped `timestamps[h]` and carries whatever bits the engine
/// prescribes for it.
fn mine(engine: &Retargeter, timestamps: &[u64]) -> HeaderChain {
    let mut chain = HeaderChain::new();
    for (height, timestamp) in timestamps.iter().enumerate() {
        let height = height as u64;
        let bits = engine.next_bits(&chain, height).unwrap();
        chain
            .push(BlockHeader::new(height, *timestamp, bits))
            .unwrap();
    }
    chain
}

/// `count` timestamps starting at `start`, the last one exactly `span` seconds after the first
fn spread(start: u64, count: u64, span: u64) -> Vec<u64> {
    (0..count)
        .map(|i| start + span * i / (count - 1))
        .collect()
}

#[test]
fn non_boundary_heights_copy_previous_bits() {
    let engine = regtest();
    let mut timestamps = spread(GENESIS_TIME, 2016, 6_000);
    timestamps.extend(spread(GENESIS_TIME + 6_012, 2016, 30_000));
    let chain = mine(&engine, &timestamps);

    for height in 1..chain.len() {
        if engine.is_retarget_height(height) {
            continue;
        }
        let prev = chain.header_at(height - 1).unwrap();
        assert_eq!(engine.next_bits(&chain, height).unwrap(), prev.bits);
    }
    // the first period was fast, so the second one runs on different bits than genesis
    assert_ne!(chain.header_at(2016).unwrap().bits, REGTEST_BITS);
}

#[test]
fn thousandfold_fast_period_clamps_to_quarter() {
    let engine = regtest();
    let timestamps = spread(GENESIS_TIME, 2016, 24_192 / 1_000);
    let chain = mine(&engine, &timestamps);

    let adjustment = engine.adjustment(&chain, 2016).unwrap().unwrap();
    assert!(adjustment.ratio_was_clamped());
    assert_eq!(adjustment.clamped_ratio, "0.25".parse::<BigDecimal>().unwrap());

    let old_target = compact::decode(REGTEST_BITS).unwrap();
    assert_eq!(adjustment.new_target, old_target / 4);
    assert_eq!(adjustment.new_bits, compact::encode(old_target / 4));
    assert!((adjustment.difficulty_factor() - 4.0).abs() < 1e-5);
}

#[test]
fn thousandfold_slow_period_clamps_to_four() {
    let mut config = NetworkProfile::Testnet.config();
    config.genesis_bits = 0x1c00ffff;
    let engine = Retargeter::new(config).unwrap();
    let timestamps = spread(GENESIS_TIME, 2016, 24_192 * 1_000);
    let chain = mine(&engine, &timestamps);

    let adjustment = engine.adjustment(&chain, 2016).unwrap().unwrap();
    assert!(adjustment.ratio_was_clamped());
    assert_eq!(adjustment.clamped_ratio, BigDecimal::from(4u64));
    assert_eq!(adjustment.clamp, None);

    let old_target = compact::decode(0x1c00ffff).unwrap();
    assert_eq!(adjustment.new_target, old_target * 4);
    assert_eq!(adjustment.new_bits, 0x1c03fffc);
}

#[test]
fn mining_session_replay() {
    // first period right on schedule, the second one mined in 53 seconds
    let engine = regtest();
    let mut timestamps = spread(GENESIS_TIME, 2016, 24_192);
    let second_start = GENESIS_TIME + 24_204;
    timestamps.extend(spread(second_start, 2016, 53));
    let chain = mine(&engine, &timestamps);

    // the first boundary keeps the testing bits
    let first = engine.adjustment(&chain, 2016).unwrap().unwrap();
    assert_eq!(first.new_bits, REGTEST_BITS);
    assert!(!first.ratio_was_clamped());
    for height in 2016..4032 {
        assert_eq!(chain.header_at(height).unwrap().bits, REGTEST_BITS);
    }

    let second = engine.adjustment(&chain, 4032).unwrap().unwrap();
    assert_eq!(second.period, 2);
    assert_eq!(second.actual_timespan, 53);
    assert_eq!(second.target_timespan, 24_192);

    let raw = second.raw_ratio.to_f64().unwrap();
    assert!((raw - 0.0022).abs() < 0.0001, "raw ratio {raw}");
    assert!(second.ratio_was_clamped());

    assert_eq!(second.old_bits, REGTEST_BITS);
    assert_eq!(second.new_bits, 0x201fffff);
    assert_eq!(engine.next_bits(&chain, 4032).unwrap(), 0x201fffff);
}

#[test]
fn two_hardening_periods_compound_to_sixteen() {
    let engine = regtest();
    let mut timestamps = spread(GENESIS_TIME, 2016, 10);
    timestamps.extend(spread(GENESIS_TIME + 20, 2016, 10));
    let chain = mine(&engine, &timestamps);

    assert_eq!(chain.header_at(2016).unwrap().bits, 0x201fffff);

    let bits = engine.next_bits(&chain, 4032).unwrap();
    let sixteenth = compact::decode(REGTEST_BITS).unwrap() / 16;
    assert_eq!(bits, compact::encode(sixteenth));
    assert_eq!(bits, 0x2007ffff);
    assert!(compact::decode(bits).unwrap() <= sixteenth);
}

#[test]
fn repeated_hardening_stays_positive() {
    let engine = regtest();
    let mut chain = HeaderChain::new();
    let mut bits = 0x03000100;
    for period in 0..8u64 {
        for offset in 0..2016u64 {
            let height = period * 2016 + offset;
            if height > 0 {
                bits = engine.next_bits(&chain, height).unwrap();
            }
            chain
                .push(BlockHeader::new(height, GENESIS_TIME, bits))
                .unwrap();
        }
    }

    let last = engine.adjustment(&chain, 8 * 2016).unwrap().unwrap();
    assert_eq!(last.new_target, U256::one());
    assert_eq!(last.clamp, Some(TargetClamp::Floor));
    assert_eq!(last.new_bits, 0x01010000);
}

#[test]
fn production_profile_uses_ten_minute_blocks() {
    let engine = Retargeter::new(NetworkProfile::Mainnet.config()).unwrap();
    assert_eq!(engine.target_timespan(), 2016 * 600);

    // two weeks is on schedule for mainnet
    let timestamps = spread(GENESIS_TIME, 2016, 1_209_600);
    let chain = mine(&engine, &timestamps);
    assert_eq!(engine.next_bits(&chain, 2016).unwrap(), 0x1d00ffff);
}
