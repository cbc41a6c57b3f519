use std::fmt::Write;

use retargetlib::types::BlockHeader;
use retargetlib::{RetargetConfig, TargetClamp, U256, compact, difficulty_factor};

use crate::core::{Analysis, PeriodReport};
use crate::util::format_duration;

const RULE: &str = "============================================================";

fn describe_header(header: &BlockHeader) -> String {
    let time = header
        .time()
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("t={}", header.timestamp));
    format!("#{} at {} bits 0x{:08x}", header.height, time, header.bits)
}

fn render_period(out: &mut String, interval: u64, period: &PeriodReport) -> std::fmt::Result {
    let adj = &period.adjustment;
    let window_start = adj.height - interval;
    writeln!(out, "Block {} (period {}):", adj.height, adj.period)?;
    writeln!(
        out,
        "  Window:       blocks {}-{}",
        window_start,
        adj.height - 1
    )?;
    writeln!(
        out,
        "  Actual time:  {} ({}s)",
        format_duration(adj.actual_timespan),
        adj.actual_timespan
    )?;
    if adj.last_timestamp < adj.first_timestamp {
        writeln!(out, "                last block predates the first, counted as 0")?;
    }
    writeln!(
        out,
        "  Target time:  {} ({}s)",
        format_duration(adj.target_timespan),
        adj.target_timespan
    )?;
    writeln!(out, "  Ratio:        {}x", adj.raw_ratio.round(4).normalized())?;
    if adj.ratio_was_clamped() {
        writeln!(out, "  Bounded:      {}x", adj.clamped_ratio.normalized())?;
    }
    match adj.clamp {
        Some(TargetClamp::MaxTarget) => writeln!(out, "  Capped at the network's max target")?,
        Some(TargetClamp::Floor) => writeln!(out, "  Raised to the minimum target of 1")?,
        None => {}
    }
    writeln!(out, "  Old bits:     0x{:08x}", adj.old_bits)?;
    writeln!(out, "  New bits:     0x{:08x}", adj.new_bits)?;

    let factor = adj.difficulty_factor();
    let change = if (factor - 1.0).abs() < 1e-9 {
        "unchanged".to_string()
    } else if factor > 1.0 {
        format!("{factor:.2}x harder")
    } else {
        format!("{:.2}x easier", 1.0 / factor)
    };
    writeln!(out, "  Difficulty:   {change}")?;

    let status = match period.matches_record() {
        Some(true) => "header carries the computed bits",
        Some(false) => "MISMATCH: header carries different bits",
        None => "not mined yet",
    };
    writeln!(out, "  Status:       {status}")?;
    writeln!(out)
}

/// Render the period-by-period difficulty report.
pub fn render_analysis(analysis: &Analysis) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Difficulty Adjustment Analysis")?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;

    match (&analysis.genesis, &analysis.tip) {
        (Some(genesis), Some(tip)) => {
            writeln!(out, "Genesis: {}", describe_header(genesis))?;
            writeln!(out, "Tip:     {}", describe_header(tip))?;
        }
        _ => writeln!(out, "History is empty")?,
    }
    writeln!(out)?;

    for period in &analysis.periods {
        render_period(&mut out, analysis.interval, period)?;
    }

    writeln!(out, "{RULE}")?;
    writeln!(out, "Statistics:")?;
    writeln!(out, "  Total blocks:        {}", analysis.blocks)?;
    writeln!(
        out,
        "  Complete periods:    {} of {} blocks",
        analysis.completed_periods(),
        analysis.interval
    )?;
    writeln!(out, "  Trailing blocks:     {}", analysis.trailing_blocks())?;
    if let Some(average) = analysis.average_block_time() {
        writeln!(
            out,
            "  Average block time:  {average:.3}s (target {}s)",
            analysis.target_block_time
        )?;
    }
    let mismatches = analysis
        .periods
        .iter()
        .filter(|period| period.matches_record() == Some(false))
        .count();
    writeln!(out, "  Mismatched periods:  {mismatches}")?;
    Ok(out)
}

/// Render a decoded compact value relative to the network's max target.
pub fn render_decoded(bits: u32, config: &RetargetConfig) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Bits:       0x{bits:08x}")?;
    match compact::decode(bits) {
        Ok(target) => {
            // U256's hex formatting ignores width, pad the string instead
            writeln!(out, "Target:     0x{:0>64}", format!("{target:x}"))?;
            writeln!(out, "Canonical:  {}", compact::is_canonical(bits))?;
            render_difficulty(&mut out, bits, target, config)?;
        }
        Err(e) => writeln!(out, "Invalid:    {e}")?,
    }
    Ok(out)
}

fn render_difficulty(
    out: &mut String,
    bits: u32,
    target: U256,
    config: &RetargetConfig,
) -> std::fmt::Result {
    match difficulty_factor(config.max_target_bits, bits) {
        Ok(difficulty) => {
            writeln!(out, "Difficulty: {difficulty:.6} (1 = max target)")?;
            if config.max_target().is_ok_and(|max| target > max) {
                writeln!(out, "            easier than the network allows")?;
            }
            Ok(())
        }
        Err(e) => writeln!(out, "Difficulty: unavailable ({e})"),
    }
}
