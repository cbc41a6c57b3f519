use std::panic;
use std::path::Path;
use tracing::*;

use anyhow::Result;
use retargetlib::NetworkProfile;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing to save logs into the given folder. `RUST_LOG` overrides the default
/// `info` level.
pub fn setup_tracing(log_dir: &Path) -> Result<()> {
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "analyzer.log");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(file_appender))
        .with(filter)
        .try_init()?;
    Ok(())
}

/// Make sure tracing is able to log panics occurring in the analyzer
pub fn setup_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        error!("Application panicked!");
        error!("Panic info: {:?}", panic_info);
        error!("Backtrace: {:?}", backtrace);
        default_hook(panic_info);
    }));
}

/// Parse compact bits written either as `0x`-prefixed hex or as a decimal number
pub fn parse_bits(text: &str) -> Result<u32, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid bits {text:?}: {e}"))
}

pub fn parse_profile(text: &str) -> Result<NetworkProfile, String> {
    match text.to_ascii_lowercase().as_str() {
        "mainnet" | "main" => Ok(NetworkProfile::Mainnet),
        "testnet" | "test" => Ok(NetworkProfile::Testnet),
        "regtest" => Ok(NetworkProfile::Regtest),
        other => Err(format!(
            "unknown profile {other:?}, expected mainnet, testnet or regtest"
        )),
    }
}

/// Seconds as a short human readable duration
pub fn format_duration(seconds: u64) -> String {
    let (hours, rest) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds:02}s"),
        _ => format!("{hours}h {minutes:02}m {seconds:02}s"),
    }
}
