//! Recompute and report the difficulty adjustments of a stored header history.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retargetlib::NetworkProfile;
use retargetlib::types::HeaderChain;
use retargetlib::util::Saveable;
use tracing::*;

mod core;
mod report;
mod util;

use crate::core::Core;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with a `profile` and optional `[retarget]` overrides
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// network profile, replaces the one from the config file
    #[arg(short, long, value_parser = util::parse_profile)]
    profile: Option<NetworkProfile>,
    /// directory for the rolling log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report every retarget period of a history file
    Analyze { history: PathBuf },
    /// Print the bits a block must carry
    NextBits {
        history: PathBuf,
        /// height of the block, defaults to the one after the tip
        #[arg(long)]
        height: Option<u64>,
    },
    /// Show the target behind compact bits
    Decode {
        #[arg(value_parser = util::parse_bits)]
        bits: u32,
    },
    /// Write a synthetic history mined at a fixed pace
    Simulate {
        output: PathBuf,
        #[arg(long, default_value_t = 4032)]
        blocks: u64,
        /// seconds between consecutive blocks
        #[arg(long, default_value_t = 12)]
        spacing: u64,
        /// timestamp of the genesis block
        #[arg(long, default_value_t = 1_704_067_200)]
        start: u64,
    },
}

fn load_history(path: &Path) -> Result<HeaderChain> {
    HeaderChain::load_from_file(path)
        .with_context(|| format!("Failed to load history file: {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    util::setup_tracing(&cli.log_dir)?;
    util::setup_panic_hook();

    let core = Core::load_config(cli.config.as_deref(), cli.profile)?;
    info!(command = ?cli.command, "starting");

    match cli.command {
        Command::Analyze { history } => {
            let chain = load_history(&history)?;
            let analysis = core.analyze(&chain)?;
            print!("{}", report::render_analysis(&analysis)?);
        }
        Command::NextBits { history, height } => {
            let chain = load_history(&history)?;
            let (height, bits) = core.next_bits(&chain, height)?;
            let kind = if core.engine().is_retarget_height(height) {
                "retarget"
            } else {
                "carried over"
            };
            println!("height {height}: 0x{bits:08x} ({kind})");
        }
        Command::Decode { bits } => {
            print!("{}", report::render_decoded(bits, &core.config)?);
        }
        Command::Simulate {
            output,
            blocks,
            spacing,
            start,
        } => {
            let chain = core.simulate(blocks, spacing, start)?;
            chain
                .save_to_file(&output)
                .with_context(|| format!("Failed to write history file: {}", output.display()))?;
            info!(blocks, spacing, path = %output.display(), "history written");
            println!("wrote {blocks} headers to {}", output.display());
        }
    }
    Ok(())
}
