//! OpenHam - command line front end for the text mode protocol engine
//!
//! Builds frames from text, reassembles messages from decoded frame
//! reports and shows how the decode scheduler merges submode windows.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info};

use openham_core::submode::Submode;
use openham_frame::checksum::{checksum, ChecksumKind};
use openham_tools::config::Config;
use openham_tools::rx::format_message;
use openham_tools::{log_level, plan_transmission, simulate_schedule, Receiver};

/// OpenHam text mode tool
#[derive(Parser)]
#[command(name = "openham")]
#[command(about = "OpenHam narrow-band text mode: frame building, reassembly and scheduling")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split text into frames
    Tx {
        /// Text to transmit
        #[arg(short, long)]
        text: String,

        /// Station callsign
        #[arg(short, long)]
        callsign: Option<String>,

        /// Station grid locator
        #[arg(short, long)]
        grid: Option<String>,

        /// Do not prefix free text with the callsign
        #[arg(long)]
        no_identify: bool,

        /// Print frames as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reassemble messages from `offset submode flags frame [snr]` lines
    Rx {
        /// Input file, one frame report per line
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Compute a command checksum
    Checksum {
        /// Checksum width
        #[arg(long, default_value_t = 16)]
        bits: u32,

        /// Text to checksum
        text: String,
    },
    /// Simulate sample reports and print decode requests
    Schedule {
        /// Seconds of audio to simulate
        #[arg(long, default_value_t = 60)]
        seconds: u32,

        /// Samples per report
        #[arg(long, default_value_t = 1200)]
        chunk: u32,
    },
    /// Show submode timing
    Info,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            debug!("loading config from {:?}", path);
            Config::from_file(path)
        }
        None => Ok(Config::default()),
    }
}

fn run_tx(
    mut config: Config,
    text: &str,
    callsign: Option<String>,
    grid: Option<String>,
    no_identify: bool,
    json: bool,
) -> Result<()> {
    if let Some(callsign) = callsign {
        config.station.callsign = callsign;
    }
    if let Some(grid) = grid {
        config.station.grid = grid;
    }
    if no_identify {
        config.station.identify = false;
    }

    let lines = plan_transmission(&config.station, text)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&lines).context("Failed to serialize frames")?);
        return Ok(());
    }
    for line in &lines {
        println!("{} {} {}", line.flags, line.frame, line.text);
    }
    Ok(())
}

fn run_rx(config: Config, input: &PathBuf) -> Result<()> {
    let file = std::fs::File::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let mut receiver = Receiver::new(config.buffer);

    let mut delivered = 0;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {:?}", input))?;
        let messages = receiver
            .feed_line(&line)
            .with_context(|| format!("Line {}", number + 1))?;
        for message in messages {
            println!("{}", format_message(&message, Utc::now()));
            delivered += 1;
        }
    }
    for message in receiver.finish() {
        println!("{}", format_message(&message, Utc::now()));
        delivered += 1;
    }

    if delivered == 0 {
        println!("No messages decoded");
    }
    Ok(())
}

fn run_checksum(bits: u32, text: &str) -> Result<()> {
    let kind = match ChecksumKind::from_bits(bits) {
        Some(ChecksumKind::None) | None => bail!("Checksum width must be 16 or 32, got {}", bits),
        Some(kind) => kind,
    };
    println!("{}", checksum(text, kind));
    Ok(())
}

fn run_schedule(config: Config, seconds: u32, chunk: u32) -> Result<()> {
    let requests = simulate_schedule(config.scheduler, seconds, chunk)?;
    for request in &requests {
        let spans: Vec<String> = request
            .spans
            .iter()
            .map(|s| format!("{}@{}+{}", s.submode, s.start, s.size))
            .collect();
        println!("#{:<4} mask {:05b}  {}", request.id, request.mask, spans.join(" "));
    }
    info!("{} decode requests in {} s", requests.len(), seconds);
    Ok(())
}

fn show_info() {
    println!("\n=== OpenHam Text Mode ===");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));

    println!("\n=== Submodes ===");
    println!("  name    period  symbol   spacing   frame   drift");
    for mode in Submode::ALL {
        println!(
            "  {:<7} {:>4} s  {:>5}   {:>6.3} Hz  {:>5.2} s  {:>3} Hz",
            mode.name(),
            mode.period_secs(),
            mode.samples_per_symbol(),
            mode.tone_spacing_hz(),
            mode.frame_duration_secs(),
            mode.drift_tolerance_hz()
        );
    }

    println!("\n=== Features ===");
    println!("  • 72-bit frames: heartbeat, compound, directed, data");
    println!("  • Dictionary word compression with Huffman fallback");
    println!("  • CRC-16/CRC-32 command checksums");
    println!("  • Out-of-order compound callsign reassembly");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose, cli.debug))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Tx {
            text,
            callsign,
            grid,
            no_identify,
            json,
        } => run_tx(config, &text, callsign, grid, no_identify, json)?,
        Commands::Rx { input } => run_rx(config, &input)?,
        Commands::Checksum { bits, text } => run_checksum(bits, &text)?,
        Commands::Schedule { seconds, chunk } => run_schedule(config, seconds, chunk)?,
        Commands::Info => show_info(),
    }

    Ok(())
}
