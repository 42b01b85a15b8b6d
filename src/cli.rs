//! CLI surface (§6): `discover`/`host`/`join` verbs plus global
//! `--help`/`--version`. Grounded on `liveion_udp_bridge/src/main.rs`'s
//! `clap::Parser` usage.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ndi-bridge")]
#[command(version, about = "Point-to-point bridge for a broadcast video/audio stream")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging (DEBUG instead of INFO).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Optional TOML config file overlaid beneath CLI flags.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Enumerate sources for ~10 seconds and print `[n] name` per line.
    Discover,

    /// Run the sender orchestrator.
    Host {
        /// `host:port` of the join endpoint.
        #[arg(long)]
        target: Option<String>,

        /// UDP port to send from is ephemeral; this is the destination port
        /// when `--target` has none specified.
        #[arg(long)]
        port: Option<u16>,

        /// Target video bitrate in Mbps.
        #[arg(long)]
        bitrate: Option<f64>,

        /// Select a source by exact/partial name.
        #[arg(long)]
        source: Option<String>,

        /// Case-insensitive substring to exclude from candidates (repeatable).
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Skip the interactive prompt; pick the first candidate after
        /// exclusion filtering (or the one matching `--source`).
        #[arg(long)]
        auto: bool,
    },

    /// Run the receiver orchestrator.
    Join {
        /// UDP port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Name to republish the stream under.
        #[arg(long)]
        name: Option<String>,

        /// Delay-buffer duration in milliseconds; 0 means real-time.
        #[arg(long)]
        buffer: Option<u64>,
    },
}
