use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "omni-fleet")]
#[command(about = "Fleet client registry: inspect config or simulate heartbeats against it.")]
pub(crate) struct Cli {
    /// User settings file (overrides `<PRJ_CONFIG_HOME>/omni-fleet/fleet.yaml`).
    #[arg(long, global = true)]
    pub(crate) settings: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) overrides: ConfigOverrides,

    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Flags that win over settings files.
#[derive(Args, Debug, Default)]
pub(crate) struct ConfigOverrides {
    /// Target fraction per client type, comma separated (e.g. 0.7,0.3)
    #[arg(long, global = true, value_delimiter = ',')]
    pub(crate) ratios: Option<Vec<f32>>,

    /// Active cap per client type, comma separated (e.g. 100,20)
    #[arg(long, global = true, value_delimiter = ',')]
    pub(crate) limits: Option<Vec<usize>>,

    /// Thread slots per client
    #[arg(long, global = true)]
    pub(crate) threads: Option<usize>,

    /// Seconds without a state change before a client is dead
    #[arg(long, global = true)]
    pub(crate) max_delay_secs: Option<u64>,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the resolved registry config as JSON.
    Config,
    /// Drive a registry with synthetic workers on a simulated clock.
    Simulate {
        /// Number of workers
        #[arg(long, default_value_t = 8)]
        clients: usize,

        /// Heartbeat rounds to run
        #[arg(long, default_value_t = 20)]
        ticks: u64,

        /// Simulated seconds between rounds
        #[arg(long, default_value_t = 60)]
        tick_secs: u64,

        /// Every Nth worker (0 = none) goes silent after --drop-after
        #[arg(long, default_value_t = 3)]
        drop_every: usize,

        /// Round after which the silent workers stop reporting
        #[arg(long, default_value_t = 5)]
        drop_after: u64,

        /// Round after which the silent workers report again
        #[arg(long)]
        rejoin_after: Option<u64>,

        /// Print each round's summary as JSON
        #[arg(long)]
        json: bool,
    },
}
