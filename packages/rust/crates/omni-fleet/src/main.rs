//! omni-fleet CLI: print the resolved registry config or simulate a fleet.
//!
//! Logging: set `RUST_LOG=omni_fleet=debug` to see registrations; transitions log at info.

mod cli;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni_fleet::{
    ClientManager, ClientManagerConfig, Clock, FleetSettings, ManualClock, RegistryError,
    SweepMode, SystemClock, ThreadState, fleet_settings_paths, load_fleet_settings,
    load_fleet_settings_from_paths,
};

use crate::cli::{Cli, Command, ConfigOverrides};

struct Simulation {
    clients: usize,
    ticks: u64,
    tick_secs: u64,
    drop_every: usize,
    drop_after: u64,
    rejoin_after: Option<u64>,
    json: bool,
}

impl Simulation {
    fn is_silent(&self, client: usize, tick: u64) -> bool {
        self.drop_every > 0
            && client % self.drop_every == 0
            && tick > self.drop_after
            && self.rejoin_after.is_none_or(|rejoin| tick <= rejoin)
    }
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("omni_fleet=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(user) => load_fleet_settings_from_paths(&fleet_settings_paths().0, user),
        None => load_fleet_settings(),
    };
    let config = resolve_config(settings, &cli.overrides);
    config.validate()?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Simulate {
            clients,
            ticks,
            tick_secs,
            drop_every,
            drop_after,
            rejoin_after,
            json,
        } => run_simulation(
            config,
            &Simulation {
                clients,
                ticks,
                tick_secs,
                drop_every,
                drop_after,
                rejoin_after,
                json,
            },
        ),
    }
}

fn resolve_config(settings: FleetSettings, overrides: &ConfigOverrides) -> ClientManagerConfig {
    let mut config = settings.into_config();
    if let Some(ratios) = &overrides.ratios {
        config.client_type_ratios.clone_from(ratios);
    }
    if let Some(limits) = &overrides.limits {
        config.client_type_limits.clone_from(limits);
    }
    if let Some(threads) = overrides.threads {
        config.max_num_threads = threads;
    }
    if let Some(max_delay_secs) = overrides.max_delay_secs {
        config.client_max_delay_secs = max_delay_secs;
    }
    config
}

fn run_simulation(config: ClientManagerConfig, sim: &Simulation) -> Result<()> {
    let background = matches!(config.sweep_mode, SweepMode::Background { .. });
    let threads = config.max_num_threads;
    let clock = Arc::new(ManualClock::new(SystemClock.now_secs()));
    let manager: ClientManager = ClientManager::with_clock(config, clock.clone())?;

    for tick in 1..=sim.ticks {
        let now = clock.advance(sim.tick_secs);
        let seq = i64::try_from(tick).unwrap_or(i64::MAX);
        for client in 0..sim.clients {
            if sim.is_silent(client, tick) {
                continue;
            }
            let identity = format!("worker-{client:03}");
            let updates: HashMap<usize, ThreadState> = (0..threads)
                .map(|thread_id| {
                    let state = ThreadState {
                        thread_id: i32::try_from(thread_id).unwrap_or(i32::MAX),
                        seq,
                        ..ThreadState::default()
                    };
                    (thread_id, state)
                })
                .collect();
            match manager.ingest_heartbeat(&identity, &updates) {
                Ok(_) => {}
                Err(error @ RegistryError::NoEligibleType { .. }) => {
                    tracing::warn!(%identity, %error, "worker rejected");
                }
                Err(error) => return Err(error.into()),
            }
        }
        // Background mode: stand in for the periodic task on the simulated clock.
        if background {
            manager.sweep();
        }

        let summary = manager.describe();
        if sim.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            println!("tick {tick} t={now} {summary}");
        }
    }

    for (identity, delay) in manager.stuck_clients() {
        println!("stuck {identity}: {delay}s since last state change");
    }
    Ok(())
}
