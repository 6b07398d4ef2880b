//! Config namespace: manager config and YAML settings loading.

mod manager;
mod settings;

pub(crate) use manager::validate_ratios;
pub use manager::{ClientManagerConfig, SweepMode};
pub use settings::{
    FleetSettings, RegistrySettings, fleet_settings_paths, load_fleet_settings,
    load_fleet_settings_from_paths,
};
