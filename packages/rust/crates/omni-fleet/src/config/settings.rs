//! Fleet settings loader.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/fleet.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/omni-fleet/fleet.yaml`
//!
//! Merge precedence is user over system.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{ClientManagerConfig, SweepMode};

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/fleet.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "omni-fleet/fleet.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";

/// Top-level settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetSettings {
    /// Registry section.
    #[serde(default)]
    pub registry: RegistrySettings,
}

/// Optional registry fields; unset fields fall back to `ClientManagerConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySettings {
    /// Target fraction per client type.
    pub client_type_ratios: Option<Vec<f32>>,
    /// Active cap per client type.
    pub client_type_limits: Option<Vec<usize>>,
    /// Thread slots per client.
    pub max_num_threads: Option<usize>,
    /// Inactivity timeout in seconds.
    pub client_max_delay_secs: Option<u64>,
    /// When set, sweep on this interval instead of on every heartbeat.
    pub sweep_interval_secs: Option<u64>,
}

impl FleetSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            registry: self.registry.merge(overlay.registry),
        }
    }

    /// Resolve into a concrete manager config.
    #[must_use]
    pub fn into_config(self) -> ClientManagerConfig {
        let defaults = ClientManagerConfig::default();
        let registry = self.registry;
        ClientManagerConfig {
            client_type_ratios: registry
                .client_type_ratios
                .unwrap_or(defaults.client_type_ratios),
            client_type_limits: registry
                .client_type_limits
                .unwrap_or(defaults.client_type_limits),
            max_num_threads: registry.max_num_threads.unwrap_or(defaults.max_num_threads),
            client_max_delay_secs: registry
                .client_max_delay_secs
                .unwrap_or(defaults.client_max_delay_secs),
            sweep_mode: registry
                .sweep_interval_secs
                .map_or(defaults.sweep_mode, |interval_secs| SweepMode::Background {
                    interval_secs,
                }),
        }
    }
}

impl RegistrySettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            client_type_ratios: overlay.client_type_ratios.or(self.client_type_ratios),
            client_type_limits: overlay.client_type_limits.or(self.client_type_limits),
            max_num_threads: overlay.max_num_threads.or(self.max_num_threads),
            client_max_delay_secs: overlay
                .client_max_delay_secs
                .or(self.client_max_delay_secs),
            sweep_interval_secs: overlay.sweep_interval_secs.or(self.sweep_interval_secs),
        }
    }
}

/// Load merged fleet settings (user overrides system).
#[must_use]
pub fn load_fleet_settings() -> FleetSettings {
    let (system_path, user_path) = fleet_settings_paths();
    load_fleet_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
#[must_use]
pub fn fleet_settings_paths() -> (PathBuf, PathBuf) {
    let root = non_empty_env("PRJ_ROOT").map_or_else(
        || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        PathBuf::from,
    );
    let config_home = PathBuf::from(
        non_empty_env("PRJ_CONFIG_HOME")
            .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string()),
    );
    // Relative config homes hang off the project root.
    let config_home = if config_home.is_absolute() {
        config_home
    } else {
        root.join(config_home)
    };
    (
        root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH),
        config_home.join(DEFAULT_USER_SETTINGS_RELATIVE_PATH),
    )
}

#[doc(hidden)]
#[must_use]
pub fn load_fleet_settings_from_paths(system: &Path, user: &Path) -> FleetSettings {
    load_layer(system).merge(load_layer(user))
}

/// One settings layer. A missing file is an empty layer; an unusable one is
/// logged and treated as empty so the other layer still applies.
fn load_layer(path: &Path) -> FleetSettings {
    if !path.exists() {
        return FleetSettings::default();
    }
    let layer = std::fs::read_to_string(path)
        .map_err(|error| ("read", error.to_string()))
        .and_then(|raw| {
            serde_yaml::from_str::<FleetSettings>(&raw)
                .map_err(|error| ("parse", error.to_string()))
        });
    match layer {
        Ok(layer) => layer,
        Err((stage, error)) => {
            tracing::warn!(
                path = %path.display(),
                stage,
                %error,
                "fleet registry settings layer unusable; registry falls back to the other layer"
            );
            FleetSettings::default()
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
