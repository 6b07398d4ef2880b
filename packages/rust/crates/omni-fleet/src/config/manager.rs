use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::RegistryError;

/// When the liveness sweep runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SweepMode {
    /// Every heartbeat sweeps all records under the registry lock.
    #[default]
    PerHeartbeat,
    /// Heartbeats only record activity; a periodic task sweeps.
    Background {
        /// Seconds between sweeps.
        interval_secs: u64,
    },
}

/// Ratios, limits and timeouts consumed by `ClientManager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientManagerConfig {
    /// Target fraction of active clients per type, indexed by type ordinal.
    pub client_type_ratios: Vec<f32>,
    /// Cap on active clients per type, same length as the ratios.
    pub client_type_limits: Vec<usize>,
    /// Thread slots allocated per client.
    pub max_num_threads: usize,
    /// Seconds without a state change before a client counts as dead.
    pub client_max_delay_secs: u64,
    /// Sweep scheduling.
    pub sweep_mode: SweepMode,
}

impl Default for ClientManagerConfig {
    fn default() -> Self {
        Self {
            client_type_ratios: vec![1.0],
            client_type_limits: vec![usize::MAX],
            max_num_threads: 1,
            client_max_delay_secs: 300,
            sweep_mode: SweepMode::PerHeartbeat,
        }
    }
}

impl ClientManagerConfig {
    /// Number of configured client types.
    #[must_use]
    pub fn num_types(&self) -> usize {
        self.client_type_limits.len()
    }

    /// Check the config can drive allocation.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidConfig` when there are no types, the ratio and
    /// limit vectors differ in length, a ratio is negative or not finite, a client
    /// would get zero thread slots, or a timeout/interval is zero.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.client_type_limits.is_empty() {
            return Err(RegistryError::InvalidConfig(
                "at least one client type is required".to_string(),
            ));
        }
        validate_ratios(&self.client_type_ratios, self.client_type_limits.len())?;
        if self.max_num_threads == 0 {
            return Err(RegistryError::InvalidConfig(
                "max_num_threads must be greater than zero".to_string(),
            ));
        }
        if self.client_max_delay_secs == 0 {
            return Err(RegistryError::InvalidConfig(
                "client_max_delay_secs must be greater than zero".to_string(),
            ));
        }
        if let SweepMode::Background { interval_secs } = self.sweep_mode
            && interval_secs == 0
        {
            return Err(RegistryError::InvalidConfig(
                "background sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_ratios(ratios: &[f32], num_types: usize) -> Result<(), RegistryError> {
    if ratios.len() != num_types {
        return Err(RegistryError::InvalidConfig(format!(
            "{} type ratios for {num_types} type limits",
            ratios.len()
        )));
    }
    if let Some(bad) = ratios.iter().find(|r| !r.is_finite() || **r < 0.0) {
        return Err(RegistryError::InvalidConfig(format!(
            "type ratio {bad} must be a finite, non-negative fraction"
        )));
    }
    Ok(())
}

impl Display for ClientManagerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ratios={:?}, limits={:?}, threads/client={}, max_delay={}s",
            self.client_type_ratios,
            self.client_type_limits,
            self.max_num_threads,
            self.client_max_delay_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let config = ClientManagerConfig {
            client_type_ratios: vec![0.5, 0.5],
            client_type_limits: vec![10],
            ..ClientManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RegistryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn nan_ratio_is_rejected() {
        assert!(validate_ratios(&[f32::NAN], 1).is_err());
        assert!(validate_ratios(&[-0.1], 1).is_err());
        assert!(validate_ratios(&[0.0, 1.0], 2).is_ok());
    }
}
