use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::ClientType;
use crate::manager::TypeCounts;

/// Active clients of one type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeShare {
    /// Type ordinal.
    pub client_type: ClientType,
    /// Active clients holding this type.
    pub active: usize,
    /// `active / total_active`, 0 when nothing is active.
    pub fraction: f32,
}

/// Role composition of the fleet, for observability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySummary {
    /// Clients ever seen, alive or dead.
    pub known_clients: usize,
    /// Active clients across all types.
    pub total_active: usize,
    /// One entry per configured type, in ordinal order.
    pub per_type: Vec<TypeShare>,
}

impl RegistrySummary {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn from_counts(counts: &TypeCounts, known_clients: usize) -> Self {
        let total_active = counts.total();
        let per_type = counts
            .per_type()
            .iter()
            .enumerate()
            .map(|(client_type, &active)| TypeShare {
                client_type,
                active,
                fraction: if total_active == 0 {
                    0.0
                } else {
                    active as f32 / total_active as f32
                },
            })
            .collect();
        Self {
            known_clients,
            total_active,
            per_type,
        }
    }
}

impl Display for RegistrySummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "active {}/{} known",
            self.total_active, self.known_clients
        )?;
        for share in &self.per_type {
            write!(
                f,
                ", {}: {:.3}/{}",
                share.client_type, share.fraction, share.active
            )?;
        }
        Ok(())
    }
}
