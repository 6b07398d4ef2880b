//! Type allocation policy over per-type active counts.
//!
//! Selection order, by ascending type ordinal:
//! 1. empty fleet: type 0, unless its limit is zero
//! 2. first type below its ratio target (and below its limit)
//! 3. first type below its limit
//! 4. nothing eligible

use serde::Serialize;

use crate::ClientType;

/// Outcome of one allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// Counts were incremented for this type.
    Allocated(ClientType),
    /// Every type is at its ratio target and its limit; counts unchanged.
    NoEligibleType,
}

/// Active clients per type plus their total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    per_type: Vec<usize>,
    total: usize,
}

impl TypeCounts {
    /// Zeroed counts for `num_types` types.
    #[must_use]
    pub fn new(num_types: usize) -> Self {
        Self {
            per_type: vec![0; num_types],
            total: 0,
        }
    }

    /// Active clients per type.
    #[must_use]
    pub fn per_type(&self) -> &[usize] {
        &self.per_type
    }

    /// Active clients across all types.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Pick a type without changing counts.
    ///
    /// A type with no matching entry in `ratios` or `limits` is never chosen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn choose(&self, ratios: &[f32], limits: &[usize]) -> Option<ClientType> {
        let limit_of = |t: ClientType| limits.get(t).copied().unwrap_or(0);
        let ratio_of = |t: ClientType| ratios.get(t).copied().unwrap_or(0.0);
        let num_types = self.per_type.len();

        if self.total == 0 && num_types > 0 && limit_of(0) > 0 {
            return Some(0);
        }
        let total = self.total as f32;
        let under_limit = |t: ClientType| self.per_type[t] < limit_of(t);
        let under_ratio = |t: ClientType| (self.per_type[t] as f32 / total) < ratio_of(t);

        (0..num_types)
            .find(|&t| under_limit(t) && under_ratio(t))
            .or_else(|| (0..num_types).find(|&t| under_limit(t)))
    }

    /// Pick a type and count it as active.
    pub fn allocate(&mut self, ratios: &[f32], limits: &[usize]) -> AllocationOutcome {
        match self.choose(ratios, limits) {
            Some(t) => {
                self.per_type[t] += 1;
                self.total += 1;
                AllocationOutcome::Allocated(t)
            }
            None => AllocationOutcome::NoEligibleType,
        }
    }

    /// Release one active client of type `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is not a configured type or has no active clients; both mean a
    /// record and the counters disagree.
    pub fn deallocate(&mut self, t: ClientType) {
        assert!(
            t < self.per_type.len() && self.per_type[t] > 0,
            "deallocating type {t} with counts {:?}",
            self.per_type
        );
        self.per_type[t] -= 1;
        self.total -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fleet_bootstraps_type_zero() {
        let mut counts = TypeCounts::new(3);
        assert_eq!(
            counts.allocate(&[0.0, 0.5, 0.5], &[10, 10, 10]),
            AllocationOutcome::Allocated(0)
        );
        assert_eq!(counts.per_type(), &[1, 0, 0]);
    }

    #[test]
    fn ties_go_to_lowest_ordinal() {
        let mut counts = TypeCounts::new(2);
        let picks: Vec<_> = (0..4)
            .map(|_| counts.allocate(&[0.5, 0.5], &[100, 100]))
            .collect();
        assert_eq!(
            picks,
            vec![
                AllocationOutcome::Allocated(0),
                AllocationOutcome::Allocated(1),
                AllocationOutcome::Allocated(0),
                AllocationOutcome::Allocated(1),
            ]
        );
    }

    #[test]
    fn saturated_type_is_skipped_even_when_under_ratio() {
        let mut counts = TypeCounts::new(2);
        let ratios = [0.9, 0.1];
        let limits = [1, 100];
        assert_eq!(counts.allocate(&ratios, &limits), AllocationOutcome::Allocated(0));
        assert_eq!(counts.allocate(&ratios, &limits), AllocationOutcome::Allocated(1));
        // type 0 is at 1/2 < 0.9 but already at its limit
        assert_eq!(counts.allocate(&ratios, &limits), AllocationOutcome::Allocated(1));
    }

    #[test]
    fn exhaustion_leaves_counts_untouched() {
        let mut counts = TypeCounts::new(2);
        counts.allocate(&[0.5, 0.5], &[1, 1]);
        counts.allocate(&[0.5, 0.5], &[1, 1]);
        let before = counts.clone();
        assert_eq!(
            counts.allocate(&[0.5, 0.5], &[1, 1]),
            AllocationOutcome::NoEligibleType
        );
        assert_eq!(counts, before);
    }

    #[test]
    fn deallocate_then_allocate_keeps_totals() {
        let mut counts = TypeCounts::new(2);
        counts.allocate(&[0.5, 0.5], &[100, 100]);
        counts.allocate(&[0.5, 0.5], &[100, 100]);
        counts.deallocate(0);
        assert_eq!(counts.total(), 1);
        assert_eq!(counts.allocate(&[0.5, 0.5], &[100, 100]), AllocationOutcome::Allocated(0));
        assert_eq!(counts.per_type().iter().sum::<usize>(), counts.total());
    }

    #[test]
    fn zero_limit_type_is_never_bootstrapped() {
        let mut counts = TypeCounts::new(2);
        assert_eq!(
            counts.allocate(&[1.0, 0.0], &[0, 5]),
            AllocationOutcome::Allocated(1)
        );
    }

    #[test]
    fn short_ratio_and_limit_slices_exclude_missing_types() {
        let mut counts = TypeCounts::new(3);
        assert_eq!(counts.allocate(&[1.0], &[1]), AllocationOutcome::Allocated(0));
        assert_eq!(counts.allocate(&[1.0], &[1]), AllocationOutcome::NoEligibleType);
        assert_eq!(counts.per_type(), &[1, 0, 0]);
        assert_eq!(TypeCounts::new(0).choose(&[1.0], &[1]), None);
    }

    #[test]
    #[should_panic(expected = "deallocating type")]
    fn deallocating_empty_type_panics() {
        TypeCounts::new(2).deallocate(1);
    }
}
