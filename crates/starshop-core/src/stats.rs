//! Lifetime statistics per user.

use serde::{Deserialize, Serialize};

/// Monotonic lifetime counters for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeStats {
    /// Total confirmed deposits, in minor units.
    pub total_deposited_minor: i64,

    /// Total stars delivered.
    pub total_goods_units: u64,
}

/// Totals across all users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Users with at least one recorded event.
    pub users: usize,

    /// Total confirmed deposits, in minor units.
    pub total_deposited_minor: i64,

    /// Total stars delivered.
    pub total_goods_units: u64,
}

impl<'a> FromIterator<&'a LifetimeStats> for StatsSummary {
    fn from_iter<T: IntoIterator<Item = &'a LifetimeStats>>(iter: T) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, stats| {
            acc.users += 1;
            acc.total_deposited_minor += stats.total_deposited_minor;
            acc.total_goods_units += stats.total_goods_units;
            acc
        })
    }
}
