//! Share distribution engine.
//!
//! Splits an amount between a bus owner and the bus's shareholders by percentage,
//! and aggregates those splits across many transactions. Per-row display, cycle
//! totals and report export all go through [`distribute_transaction`], so they
//! always agree on fallback and rounding.
//!
//! Percentages are not normalised: owner% + Σ shareholder% may differ from 100,
//! and the distributed total then differs from the input amount.
//!
//! Shares are aggregated by shareholder *name*. Two different people with the same
//! name on different buses end up in one bucket.

use crate::core::money::{self, percent_of};
use crate::entities::{bus, shareholder, transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// One shareholder's stake in a bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stake {
    /// Stored shareholder id, `None` for stakes that were never persisted
    pub shareholder_id: Option<i64>,
    /// Display name
    pub name: String,
    /// Cut in percent
    pub percentage: f64,
}

/// The ownership configuration of a bus, as the distribution engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ownership {
    /// Stored bus id
    pub bus_id: Option<i64>,
    /// License plate
    pub license_plate: String,
    /// Whether shareholders take a cut
    pub is_shareholding: bool,
    /// Owner cut in percent
    pub owner_percentage: f64,
    /// Shareholder cuts
    pub stakes: Vec<Stake>,
}

impl Ownership {
    /// Builds the ownership of a stored bus.
    ///
    /// A bus without the shareholding flag is treated as 100% owner and no
    /// shareholders, whatever its stored percentages say.
    #[must_use]
    pub fn from_models(bus: &bus::Model, shareholders: &[shareholder::Model]) -> Self {
        if !bus.is_shareholding {
            return Self {
                bus_id: Some(bus.id),
                license_plate: bus.license_plate.clone(),
                is_shareholding: false,
                owner_percentage: 100.0,
                stakes: Vec::new(),
            };
        }

        Self {
            bus_id: Some(bus.id),
            license_plate: bus.license_plate.clone(),
            is_shareholding: true,
            owner_percentage: bus.share_percentage,
            stakes: shareholders
                .iter()
                .filter(|s| s.bus_id == bus.id)
                .map(|s| Stake {
                    shareholder_id: Some(s.id),
                    name: s.name.clone(),
                    percentage: s.percentage,
                })
                .collect(),
        }
    }

    /// Owner% plus every shareholder%.
    #[must_use]
    pub fn allocation_total(&self) -> f64 {
        self.owner_percentage + money::sum(self.stakes.iter().map(|s| s.percentage))
    }

    /// How far the configured percentages are from 100, or `None` when they add up.
    ///
    /// The engine accepts any total; this is for callers that want to warn.
    #[must_use]
    pub fn allocation_gap(&self) -> Option<f64> {
        let gap = 100.0 - self.allocation_total();
        if money::is_zero(gap) { None } else { Some(gap) }
    }
}

/// Result of splitting an amount.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Distribution {
    /// Owner cut
    pub owner_share: f64,
    /// Shareholder cuts keyed by shareholder name
    pub shareholder_shares: BTreeMap<String, f64>,
    /// Whether a shareholding configuration was applied
    pub is_shareholding: bool,
}

impl Distribution {
    /// Sum of every share handed out; need not equal the input amount.
    #[must_use]
    pub fn total_distributed(&self) -> f64 {
        self.owner_share + money::sum(self.shareholder_shares.values().copied())
    }

    /// Adds another distribution into this one, merging shareholders by name.
    pub fn absorb(&mut self, other: &Self) {
        self.owner_share += other.owner_share;
        for (name, share) in &other.shareholder_shares {
            *self.shareholder_shares.entry(name.clone()).or_insert(0.0) += share;
        }
        self.is_shareholding |= other.is_shareholding;
    }

    /// Copy with every share rounded half-up to a whole thousand, for display.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            owner_share: money::round_half_up(self.owner_share),
            shareholder_shares: self
                .shareholder_shares
                .iter()
                .map(|(name, share)| (name.clone(), money::round_half_up(*share)))
                .collect(),
            is_shareholding: self.is_shareholding,
        }
    }
}

/// Splits `amount` according to `ownership`.
///
/// Without an ownership, or with a non-shareholding one, the whole amount goes to
/// the owner.
#[must_use]
pub fn distribute(amount: f64, ownership: Option<&Ownership>) -> Distribution {
    let Some(ownership) = ownership.filter(|o| o.is_shareholding) else {
        return Distribution {
            owner_share: amount,
            shareholder_shares: BTreeMap::new(),
            is_shareholding: false,
        };
    };

    let mut shareholder_shares = BTreeMap::new();
    for stake in &ownership.stakes {
        *shareholder_shares.entry(stake.name.clone()).or_insert(0.0) +=
            percent_of(amount, stake.percentage);
    }

    Distribution {
        owner_share: percent_of(amount, ownership.owner_percentage),
        shareholder_shares,
        is_shareholding: true,
    }
}

/// Sums the distributions of many `(amount, ownership)` pairs without rounding.
pub fn aggregate<'a, I>(items: I) -> Distribution
where
    I: IntoIterator<Item = (f64, Option<&'a Ownership>)>,
{
    items
        .into_iter()
        .fold(Distribution::default(), |mut total, (amount, ownership)| {
            total.absorb(&distribute(amount, ownership));
            total
        })
}

/// Every known bus ownership, looked up by id first and plate second.
#[derive(Debug, Clone, Default)]
pub struct OwnershipDirectory {
    ownerships: Vec<Ownership>,
    by_id: HashMap<i64, usize>,
    by_plate: HashMap<String, usize>,
}

impl OwnershipDirectory {
    /// Builds a directory; order is preserved for [`Self::main_shareholding`].
    pub fn new<I>(ownerships: I) -> Self
    where
        I: IntoIterator<Item = Ownership>,
    {
        let ownerships: Vec<Ownership> = ownerships.into_iter().collect();
        let mut by_id = HashMap::new();
        let mut by_plate = HashMap::new();
        for (index, ownership) in ownerships.iter().enumerate() {
            if let Some(id) = ownership.bus_id {
                by_id.insert(id, index);
            }
            by_plate
                .entry(ownership.license_plate.trim().to_string())
                .or_insert(index);
        }
        Self {
            ownerships,
            by_id,
            by_plate,
        }
    }

    /// Builds a directory from stored buses and all their shareholders.
    #[must_use]
    pub fn from_models(buses: &[bus::Model], shareholders: &[shareholder::Model]) -> Self {
        Self::new(buses.iter().map(|b| Ownership::from_models(b, shareholders)))
    }

    /// Finds the ownership for a transaction's bus reference.
    ///
    /// A reference that matches nothing is a referential gap: it is logged and
    /// the caller falls back to the non-shareholding split.
    #[must_use]
    pub fn resolve(&self, bus_id: Option<i64>, plate: &str) -> Option<&Ownership> {
        let index = bus_id
            .and_then(|id| self.by_id.get(&id))
            .or_else(|| self.by_plate.get(plate.trim()))
            .copied();

        if index.is_none() && !plate.trim().is_empty() {
            warn!(plate, ?bus_id, "bus reference not found, treating as non-shareholding");
        }
        index.map(|i| &self.ownerships[i])
    }

    /// The first shareholding bus in directory order.
    #[must_use]
    pub fn main_shareholding(&self) -> Option<&Ownership> {
        self.ownerships.iter().find(|o| o.is_shareholding)
    }

    /// All ownerships in directory order.
    #[must_use]
    pub fn ownerships(&self) -> &[Ownership] {
        &self.ownerships
    }
}

/// Distribution of one transaction's remaining balance.
#[must_use]
pub fn distribute_transaction(
    transaction: &transaction::Model,
    directory: &OwnershipDirectory,
) -> Distribution {
    distribute(
        transaction.remaining_balance,
        directory.resolve(transaction.bus_id, &transaction.bus_plate),
    )
}

/// Aggregated distribution over a set of transactions.
#[must_use]
pub fn aggregate_transactions(
    transactions: &[transaction::Model],
    directory: &OwnershipDirectory,
) -> Distribution {
    aggregate(
        transactions
            .iter()
            .map(|t| (t.remaining_balance, directory.resolve(t.bus_id, &t.bus_plate))),
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{bus_model, shareholder_model, transaction_model};

    fn thao_bus() -> Ownership {
        Ownership {
            bus_id: Some(1),
            license_plate: "51B-123.45".to_string(),
            is_shareholding: true,
            owner_percentage: 25.0,
            stakes: vec![Stake {
                shareholder_id: Some(1),
                name: "Anh Thảo".to_string(),
                percentage: 25.0,
            }],
        }
    }

    #[test]
    fn test_distribute_shareholding_bus() {
        let ownership = thao_bus();
        let result = distribute(1000.0, Some(&ownership));

        assert!(result.is_shareholding);
        assert_eq!(result.owner_share, 250.0);
        assert_eq!(result.shareholder_shares.get("Anh Thảo"), Some(&250.0));
        assert_eq!(result.total_distributed(), 500.0);
    }

    #[test]
    fn test_distribute_without_bus_goes_to_owner() {
        let result = distribute(1234.5, None);
        assert!(!result.is_shareholding);
        assert_eq!(result.owner_share, 1234.5);
        assert!(result.shareholder_shares.is_empty());
    }

    #[test]
    fn test_distribute_non_shareholding_ignores_stored_percentages() {
        let bus = bus_model(3, "29A-999.99", false, 40.0);
        let shareholders = vec![shareholder_model(9, 3, "Ghost", 60.0)];
        let ownership = Ownership::from_models(&bus, &shareholders);

        assert_eq!(ownership.owner_percentage, 100.0);
        assert!(ownership.stakes.is_empty());

        let result = distribute(800.0, Some(&ownership));
        assert_eq!(result.owner_share, 800.0);
        assert!(result.shareholder_shares.is_empty());
    }

    #[test]
    fn test_distribute_may_exceed_amount() {
        let mut ownership = thao_bus();
        ownership.owner_percentage = 80.0;
        ownership.stakes[0].percentage = 40.0;

        let result = distribute(100.0, Some(&ownership));
        assert_eq!(result.total_distributed(), 120.0);
        assert_eq!(ownership.allocation_gap(), Some(-20.0));
    }

    #[test]
    fn test_allocation_gap_none_when_complete() {
        let mut ownership = thao_bus();
        ownership.owner_percentage = 75.0;
        assert_eq!(ownership.allocation_gap(), None);
    }

    #[test]
    fn test_aggregate_merges_by_name_without_rounding() {
        let first = thao_bus();
        let mut second = thao_bus();
        second.bus_id = Some(2);
        second.stakes[0].percentage = 10.0;

        let result = aggregate([
            (0.3, Some(&first)),
            (0.3, Some(&first)),
            (50.0, Some(&second)),
            (40.0, None),
        ]);

        // 0.075 + 0.075 would round to 0 twice if rounded per row.
        let thao = result.shareholder_shares["Anh Thảo"];
        assert!((thao - 5.15).abs() < 1e-9);
        assert!((result.owner_share - (0.15 + 12.5 + 40.0)).abs() < 1e-9);
        assert!(result.is_shareholding);
        assert_eq!(result.rounded().shareholder_shares["Anh Thảo"], 5.0);
    }

    #[test]
    fn test_directory_resolves_by_id_then_plate() {
        let buses = vec![
            bus_model(1, "51B-123.45", true, 25.0),
            bus_model(2, "29A-999.99", false, 100.0),
        ];
        let shareholders = vec![shareholder_model(1, 1, "Anh Thảo", 25.0)];
        let directory = OwnershipDirectory::from_models(&buses, &shareholders);

        assert_eq!(directory.resolve(Some(2), "").unwrap().license_plate, "29A-999.99");
        assert_eq!(directory.resolve(None, " 51B-123.45 ").unwrap().bus_id, Some(1));
        assert!(directory.resolve(Some(42), "00X-000.00").is_none());
        assert_eq!(directory.main_shareholding().unwrap().bus_id, Some(1));
    }

    #[test]
    fn test_transaction_call_sites_agree() {
        let buses = vec![bus_model(1, "51B-123.45", true, 25.0)];
        let shareholders = vec![shareholder_model(1, 1, "Anh Thảo", 25.0)];
        let directory = OwnershipDirectory::from_models(&buses, &shareholders);

        let transactions = vec![
            transaction_model(1, "51B-123.45", Some(1), 1000.0),
            transaction_model(2, "unknown", None, 200.0),
        ];

        let per_row: Vec<Distribution> = transactions
            .iter()
            .map(|t| distribute_transaction(t, &directory))
            .collect();
        let total = aggregate_transactions(&transactions, &directory);

        assert_eq!(per_row[0].owner_share, 250.0);
        assert_eq!(per_row[1].owner_share, 200.0);
        assert_eq!(total.owner_share, per_row[0].owner_share + per_row[1].owner_share);
        assert_eq!(total.shareholder_shares["Anh Thảo"], 250.0);
    }
}
