//! Reconciliation business logic - Comparing real holdings against the monthly target.
//!
//! The target is the month's total remaining balance run through the distribution
//! engine with the main bus (the first shareholding bus). Real assets are adjusted
//! by amounts already paid out but not yet recorded (added back) and by debts or
//! money held for others (subtracted). The discrepancy is what remains after the
//! target and the already-settled money are taken off.

use crate::{
    core::{
        balance::LineItem,
        bus::load_ownership_directory,
        distribution::{Ownership, distribute},
        money::{self, percent_of},
        transaction::list_transactions_for_month,
    },
    entities::{AdjustmentKind, Reconciliation, ReconciliationItem, reconciliation, reconciliation_item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Discrepancies smaller than this, in thousands, count as balanced.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Share each side takes when there is no main bus.
const EVEN_SPLIT_PERCENTAGE: f64 = 50.0;

/// Report id for a month, e.g. `recon_05_2024`.
#[must_use]
pub fn report_id(month: u32, year: i32) -> String {
    format!("recon_{month:02}_{year:04}")
}

fn validate_period(month: u32, year: i32) -> Result<()> {
    if (1..=12).contains(&month) && (1..=9999).contains(&year) {
        Ok(())
    } else {
        Err(Error::Validation {
            message: format!("Invalid reconciliation month {month}/{year}"),
        })
    }
}

/// A monthly reconciliation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    /// `recon_MM_YYYY`
    pub id: String,
    pub month: u32,
    pub year: i32,
    /// Cash at the storage location
    pub cash_storage: f64,
    /// Cash in the wallet
    pub cash_wallet: f64,
    /// Bank balance
    pub bank_account: f64,
    /// Money already settled and counted elsewhere
    pub existing_money: f64,
    /// Paid out but not yet recorded
    pub paid_items: Vec<LineItem>,
    /// Owed or held for others
    pub debt_items: Vec<LineItem>,
    /// `None` until first saved
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReconciliationReport {
    /// Zeroed report for a month.
    ///
    /// # Errors
    /// Returns a validation error for an invalid month.
    pub fn empty(month: u32, year: i32) -> Result<Self> {
        validate_period(month, year)?;
        Ok(Self {
            id: report_id(month, year),
            month,
            year,
            cash_storage: 0.0,
            cash_wallet: 0.0,
            bank_account: 0.0,
            existing_money: 0.0,
            paid_items: Vec::new(),
            debt_items: Vec::new(),
            updated_at: None,
        })
    }

    fn from_models(model: reconciliation::Model, items: &[reconciliation_item::Model]) -> Self {
        let items_of = |kind: AdjustmentKind| {
            items
                .iter()
                .filter(|item| item.kind == kind)
                .map(|item| LineItem::new(item.description.clone(), item.amount))
                .collect()
        };
        Self {
            paid_items: items_of(AdjustmentKind::Paid),
            debt_items: items_of(AdjustmentKind::Debt),
            id: model.id,
            month: model.month,
            year: model.year,
            cash_storage: model.cash_storage,
            cash_wallet: model.cash_wallet,
            bank_account: model.bank_account,
            existing_money: model.existing_money,
            updated_at: Some(model.updated_at),
        }
    }

    /// Storage + wallet + bank.
    #[must_use]
    pub fn total_real_assets(&self) -> f64 {
        self.cash_storage + self.cash_wallet + self.bank_account
    }

    /// Σ paid items.
    #[must_use]
    pub fn paid_total(&self) -> f64 {
        money::sum(self.paid_items.iter().map(|item| item.amount))
    }

    /// Σ debt items.
    #[must_use]
    pub fn debt_total(&self) -> f64 {
        money::sum(self.debt_items.iter().map(|item| item.amount))
    }

    /// Real assets plus paid items minus debts.
    #[must_use]
    pub fn total_adjusted_assets(&self) -> f64 {
        self.total_real_assets() + self.paid_total() - self.debt_total()
    }

    fn validate(&self) -> Result<()> {
        validate_period(self.month, self.year)?;
        let fixed = [
            self.cash_storage,
            self.cash_wallet,
            self.bank_account,
            self.existing_money,
        ];
        let items = self
            .paid_items
            .iter()
            .chain(&self.debt_items)
            .map(|item| item.amount);
        match fixed.into_iter().chain(items).find(|a| !a.is_finite()) {
            Some(amount) => Err(Error::InvalidAmount { amount }),
            None => Ok(()),
        }
    }
}

/// Where the target split came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TargetBasis {
    /// Distributed with the main shareholding bus
    MainBus {
        /// Plate of that bus
        license_plate: String,
    },
    /// No shareholding bus: half to the owner, half to the partner
    EvenSplit,
}

/// Theoretical surplus the holdings should cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub basis: TargetBasis,
    /// Sum of every share handed out
    pub total_target: f64,
    pub owner_target: f64,
    /// Shares keyed by shareholder name
    pub shareholder_targets: BTreeMap<String, f64>,
    /// The unnamed partner half of an even split
    pub partner_target: Option<f64>,
}

/// Splits the monthly remaining total into the target.
///
/// With a main bus this is the distribution engine's split and the total target is
/// the distributed sum, which may differ from the input. Without one, owner and
/// partner take 50% each and the total target is the whole amount.
#[must_use]
pub fn compute_target(monthly_remaining_total: f64, main_bus: Option<&Ownership>) -> Target {
    match main_bus {
        Some(bus) => {
            let split = distribute(monthly_remaining_total, Some(bus));
            Target {
                basis: TargetBasis::MainBus {
                    license_plate: bus.license_plate.clone(),
                },
                total_target: split.total_distributed(),
                owner_target: split.owner_share,
                shareholder_targets: split.shareholder_shares,
                partner_target: None,
            }
        }
        None => {
            let owner = percent_of(monthly_remaining_total, EVEN_SPLIT_PERCENTAGE);
            let partner = percent_of(monthly_remaining_total, EVEN_SPLIT_PERCENTAGE);
            Target {
                basis: TargetBasis::EvenSplit,
                total_target: owner + partner,
                owner_target: owner,
                shareholder_targets: BTreeMap::new(),
                partner_target: Some(partner),
            }
        }
    }
}

/// Sign of a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscrepancyStatus {
    Balanced,
    /// Holdings exceed the target
    Surplus,
    /// Holdings fall short of the target
    Deficit,
}

impl std::fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Balanced => "balanced",
            Self::Surplus => "surplus",
            Self::Deficit => "deficit",
        })
    }
}

/// Classifies a discrepancy; anything closer to zero than `tolerance` is balanced.
#[must_use]
pub fn classify(discrepancy: f64, tolerance: f64) -> DiscrepancyStatus {
    if discrepancy.abs() < tolerance.max(money::ZERO_TOLERANCE) {
        DiscrepancyStatus::Balanced
    } else if discrepancy > 0.0 {
        DiscrepancyStatus::Surplus
    } else {
        DiscrepancyStatus::Deficit
    }
}

/// Outcome of comparing a report against its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub target: Target,
    pub total_real_assets: f64,
    pub total_adjusted_assets: f64,
    pub existing_money: f64,
    /// Adjusted assets − total target − existing money
    pub discrepancy: f64,
    pub status: DiscrepancyStatus,
}

/// [`compute_discrepancy_with_tolerance`] with [`DEFAULT_TOLERANCE`].
#[must_use]
pub fn compute_discrepancy(
    report: &ReconciliationReport,
    monthly_remaining_total: f64,
    main_bus: Option<&Ownership>,
) -> Discrepancy {
    compute_discrepancy_with_tolerance(report, monthly_remaining_total, main_bus, DEFAULT_TOLERANCE)
}

/// Compares the report's adjusted assets against the month's target.
#[must_use]
pub fn compute_discrepancy_with_tolerance(
    report: &ReconciliationReport,
    monthly_remaining_total: f64,
    main_bus: Option<&Ownership>,
    tolerance: f64,
) -> Discrepancy {
    let target = compute_target(monthly_remaining_total, main_bus);
    let total_adjusted_assets = report.total_adjusted_assets();
    let discrepancy = total_adjusted_assets - target.total_target - report.existing_money;

    Discrepancy {
        status: classify(discrepancy, tolerance),
        total_real_assets: report.total_real_assets(),
        total_adjusted_assets,
        existing_money: report.existing_money,
        discrepancy,
        target,
    }
}

/// Loads the stored report for a month.
pub async fn load_report(
    db: &DatabaseConnection,
    month: u32,
    year: i32,
) -> Result<Option<ReconciliationReport>> {
    validate_period(month, year)?;
    let id = report_id(month, year);
    let Some(model) = Reconciliation::find_by_id(id.clone()).one(db).await? else {
        return Ok(None);
    };
    let items = ReconciliationItem::find()
        .filter(reconciliation_item::Column::ReconciliationId.eq(id))
        .order_by_asc(reconciliation_item::Column::Kind)
        .order_by_asc(reconciliation_item::Column::Position)
        .all(db)
        .await?;
    Ok(Some(ReconciliationReport::from_models(model, &items)))
}

/// The stored report for a month, or a zeroed one.
pub async fn load_or_default_report(
    db: &DatabaseConnection,
    month: u32,
    year: i32,
) -> Result<ReconciliationReport> {
    match load_report(db, month, year).await? {
        Some(report) => Ok(report),
        None => {
            debug!(month, year, "No stored reconciliation, starting from zero");
            ReconciliationReport::empty(month, year)
        }
    }
}

/// Inserts or replaces a report and its items, stamping `updated_at`.
///
/// # Errors
/// Returns a validation error for an invalid month or a non-finite amount.
#[instrument(skip(db, report), fields(id = %report.id))]
pub async fn save_report(
    db: &DatabaseConnection,
    mut report: ReconciliationReport,
) -> Result<ReconciliationReport> {
    report.validate()?;
    report.id = report_id(report.month, report.year);
    let now = Utc::now();

    let txn = db.begin().await?;
    let existing = Reconciliation::find_by_id(report.id.clone()).one(&txn).await?;
    let is_new = existing.is_none();
    let mut active = match existing {
        Some(model) => model.into(),
        None => reconciliation::ActiveModel {
            id: Set(report.id.clone()),
            ..Default::default()
        },
    };
    active.month = Set(report.month);
    active.year = Set(report.year);
    active.cash_storage = Set(report.cash_storage);
    active.cash_wallet = Set(report.cash_wallet);
    active.bank_account = Set(report.bank_account);
    active.existing_money = Set(report.existing_money);
    active.updated_at = Set(now);
    if is_new {
        active.insert(&txn).await?;
    } else {
        active.update(&txn).await?;
    }

    ReconciliationItem::delete_many()
        .filter(reconciliation_item::Column::ReconciliationId.eq(report.id.clone()))
        .exec(&txn)
        .await?;
    let lists = [
        (AdjustmentKind::Paid, &report.paid_items),
        (AdjustmentKind::Debt, &report.debt_items),
    ];
    for (kind, items) in lists {
        for (position, item) in (0_i32..).zip(items.iter()) {
            reconciliation_item::ActiveModel {
                reconciliation_id: Set(report.id.clone()),
                kind: Set(kind),
                position: Set(position),
                description: Set(item.description.trim().to_string()),
                amount: Set(item.amount),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }
    txn.commit().await?;

    report.updated_at = Some(now);
    info!("Reconciliation saved");
    Ok(report)
}

/// Σ remaining balance of every transaction dated in the month.
pub async fn monthly_remaining_total(db: &DatabaseConnection, month: u32, year: i32) -> Result<f64> {
    let transactions = list_transactions_for_month(db, year, month).await?;
    Ok(money::sum(transactions.iter().map(|t| t.remaining_balance)))
}

/// A report with its computed discrepancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReconciliation {
    pub report: ReconciliationReport,
    /// Σ remaining balance for the month
    pub monthly_remaining_total: f64,
    pub discrepancy: Discrepancy,
}

/// Loads (or resets) the month's report and compares it against the month's target.
#[instrument(skip(db))]
pub async fn reconcile_month(
    db: &DatabaseConnection,
    month: u32,
    year: i32,
    tolerance: f64,
) -> Result<MonthlyReconciliation> {
    let report = load_or_default_report(db, month, year).await?;
    let total = monthly_remaining_total(db, month, year).await?;
    let directory = load_ownership_directory(db).await?;
    let discrepancy =
        compute_discrepancy_with_tolerance(&report, total, directory.main_shareholding(), tolerance);

    info!(
        discrepancy = discrepancy.discrepancy,
        status = %discrepancy.status,
        "Month reconciled"
    );
    Ok(MonthlyReconciliation {
        report,
        monthly_remaining_total: total,
        discrepancy,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::distribution::Stake;
    use crate::test_utils::*;

    fn main_bus() -> Ownership {
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
    fn test_report_id_format() {
        assert_eq!(report_id(5, 2024), "recon_05_2024");
        assert!(ReconciliationReport::empty(13, 2024).is_err());
    }

    #[test]
    fn test_discrepancy_surplus_scenario() {
        let mut report = ReconciliationReport::empty(5, 2024).unwrap();
        report.cash_storage = 100_000.0;
        report.cash_wallet = 22_500.0;
        report.bank_account = 50_000.0;
        report.paid_items = vec![
            LineItem::new("Insurance", 7_000.0),
            LineItem::new("Tyres", 2_500.0),
        ];

        // 25% owner + 25% shareholder of 200,000 = 100,000 target
        let result = compute_discrepancy(&report, 200_000.0, Some(&main_bus()));
        assert_eq!(result.total_real_assets, 172_500.0);
        assert_eq!(result.total_adjusted_assets, 182_000.0);
        assert_eq!(result.target.total_target, 100_000.0);
        assert_eq!(result.target.shareholder_targets["Anh Thảo"], 50_000.0);
        assert_eq!(result.discrepancy, 82_000.0);
        assert_eq!(result.status, DiscrepancyStatus::Surplus);
        assert_eq!(result.status.to_string(), "surplus");
    }

    #[test]
    fn test_debts_and_existing_money_reduce_discrepancy() {
        let mut report = ReconciliationReport::empty(5, 2024).unwrap();
        report.bank_account = 1_000.0;
        report.existing_money = 300.0;
        report.debt_items = vec![LineItem::new("Held for driver", 400.0)];

        let result = compute_discrepancy(&report, 1_000.0, Some(&main_bus()));
        assert_eq!(result.discrepancy, 1_000.0 - 400.0 - 500.0 - 300.0);
        assert_eq!(result.status, DiscrepancyStatus::Deficit);
    }

    #[test]
    fn test_even_split_without_main_bus() {
        let target = compute_target(1_000.0, None);
        assert_eq!(target.basis, TargetBasis::EvenSplit);
        assert_eq!(target.owner_target, 500.0);
        assert_eq!(target.partner_target, Some(500.0));
        assert_eq!(target.total_target, 1_000.0);
        assert!(target.shareholder_targets.is_empty());
    }

    #[test]
    fn test_classify_with_tolerance() {
        assert_eq!(classify(0.0, DEFAULT_TOLERANCE), DiscrepancyStatus::Balanced);
        assert_eq!(classify(0.3, DEFAULT_TOLERANCE), DiscrepancyStatus::Balanced);
        assert_eq!(classify(-0.49, DEFAULT_TOLERANCE), DiscrepancyStatus::Balanced);
        assert_eq!(classify(0.5, DEFAULT_TOLERANCE), DiscrepancyStatus::Surplus);
        assert_eq!(classify(-2.0, DEFAULT_TOLERANCE), DiscrepancyStatus::Deficit);
        assert_eq!(classify(0.1, 0.0), DiscrepancyStatus::Surplus);
        assert_eq!(classify(0.0, 0.0), DiscrepancyStatus::Balanced);
    }

    #[tokio::test]
    async fn test_save_and_reload_report() -> Result<()> {
        let db = setup_test_db().await?;
        let mut report = load_or_default_report(&db, 5, 2024).await?;
        assert_eq!(report.id, "recon_05_2024");
        assert!(report.updated_at.is_none());

        report.cash_storage = 1_200.0;
        report.paid_items = vec![LineItem::new("Insurance", 300.0)];
        report.debt_items = vec![LineItem::new("Loan", 100.0)];
        let saved = save_report(&db, report).await?;
        assert!(saved.updated_at.is_some());

        let mut loaded = load_report(&db, 5, 2024).await?.unwrap();
        assert_eq!(loaded.paid_items, vec![LineItem::new("Insurance", 300.0)]);
        assert_eq!(loaded.debt_items, vec![LineItem::new("Loan", 100.0)]);
        assert_eq!(loaded.total_adjusted_assets(), 1_400.0);

        loaded.debt_items.clear();
        save_report(&db, loaded).await?;
        let reloaded = load_report(&db, 5, 2024).await?.unwrap();
        assert!(reloaded.debt_items.is_empty());
        assert_eq!(reloaded.cash_storage, 1_200.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_month_uses_main_bus_and_month_total() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_bus(&db, "29A-999.99", false).await?;
        create_test_bus(&db, "51B-123.45", true).await?;
        create_test_transaction(&db, date(2024, 5, 1), "51B-123.45", 600.0).await?;
        create_test_transaction(&db, date(2024, 5, 20), "29A-999.99", 400.0).await?;
        create_test_transaction(&db, date(2024, 6, 1), "51B-123.45", 9_999.0).await?;

        let mut report = ReconciliationReport::empty(5, 2024)?;
        report.bank_account = 500.0;
        save_report(&db, report).await?;

        let result = reconcile_month(&db, 5, 2024, DEFAULT_TOLERANCE).await?;
        assert_eq!(result.monthly_remaining_total, 1_000.0);
        assert_eq!(
            result.discrepancy.target.basis,
            TargetBasis::MainBus {
                license_plate: "51B-123.45".to_string()
            }
        );
        assert_eq!(result.discrepancy.target.total_target, 500.0);
        assert_eq!(result.discrepancy.status, DiscrepancyStatus::Balanced);
        Ok(())
    }
}
