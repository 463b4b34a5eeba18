//! Transaction balance calculator.
//!
//! Derives the balance fields of one day's record from its editable breakdown:
//! revenue, shared expense, total balance, split balance and remaining balance.
//! Everything here is a pure function of its inputs; calling it twice with the same
//! breakdown yields the same summary.
//!
//! The manually entered total expense is authoritative. The itemized expense fields
//! only determine the "fixed expense" residual, which may go negative.

use crate::core::money::{self, is_zero};
use crate::entities::BalanceMode;
use serde::{Deserialize, Serialize};

/// A named amount in one of the breakdown lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineItem {
    /// What the amount is for
    pub description: String,
    /// Amount in thousands
    pub amount: f64,
}

impl LineItem {
    /// Creates a line item.
    pub fn new(description: impl Into<String>, amount: f64) -> Self {
        Self {
            description: description.into(),
            amount,
        }
    }
}

/// The editable inputs of a transaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Breakdown {
    /// Revenue from the down route
    pub revenue_down: f64,
    /// Revenue from the up route
    pub revenue_up: f64,
    /// Other named revenue
    pub other_revenue: Vec<LineItem>,
    /// Fuel expense
    pub expense_fuel: f64,
    /// Police and toll expense
    pub expense_police: f64,
    /// Repair expense
    pub expense_repair: f64,
    /// Other named shared expenses
    pub other_expenses: Vec<LineItem>,
    /// Manually entered total expense
    pub total_expense: f64,
    /// Named private expenses, deducted after the split
    pub private_expenses: Vec<LineItem>,
    /// Whether the day was run with a second vehicle
    pub is_shared: bool,
    /// Stored mode, `None` for legacy records
    pub balance_mode: Option<BalanceMode>,
    /// Directly entered balance for manual mode
    pub manual_balance: f64,
    /// Plate of the assigned bus
    pub bus_plate: String,
    /// Plate of the partner bus, empty when none
    pub partner_bus_plate: String,
}

/// All derived balance figures for one breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Down + up + other revenue
    pub total_revenue: f64,
    /// Fuel + police + repair + other expenses
    pub itemized_expense: f64,
    /// The manual total expense ("shared expense")
    pub total_expense: f64,
    /// Total expense minus itemized expense
    pub fixed_expense: f64,
    /// Sum of private expenses
    pub private_expense: f64,
    /// Mode the total balance was taken from
    pub mode: BalanceMode,
    /// Revenue minus total expense, whatever the mode
    pub computed_balance: f64,
    /// Balance after applying the mode
    pub total_balance: f64,
    /// Total balance, halved unless the day was shared
    pub split_balance: f64,
    /// Split balance minus private expenses
    pub remaining_balance: f64,
}

impl BalanceSummary {
    /// Whether the fixed expense residual went negative.
    #[must_use]
    pub fn has_negative_fixed_expense(&self) -> bool {
        self.fixed_expense < 0.0 && !is_zero(self.fixed_expense)
    }

    /// Whether revenue, expense, private expense and balance are all zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        is_zero(self.total_revenue)
            && is_zero(self.total_expense)
            && is_zero(self.private_expense)
            && is_zero(self.total_balance)
    }
}

/// Non-blocking conditions that need explicit confirmation before saving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SaveWarning {
    /// Revenue, expense, private expense and balance are all zero
    EmptyFinancials,
    /// The itemized expenses exceed the manual total expense
    NegativeFixedExpense {
        /// The negative residual
        fixed_expense: f64,
    },
}

impl std::fmt::Display for SaveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFinancials => f.write_str("the record has no financial data"),
            Self::NegativeFixedExpense { fixed_expense } => write!(
                f,
                "itemized expenses exceed the total expense (fixed expense {})",
                money::format_amount(*fixed_expense)
            ),
        }
    }
}

/// Picks the balance mode for the given totals.
///
/// Manual mode is only possible while both revenue and total expense are zero.
/// A stored `Manual` mode reverts to computed as soon as either becomes nonzero;
/// records without a stored mode infer manual from the zero check.
#[must_use]
pub fn resolve_mode(
    stored: Option<BalanceMode>,
    total_revenue: f64,
    total_expense: f64,
) -> BalanceMode {
    if !(is_zero(total_revenue) && is_zero(total_expense)) {
        return BalanceMode::Computed;
    }
    match stored {
        Some(BalanceMode::Computed) => BalanceMode::Computed,
        Some(BalanceMode::Manual) | None => BalanceMode::Manual,
    }
}

fn sum_items(items: &[LineItem]) -> f64 {
    money::sum(items.iter().map(|item| item.amount))
}

impl Breakdown {
    /// Down + up + other revenue.
    #[must_use]
    pub fn total_revenue(&self) -> f64 {
        self.revenue_down + self.revenue_up + sum_items(&self.other_revenue)
    }

    /// Fuel + police + repair + other expenses.
    #[must_use]
    pub fn itemized_expense(&self) -> f64 {
        self.expense_fuel + self.expense_police + self.expense_repair + sum_items(&self.other_expenses)
    }

    /// Residual of the manual total over the itemized expenses; may be negative.
    #[must_use]
    pub fn fixed_expense(&self) -> f64 {
        self.total_expense - self.itemized_expense()
    }

    /// Sum of private expenses.
    #[must_use]
    pub fn private_expense(&self) -> f64 {
        sum_items(&self.private_expenses)
    }

    /// The mode this breakdown resolves to right now.
    #[must_use]
    pub fn resolved_mode(&self) -> BalanceMode {
        resolve_mode(self.balance_mode, self.total_revenue(), self.total_expense)
    }

    /// Computes every derived balance field.
    #[must_use]
    pub fn summarize(&self) -> BalanceSummary {
        let total_revenue = self.total_revenue();
        let itemized_expense = self.itemized_expense();
        let total_expense = self.total_expense;
        let private_expense = self.private_expense();
        let mode = resolve_mode(self.balance_mode, total_revenue, total_expense);

        let computed_balance = total_revenue - total_expense;
        let total_balance = match mode {
            BalanceMode::Manual => self.manual_balance,
            BalanceMode::Computed => computed_balance,
        };
        let split_balance = if self.is_shared {
            total_balance
        } else {
            total_balance / 2.0
        };

        BalanceSummary {
            total_revenue,
            itemized_expense,
            total_expense,
            fixed_expense: total_expense - itemized_expense,
            private_expense,
            mode,
            computed_balance,
            total_balance,
            split_balance,
            remaining_balance: split_balance - private_expense,
        }
    }

    /// Returns a copy with the resolved mode stored explicitly. A manual balance
    /// that no longer applies is discarded.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mode = self.resolved_mode();
        let mut normalized = self.clone();
        normalized.balance_mode = Some(mode);
        if mode == BalanceMode::Computed {
            normalized.manual_balance = 0.0;
        }
        normalized
    }
}

/// Lists the conditions that must be confirmed before saving.
#[must_use]
pub fn save_warnings(summary: &BalanceSummary) -> Vec<SaveWarning> {
    let mut warnings = Vec::new();
    if summary.is_empty() {
        warnings.push(SaveWarning::EmptyFinancials);
    }
    if summary.has_negative_fixed_expense() {
        warnings.push(SaveWarning::NegativeFixedExpense {
            fixed_expense: summary.fixed_expense,
        });
    }
    warnings
}

/// Builds the one-line summary of itemized lines, e.g.
/// `Parking fee (+20); Tyre (-150); Lunch (-5.5)`.
///
/// Amounts are shown unrounded. A negative amount flips the sign of its line.
/// Lines without a description or with a zero amount are skipped.
#[must_use]
pub fn auto_note(breakdown: &Breakdown) -> String {
    let revenue = breakdown.other_revenue.iter().map(|item| (item, '+'));
    let expenses = breakdown
        .other_expenses
        .iter()
        .chain(&breakdown.private_expenses)
        .map(|item| (item, '-'));

    revenue
        .chain(expenses)
        .filter(|(item, _)| !item.description.trim().is_empty() && !is_zero(item.amount))
        .map(|(item, sign)| {
            let sign = match (sign, item.amount < 0.0) {
                ('+', true) => '-',
                ('-', true) => '+',
                (sign, false) => sign,
                (_, true) => unreachable!("sign is always '+' or '-'"),
            };
            format!("{} ({sign}{})", item.description.trim(), item.amount.abs())
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Replaces the previously generated summary inside `note` with `current`,
/// keeping whatever the user wrote around it.
///
/// When `previous` cannot be found verbatim the new summary is appended on its
/// own line, so an edited summary may end up duplicated.
#[must_use]
pub fn merge_note(note: &str, previous: &str, current: &str) -> String {
    if !previous.is_empty() && note.contains(previous) {
        if current.is_empty() {
            return remove_summary(note, previous);
        }
        return note.replacen(previous, current, 1).trim().to_string();
    }
    if current.is_empty() {
        return note.to_string();
    }
    if note.trim().is_empty() {
        return current.to_string();
    }
    format!("{}\n{current}", note.trim_end())
}

/// Drops `previous` from `note` together with the line break that set it apart.
fn remove_summary(note: &str, previous: &str) -> String {
    let own_line = format!("{previous}\n");
    let last_line = format!("\n{previous}");
    let removed = if note.contains(&own_line) {
        note.replacen(&own_line, "", 1)
    } else if note.contains(&last_line) {
        note.replacen(&last_line, "", 1)
    } else {
        note.replacen(previous, "", 1)
    };
    removed.trim().to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    fn scenario_breakdown(is_shared: bool) -> Breakdown {
        Breakdown {
            revenue_down: 100.0,
            revenue_up: 50.0,
            total_expense: 60.0,
            expense_fuel: 20.0,
            is_shared,
            bus_plate: "51B-123.45".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_shared_day_keeps_full_balance() {
        let summary = scenario_breakdown(true).summarize();

        assert_eq!(summary.total_revenue, 150.0);
        assert_eq!(summary.total_expense, 60.0);
        assert_eq!(summary.fixed_expense, 40.0);
        assert_eq!(summary.total_balance, 90.0);
        assert_eq!(summary.split_balance, 90.0);
        assert_eq!(summary.remaining_balance, 90.0);
        assert_eq!(summary.mode, BalanceMode::Computed);
    }

    #[test]
    fn test_unshared_day_halves_balance() {
        let summary = scenario_breakdown(false).summarize();

        assert_eq!(summary.split_balance, 45.0);
        assert_eq!(summary.remaining_balance, 45.0);
    }

    #[test]
    fn test_total_expense_is_not_itemized_sum() {
        let mut breakdown = scenario_breakdown(true);
        breakdown.expense_police = 10.0;
        breakdown.other_expenses = vec![LineItem::new("Wash", 5.0)];

        let summary = breakdown.summarize();
        assert_eq!(summary.itemized_expense, 35.0);
        assert_eq!(summary.total_expense, 60.0);
        assert_eq!(summary.total_balance, 90.0);
        assert_eq!(summary.fixed_expense, 25.0);
    }

    #[test]
    fn test_fixed_expense_may_go_negative() {
        let mut breakdown = scenario_breakdown(true);
        breakdown.expense_repair = 70.0;

        let summary = breakdown.summarize();
        assert_eq!(summary.fixed_expense, -30.0);
        assert!(summary.has_negative_fixed_expense());
        assert_eq!(
            save_warnings(&summary),
            vec![SaveWarning::NegativeFixedExpense {
                fixed_expense: -30.0
            }]
        );
    }

    #[test]
    fn test_remaining_subtracts_private_in_every_mode() {
        let mut breakdown = scenario_breakdown(false);
        breakdown.private_expenses = vec![LineItem::new("Lunch", 5.0), LineItem::new("Phone", 3.0)];
        let summary = breakdown.summarize();
        assert_eq!(summary.remaining_balance, summary.split_balance - 8.0);

        let manual = Breakdown {
            manual_balance: 200.0,
            private_expenses: vec![LineItem::new("Lunch", 5.0)],
            ..Default::default()
        };
        let summary = manual.summarize();
        assert_eq!(summary.mode, BalanceMode::Manual);
        assert_eq!(summary.split_balance, 100.0);
        assert_eq!(summary.remaining_balance, 95.0);
    }

    #[test]
    fn test_manual_mode_inferred_for_legacy_records() {
        let breakdown = Breakdown {
            manual_balance: 300.0,
            is_shared: true,
            ..Default::default()
        };
        let summary = breakdown.summarize();
        assert_eq!(summary.mode, BalanceMode::Manual);
        assert_eq!(summary.total_balance, 300.0);
        assert_eq!(summary.computed_balance, 0.0);
    }

    #[test]
    fn test_manual_mode_reverts_when_revenue_entered() {
        let breakdown = Breakdown {
            balance_mode: Some(BalanceMode::Manual),
            manual_balance: 300.0,
            revenue_up: 40.0,
            is_shared: true,
            ..Default::default()
        };
        let summary = breakdown.summarize();
        assert_eq!(summary.mode, BalanceMode::Computed);
        assert_eq!(summary.total_balance, 40.0);

        let normalized = breakdown.normalized();
        assert_eq!(normalized.balance_mode, Some(BalanceMode::Computed));
        assert_eq!(normalized.manual_balance, 0.0);
    }

    #[test]
    fn test_explicit_computed_mode_ignores_manual_value() {
        let breakdown = Breakdown {
            balance_mode: Some(BalanceMode::Computed),
            manual_balance: 300.0,
            ..Default::default()
        };
        assert_eq!(breakdown.summarize().total_balance, 0.0);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let mut breakdown = scenario_breakdown(false);
        breakdown.other_revenue = vec![LineItem::new("Cargo", 12.5)];
        assert_eq!(breakdown.summarize(), breakdown.summarize());
    }

    #[test]
    fn test_empty_record_needs_confirmation() {
        let summary = Breakdown::default().summarize();
        assert_eq!(save_warnings(&summary), vec![SaveWarning::EmptyFinancials]);
        assert!(save_warnings(&scenario_breakdown(true).summarize()).is_empty());
    }

    #[test]
    fn test_auto_note_formats_items() {
        let breakdown = Breakdown {
            other_revenue: vec![LineItem::new("Cargo", 20.0), LineItem::new("", 9.0)],
            other_expenses: vec![LineItem::new("Tyre", 1500.0), LineItem::new("Wash", 0.0)],
            private_expenses: vec![LineItem::new(" Lunch ", 5.0)],
            ..Default::default()
        };
        assert_eq!(
            auto_note(&breakdown),
            "Cargo (+20); Tyre (-1500); Lunch (-5)"
        );
        assert_eq!(auto_note(&Breakdown::default()), "");
    }

    #[test]
    fn test_auto_note_keeps_sign_and_fraction() {
        let breakdown = Breakdown {
            other_revenue: vec![LineItem::new("Refund", -5.0), LineItem::new("Cargo", 12.5)],
            other_expenses: vec![LineItem::new("Rebate", -3.0), LineItem::new("Toll", 0.4)],
            ..Default::default()
        };
        assert_eq!(
            auto_note(&breakdown),
            "Refund (-5); Cargo (+12.5); Rebate (+3); Toll (-0.4)"
        );
    }

    #[test]
    fn test_merge_note_replaces_previous_summary() {
        let note = "Driver: Minh\nCargo (+20)\nchecked";
        let merged = merge_note(note, "Cargo (+20)", "Cargo (+25); Tyre (-10)");
        assert_eq!(merged, "Driver: Minh\nCargo (+25); Tyre (-10)\nchecked");
    }

    #[test]
    fn test_merge_note_appends_when_previous_missing() {
        assert_eq!(merge_note("", "", "Cargo (+20)"), "Cargo (+20)");
        assert_eq!(
            merge_note("Driver: Minh", "Cargo (+20)", "Cargo (+25)"),
            "Driver: Minh\nCargo (+25)"
        );
        // A user-edited summary is not recognised, so the new one is appended.
        assert_eq!(
            merge_note("Cargo (+2O)", "Cargo (+20)", "Cargo (+20)"),
            "Cargo (+2O)\nCargo (+20)"
        );
    }

    #[test]
    fn test_merge_note_removes_cleared_summary() {
        assert_eq!(merge_note("Cargo (+20)", "Cargo (+20)", ""), "");
        assert_eq!(merge_note("keep me", "", ""), "keep me");
        assert_eq!(
            merge_note("Driver\nCargo (+20)\nchecked", "Cargo (+20)", ""),
            "Driver\nchecked"
        );
        assert_eq!(merge_note("Driver\nCargo (+20)", "Cargo (+20)", ""), "Driver");
    }
}
