use super::{Context, Period};
use crate::{
    core::{
        balance::LineItem,
        money::format_signed,
        reconciliation::{self as recon_core, MonthlyReconciliation, ReconciliationReport},
    },
    errors::Result,
};
use tracing::instrument;

/// Holdings given on the command line; omitted values keep what is stored.
#[derive(Debug, Default)]
pub struct HoldingsUpdate {
    pub cash_storage: Option<f64>,
    pub cash_wallet: Option<f64>,
    pub bank_account: Option<f64>,
    pub existing_money: Option<f64>,
    pub paid_items: Vec<LineItem>,
    pub debt_items: Vec<LineItem>,
    /// Drop stored items before applying the given ones
    pub clear_items: bool,
}

impl HoldingsUpdate {
    fn apply(self, report: &mut ReconciliationReport) {
        let figures = [
            (self.cash_storage, &mut report.cash_storage),
            (self.cash_wallet, &mut report.cash_wallet),
            (self.bank_account, &mut report.bank_account),
            (self.existing_money, &mut report.existing_money),
        ];
        for (value, target) in figures {
            if let Some(value) = value {
                *target = value;
            }
        }
        if self.clear_items {
            report.paid_items.clear();
            report.debt_items.clear();
        }
        if !self.paid_items.is_empty() {
            report.paid_items = self.paid_items;
        }
        if !self.debt_items.is_empty() {
            report.debt_items = self.debt_items;
        }
    }
}

fn print_reconciliation(ctx: &Context<'_>, result: &MonthlyReconciliation) {
    let report = &result.report;
    let d = &result.discrepancy;
    let target = &d.target;

    println!("Reconciliation {:02}/{}", report.month, report.year);
    match report.updated_at {
        Some(at) => println!("  Last saved {}", at.format("%d/%m/%Y %H:%M")),
        None => println!("  Not saved yet"),
    }
    println!("  Month remaining total: {}", ctx.amount(result.monthly_remaining_total));
    println!("  Target:                {}", ctx.amount(target.total_target));
    println!("    Owner:               {}", ctx.amount(target.owner_target));
    for (name, share) in &target.shareholder_targets {
        println!("    {name}: {}", ctx.amount(*share));
    }
    if let Some(partner) = target.partner_target {
        println!("    Partner:             {}", ctx.amount(partner));
    }
    println!("  Cash at storage:       {}", ctx.amount(report.cash_storage));
    println!("  Cash in wallet:        {}", ctx.amount(report.cash_wallet));
    println!("  Bank account:          {}", ctx.amount(report.bank_account));
    for item in &report.paid_items {
        println!("  + {} {}", item.description, ctx.amount(item.amount));
    }
    for item in &report.debt_items {
        println!("  - {} {}", item.description, ctx.amount(item.amount));
    }
    println!("  Adjusted assets:       {}", ctx.amount(d.total_adjusted_assets));
    println!("  Existing money:        {}", ctx.amount(d.existing_money));
    println!(
        "  Discrepancy:           {} ({})",
        format_signed(d.discrepancy),
        d.status
    );
}

pub async fn show(ctx: &Context<'_>, month: Period) -> Result<()> {
    let result = recon_core::reconcile_month(
        ctx.db,
        month.month,
        month.year,
        ctx.config.reconciliation.tolerance,
    )
    .await?;
    print_reconciliation(ctx, &result);
    Ok(())
}

#[instrument(skip(ctx, update))]
pub async fn set(ctx: &Context<'_>, month: Period, update: HoldingsUpdate) -> Result<()> {
    let mut report = recon_core::load_or_default_report(ctx.db, month.month, month.year).await?;
    update.apply(&mut report);
    recon_core::save_report(ctx.db, report).await?;
    show(ctx, month).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_holdings_update_keeps_omitted_values() {
        let mut report = ReconciliationReport::empty(5, 2024).unwrap();
        report.cash_wallet = 300.0;
        report.debt_items = vec![LineItem::new("Loan", 100.0)];

        HoldingsUpdate {
            bank_account: Some(1_000.0),
            paid_items: vec![LineItem::new("Insurance", 50.0)],
            ..Default::default()
        }
        .apply(&mut report);

        assert_eq!(report.cash_wallet, 300.0);
        assert_eq!(report.bank_account, 1_000.0);
        assert_eq!(report.paid_items.len(), 1);
        assert_eq!(report.debt_items.len(), 1);

        HoldingsUpdate {
            clear_items: true,
            ..Default::default()
        }
        .apply(&mut report);
        assert!(report.paid_items.is_empty());
        assert!(report.debt_items.is_empty());
    }
}
