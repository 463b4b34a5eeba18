use super::{Context, Period};
use crate::{
    core::{
        cycle::{self as cycle_core, CycleInput, CycleRecord, CycleSummary},
        money::round_half_up,
        report::{format_distribution_summary, generate_cycle_report},
        transaction::format_date,
    },
    errors::Result,
};
use std::fs::File;
use tracing::{info, instrument};

fn print_summary(ctx: &Context<'_>, summary: &CycleSummary) {
    for t in &summary.transactions {
        println!(
            "  #{} {} {} {}",
            t.id,
            format_date(t.date),
            t.bus_plate,
            ctx.amount(t.remaining_balance)
        );
    }
    println!("Total remaining: {}", ctx.amount(summary.total_remaining));
    println!(
        "{}",
        format_distribution_summary(
            &summary.distribution.rounded(),
            ctx.config.display.thousands_separator
        )
    );
}

fn print_record(ctx: &Context<'_>, record: &CycleRecord) {
    println!(
        "Cycle {} | {} transactions | total {}",
        record.cycle.id,
        record.transaction_ids.len(),
        ctx.amount(record.cycle.total_amount)
    );
}

/// Loads the cycle, then checks the configured policy against the most recent one.
async fn load_mutable(ctx: &Context<'_>, cycle_id: &str) -> Result<CycleRecord> {
    let record = cycle_core::get_cycle(ctx.db, cycle_id).await?;
    let latest = cycle_core::latest_cycle_id(ctx.db).await?;
    ctx.config
        .cycles
        .policy
        .ensure_mutable(cycle_id, latest.as_deref())?;
    Ok(record)
}

#[instrument(skip(ctx, note))]
pub async fn create(
    ctx: &Context<'_>,
    month: Period,
    transactions: Vec<i64>,
    total: Option<f64>,
    note: String,
) -> Result<()> {
    let selection = cycle_core::selection_summary(ctx.db, &transactions).await?;
    print_summary(ctx, &selection);

    let input = CycleInput {
        transaction_ids: transactions,
        total_amount: total.unwrap_or_else(|| round_half_up(selection.total_remaining)),
        note,
    };
    let record = cycle_core::create_cycle(ctx.db, month.year, month.month, input).await?;
    print_record(ctx, &record);
    Ok(())
}

#[instrument(skip(ctx, note))]
pub async fn update(
    ctx: &Context<'_>,
    cycle_id: &str,
    transactions: Option<Vec<i64>>,
    total: Option<f64>,
    note: Option<String>,
) -> Result<()> {
    let current = load_mutable(ctx, cycle_id).await?;
    let transactions = transactions.unwrap_or(current.transaction_ids);
    let selection = cycle_core::selection_summary(ctx.db, &transactions).await?;

    let input = CycleInput {
        transaction_ids: transactions,
        total_amount: total.unwrap_or_else(|| round_half_up(selection.total_remaining)),
        note: note.unwrap_or(current.cycle.note),
    };
    let record = cycle_core::update_cycle(ctx.db, cycle_id, input).await?;
    print_record(ctx, &record);
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn delete(ctx: &Context<'_>, cycle_id: &str) -> Result<()> {
    load_mutable(ctx, cycle_id).await?;
    let reverted = cycle_core::delete_cycle(ctx.db, cycle_id).await?;
    println!(
        "Deleted cycle {cycle_id}; {} transactions back to VERIFIED",
        reverted.len()
    );
    Ok(())
}

pub async fn list(ctx: &Context<'_>) -> Result<()> {
    let cycles = cycle_core::list_cycles(ctx.db).await?;
    if cycles.is_empty() {
        println!("No payment cycles yet.");
        return Ok(());
    }
    for (index, cycle) in cycles.iter().enumerate() {
        let marker = if index == 0 { " (latest)" } else { "" };
        println!(
            "{}{marker} | created {} | total {}",
            cycle.id,
            cycle.created_at.format("%d/%m/%Y"),
            ctx.amount(cycle.total_amount)
        );
    }
    Ok(())
}

pub async fn show(ctx: &Context<'_>, cycle_id: &str) -> Result<()> {
    let record = cycle_core::get_cycle(ctx.db, cycle_id).await?;
    print_record(ctx, &record);
    if !record.cycle.note.is_empty() {
        println!("Note: {}", record.cycle.note);
    }
    let summary = cycle_core::cycle_summary(ctx.db, cycle_id).await?;
    print_summary(ctx, &summary);
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn export(ctx: &Context<'_>, cycle_id: &str, output: Option<String>) -> Result<()> {
    let report = generate_cycle_report(ctx.db, cycle_id).await?;
    let path = output.unwrap_or_else(|| format!("cycle_{cycle_id}.csv"));
    report.write_csv(File::create(&path)?)?;
    info!(path = %path, rows = report.rows.len(), "Cycle report exported");
    println!("Exported {} rows to {path}", report.rows.len());
    Ok(())
}
