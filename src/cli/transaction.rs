use super::{BreakdownArgs, Context, Period};
use crate::{
    core::{
        balance::{BalanceSummary, Breakdown},
        bus::load_ownership_directory,
        distribution::distribute_transaction,
        report::format_distribution_summary,
        transaction::{self as tx_core, SaveOptions, SaveOutcome, TransactionDraft},
    },
    entities::{BalanceMode, TransactionStatus},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use tracing::{info, instrument};

/// Copies the given fields onto the breakdown and draft.
fn apply_fields(draft: &mut TransactionDraft, fields: BreakdownArgs) {
    let b: &mut Breakdown = &mut draft.breakdown;
    if let Some(plate) = fields.plate {
        b.bus_plate = plate;
    }
    if let Some(plate) = fields.partner_plate {
        b.partner_bus_plate = plate;
    }
    let numbers = [
        (fields.revenue_down, &mut b.revenue_down),
        (fields.revenue_up, &mut b.revenue_up),
        (fields.fuel, &mut b.expense_fuel),
        (fields.police, &mut b.expense_police),
        (fields.repair, &mut b.expense_repair),
        (fields.total_expense, &mut b.total_expense),
    ];
    for (value, target) in numbers {
        if let Some(value) = value {
            *target = value;
        }
    }
    if let Some(shared) = fields.shared {
        b.is_shared = shared;
    }
    if let Some(balance) = fields.manual_balance {
        b.balance_mode = Some(BalanceMode::Manual);
        b.manual_balance = balance;
    }

    if fields.clear_items {
        b.other_revenue.clear();
        b.other_expenses.clear();
        b.private_expenses.clear();
    }
    if !fields.revenue_items.is_empty() {
        b.other_revenue = fields.revenue_items;
    }
    if !fields.expense_items.is_empty() {
        b.other_expenses = fields.expense_items;
    }
    if !fields.private_items.is_empty() {
        b.private_expenses = fields.private_items;
    }

    if let Some(note) = fields.note {
        draft.note = note;
    }
    if fields.image.is_some() {
        draft.image_ref = fields.image;
    }
}

fn print_summary(ctx: &Context<'_>, summary: &BalanceSummary) {
    println!("  Revenue:         {}", ctx.amount(summary.total_revenue));
    println!("  Shared expense:  {}", ctx.amount(summary.total_expense));
    println!("  Fixed expense:   {}", ctx.amount(summary.fixed_expense));
    let mode = match summary.mode {
        BalanceMode::Manual => " (manual)",
        BalanceMode::Computed => "",
    };
    println!("  Total balance:   {}{mode}", ctx.amount(summary.total_balance));
    println!("  Split balance:   {}", ctx.amount(summary.split_balance));
    println!("  Private expense: {}", ctx.amount(summary.private_expense));
    println!("  Remaining:       {}", ctx.amount(summary.remaining_balance));
}

/// Saves and reports the outcome; conditions that need a decision are explained
/// instead of failing.
async fn save(ctx: &Context<'_>, draft: TransactionDraft, confirm: bool) -> Result<()> {
    let options = SaveOptions {
        confirm_warnings: confirm,
    };
    match tx_core::save_transaction(ctx.db, draft, options).await {
        Ok(outcome) => {
            print_outcome(ctx, &outcome);
            Ok(())
        }
        Err(Error::ConfirmationRequired { warnings }) => {
            println!("Not saved. Please confirm:");
            for warning in &warnings {
                println!("  - {warning}");
            }
            println!("Run again with --yes to save anyway.");
            Ok(())
        }
        Err(Error::DuplicateDate { date, existing_id }) => {
            println!(
                "Not saved. {} already has transaction #{existing_id}; use `tx edit {existing_id}` instead.",
                tx_core::format_date(date)
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn print_outcome(ctx: &Context<'_>, outcome: &SaveOutcome) {
    let t = &outcome.record.transaction;
    println!(
        "Saved transaction #{} for {} ({})",
        t.id,
        tx_core::format_date(t.date),
        t.status
    );
    print_summary(ctx, &outcome.summary);
    for warning in &outcome.confirmed_warnings {
        println!("  Confirmed: {warning}");
    }
    if !outcome.same_date_conflicts.is_empty() {
        let ids: Vec<String> = outcome
            .same_date_conflicts
            .iter()
            .map(|id| format!("#{id}"))
            .collect();
        println!("  Note: the same date also has {}", ids.join(", "));
    }
}

#[instrument(skip(ctx, fields))]
pub async fn add(ctx: &Context<'_>, date: NaiveDate, ai: bool, fields: BreakdownArgs) -> Result<()> {
    let confirm = fields.yes;
    let mut draft = TransactionDraft::new(date, Breakdown::default());
    if ai {
        draft.status = Some(TransactionStatus::AiGenerated);
    }
    apply_fields(&mut draft, fields);
    save(ctx, draft, confirm).await
}

#[instrument(skip(ctx, fields))]
pub async fn edit(
    ctx: &Context<'_>,
    id: i64,
    date: Option<NaiveDate>,
    fields: BreakdownArgs,
) -> Result<()> {
    let confirm = fields.yes;
    let record = tx_core::load_transaction(ctx.db, id).await?;
    let mut draft = TransactionDraft::from_record(&record);
    if let Some(date) = date {
        draft.date = date;
    }
    apply_fields(&mut draft, fields);
    save(ctx, draft, confirm).await
}

pub async fn show(ctx: &Context<'_>, id: i64) -> Result<()> {
    let record = tx_core::load_transaction(ctx.db, id).await?;
    let breakdown = record.breakdown();
    let t = &record.transaction;

    println!("{}", tx_core::format_transaction_summary(t));
    if !t.partner_bus_plate.is_empty() {
        println!("  Partner bus: {}", t.partner_bus_plate);
    }
    if let Some(month) = &t.payment_month {
        println!("  Paid in cycle {month}");
    }
    print_summary(ctx, &breakdown.summarize());

    for (label, items) in [
        ("Other revenue", &breakdown.other_revenue),
        ("Other expense", &breakdown.other_expenses),
        ("Private expense", &breakdown.private_expenses),
    ] {
        for item in items {
            println!("  {label}: {} {}", item.description, ctx.amount(item.amount));
        }
    }

    let directory = load_ownership_directory(ctx.db).await?;
    let split = distribute_transaction(t, &directory);
    println!(
        "{}",
        format_distribution_summary(&split.rounded(), ctx.config.display.thousands_separator)
    );
    if !t.note.is_empty() {
        println!("Note: {}", t.note);
    }
    Ok(())
}

pub async fn list(ctx: &Context<'_>, month: Option<Period>, unpaid: bool) -> Result<()> {
    let transactions = if unpaid {
        tx_core::list_unpaid_transactions(ctx.db).await?
    } else {
        let today = Utc::now().date_naive();
        let period = month.unwrap_or(Period {
            month: today.month(),
            year: today.year(),
        });
        tx_core::list_transactions_for_month(ctx.db, period.year, period.month).await?
    };

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    for t in &transactions {
        println!("{}", tx_core::format_transaction_summary(t));
    }
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn delete(ctx: &Context<'_>, id: i64) -> Result<()> {
    tx_core::delete_transaction(ctx.db, id).await?;
    info!(id, "Deleted from command line");
    println!("Deleted transaction #{id}");
    Ok(())
}
