//! Transaction business logic - Saving, loading and deleting daily records.
//!
//! Saving recomputes every derived balance field from the breakdown, refreshes the
//! auto-generated item summary inside the note, resolves the bus plate to a bus id
//! and replaces the itemized lines. Blocking problems (missing plate, a second
//! record for the same day) abort the save; warnings need explicit confirmation.

use crate::{
    core::{
        balance::{self, BalanceSummary, Breakdown, LineItem, SaveWarning},
        bus::get_bus_by_plate,
        money,
    },
    entities::{
        BalanceMode, ItemKind, Transaction, TransactionItem, TransactionStatus, transaction,
        transaction_item,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Date format used at the boundary.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Parses a `DD/MM/YYYY` date.
///
/// # Errors
/// Returns a validation error when the text is not a valid date.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|e| Error::Validation {
        message: format!("Invalid date '{text}', expected DD/MM/YYYY: {e}"),
    })
}

/// Formats a date as `DD/MM/YYYY`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// First day of the month and first day of the following month.
///
/// # Errors
/// Returns a validation error for a month outside 1-12 or an unrepresentable year.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || Error::Validation {
        message: format!("Invalid month {month}/{year}"),
    };
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((start, end))
}

/// A stored transaction with its itemized lines.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// The transaction row
    pub transaction: transaction::Model,
    /// Itemized lines ordered by kind and position
    pub items: Vec<transaction_item::Model>,
}

impl TransactionRecord {
    fn items_of(&self, kind: ItemKind) -> Vec<LineItem> {
        self.items
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| LineItem::new(item.description.clone(), item.amount))
            .collect()
    }

    /// Rebuilds the editable breakdown of this record.
    #[must_use]
    pub fn breakdown(&self) -> Breakdown {
        let t = &self.transaction;
        Breakdown {
            revenue_down: t.revenue_down,
            revenue_up: t.revenue_up,
            other_revenue: self.items_of(ItemKind::Revenue),
            expense_fuel: t.expense_fuel,
            expense_police: t.expense_police,
            expense_repair: t.expense_repair,
            other_expenses: self.items_of(ItemKind::Expense),
            total_expense: t.total_expense,
            private_expenses: self.items_of(ItemKind::Private),
            is_shared: t.is_shared,
            balance_mode: t.balance_mode,
            manual_balance: t.manual_balance,
            bus_plate: t.bus_plate.clone(),
            partner_bus_plate: t.partner_bus_plate.clone(),
        }
    }
}

/// What the editor submits for a save.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    /// `None` for a new record
    pub id: Option<i64>,
    /// Day the record covers
    pub date: NaiveDate,
    /// Editable inputs
    pub breakdown: Breakdown,
    /// Initial status of a new record, `AI_GENERATED` or `VERIFIED` (default).
    /// Ignored for existing records, whose status is promoted automatically.
    pub status: Option<TransactionStatus>,
    /// Receipt image reference
    pub image_ref: Option<String>,
    /// Note as edited by the user
    pub note: String,
}

impl TransactionDraft {
    /// Draft for a new record.
    #[must_use]
    pub fn new(date: NaiveDate, breakdown: Breakdown) -> Self {
        Self {
            id: None,
            date,
            breakdown,
            status: None,
            image_ref: None,
            note: String::new(),
        }
    }

    /// Draft pre-filled from a stored record, for editing.
    #[must_use]
    pub fn from_record(record: &TransactionRecord) -> Self {
        Self {
            id: Some(record.transaction.id),
            date: record.transaction.date,
            breakdown: record.breakdown(),
            status: None,
            image_ref: record.transaction.image_ref.clone(),
            note: record.transaction.note.clone(),
        }
    }
}

/// Caller decisions for a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// The user confirmed the save warnings
    pub confirm_warnings: bool,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// The stored record
    pub record: TransactionRecord,
    /// Derived balances that were stored
    pub summary: BalanceSummary,
    /// Other records on the same date (only reported when editing)
    pub same_date_conflicts: Vec<i64>,
    /// Warnings the caller confirmed
    pub confirmed_warnings: Vec<SaveWarning>,
}

fn validate_amounts(breakdown: &Breakdown) -> Result<()> {
    let fixed = [
        breakdown.revenue_down,
        breakdown.revenue_up,
        breakdown.expense_fuel,
        breakdown.expense_police,
        breakdown.expense_repair,
        breakdown.total_expense,
        breakdown.manual_balance,
    ];
    let items = breakdown
        .other_revenue
        .iter()
        .chain(&breakdown.other_expenses)
        .chain(&breakdown.private_expenses)
        .map(|item| item.amount);

    match fixed.into_iter().chain(items).find(|amount| !amount.is_finite()) {
        Some(amount) => Err(Error::InvalidAmount { amount }),
        None => Ok(()),
    }
}

/// Retrieves a transaction row by id.
pub async fn get_transaction_by_id<C>(db: &C, id: i64) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(id).one(db).await.map_err(Into::into)
}

async fn get_items<C>(db: &C, transaction_id: i64) -> Result<Vec<transaction_item::Model>>
where
    C: ConnectionTrait,
{
    TransactionItem::find()
        .filter(transaction_item::Column::TransactionId.eq(transaction_id))
        .order_by_asc(transaction_item::Column::Kind)
        .order_by_asc(transaction_item::Column::Position)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads a transaction with its itemized lines.
///
/// # Errors
/// Returns [`Error::TransactionNotFound`] when no such record exists.
pub async fn load_transaction<C>(db: &C, id: i64) -> Result<TransactionRecord>
where
    C: ConnectionTrait,
{
    let transaction = get_transaction_by_id(db, id)
        .await?
        .ok_or(Error::TransactionNotFound { id })?;
    let items = get_items(db, id).await?;
    Ok(TransactionRecord { transaction, items })
}

/// Retrieves every record for a date.
pub async fn find_by_date<C>(db: &C, date: NaiveDate) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::Date.eq(date))
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the records of one calendar month ordered by date.
pub async fn list_transactions_for_month<C>(
    db: &C,
    year: i32,
    month: u32,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let (start, end) = month_bounds(year, month)?;
    Transaction::find()
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lt(end))
        .order_by_asc(transaction::Column::Date)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves verified records not yet assigned to a payment cycle.
pub async fn list_unpaid_transactions(db: &DatabaseConnection) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Verified))
        .filter(transaction::Column::PaymentMonth.is_null())
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Status a record is saved with.
fn status_for_save(
    existing: Option<&transaction::Model>,
    requested: Option<TransactionStatus>,
) -> Result<TransactionStatus> {
    match existing {
        Some(current) => Ok(match current.status {
            TransactionStatus::AiGenerated => TransactionStatus::Verified,
            other => other,
        }),
        None => match requested.unwrap_or(TransactionStatus::Verified) {
            TransactionStatus::Paid => Err(Error::Validation {
                message: "New transactions can only be paid through a payment cycle".to_string(),
            }),
            status => Ok(status),
        },
    }
}

fn apply_breakdown(
    active: &mut transaction::ActiveModel,
    breakdown: &Breakdown,
    summary: &BalanceSummary,
) {
    active.revenue_down = Set(breakdown.revenue_down);
    active.revenue_up = Set(breakdown.revenue_up);
    active.expense_fuel = Set(breakdown.expense_fuel);
    active.expense_police = Set(breakdown.expense_police);
    active.expense_repair = Set(breakdown.expense_repair);
    active.total_expense = Set(breakdown.total_expense);
    active.is_shared = Set(breakdown.is_shared);
    active.balance_mode = Set(Some(summary.mode));
    active.manual_balance = Set(breakdown.manual_balance);
    active.bus_plate = Set(breakdown.bus_plate.trim().to_string());
    active.partner_bus_plate = Set(breakdown.partner_bus_plate.trim().to_string());
    active.revenue = Set(summary.total_revenue);
    active.shared_expense = Set(summary.total_expense);
    active.total_balance = Set(summary.total_balance);
    active.split_balance = Set(summary.split_balance);
    active.remaining_balance = Set(summary.remaining_balance);
}

async fn replace_items<C>(
    db: &C,
    transaction_id: i64,
    breakdown: &Breakdown,
) -> Result<Vec<transaction_item::Model>>
where
    C: ConnectionTrait,
{
    TransactionItem::delete_many()
        .filter(transaction_item::Column::TransactionId.eq(transaction_id))
        .exec(db)
        .await?;

    let lists = [
        (ItemKind::Revenue, &breakdown.other_revenue),
        (ItemKind::Expense, &breakdown.other_expenses),
        (ItemKind::Private, &breakdown.private_expenses),
    ];

    let mut saved = Vec::new();
    for (kind, items) in lists {
        for (position, item) in (0_i32..).zip(items.iter()) {
            let model = transaction_item::ActiveModel {
                transaction_id: Set(transaction_id),
                kind: Set(kind),
                position: Set(position),
                description: Set(item.description.trim().to_string()),
                amount: Set(item.amount),
                ..Default::default()
            }
            .insert(db)
            .await?;
            saved.push(model);
        }
    }
    Ok(saved)
}

/// Saves a new or edited transaction.
///
/// # Errors
/// - [`Error::Validation`] when the plate is missing or a new record asks for `PAID`
/// - [`Error::InvalidAmount`] when an amount is not finite
/// - [`Error::TransactionNotFound`] when editing a record that does not exist
/// - [`Error::DuplicateDate`] when a new record targets a date that already has one;
///   the caller may switch to editing `existing_id`
/// - [`Error::ConfirmationRequired`] when warnings were not confirmed
/// - [`Error::Database`] when the store fails
#[instrument(skip(db, draft), fields(id = ?draft.id, date = %draft.date))]
pub async fn save_transaction(
    db: &DatabaseConnection,
    draft: TransactionDraft,
    options: SaveOptions,
) -> Result<SaveOutcome> {
    if draft.breakdown.bus_plate.trim().is_empty() {
        return Err(Error::Validation {
            message: "License plate is required".to_string(),
        });
    }
    validate_amounts(&draft.breakdown)?;

    let breakdown = draft.breakdown.normalized();
    let summary = breakdown.summarize();

    let existing = match draft.id {
        Some(id) => Some(load_transaction(db, id).await?),
        None => None,
    };

    let same_date_conflicts: Vec<i64> = find_by_date(db, draft.date)
        .await?
        .into_iter()
        .map(|t| t.id)
        .filter(|id| Some(*id) != draft.id)
        .collect();
    if existing.is_none() {
        if let Some(&existing_id) = same_date_conflicts.first() {
            return Err(Error::DuplicateDate {
                date: draft.date,
                existing_id,
            });
        }
    } else if !same_date_conflicts.is_empty() {
        warn!(?same_date_conflicts, "Another transaction exists for this date");
    }

    let warnings = balance::save_warnings(&summary);
    if !warnings.is_empty() && !options.confirm_warnings {
        return Err(Error::ConfirmationRequired { warnings });
    }

    let status = status_for_save(existing.as_ref().map(|r| &r.transaction), draft.status)?;

    let bus_id = match get_bus_by_plate(db, &breakdown.bus_plate).await? {
        Some(bus) => Some(bus.id),
        None => {
            warn!(plate = %breakdown.bus_plate, "Bus plate not registered");
            None
        }
    };

    let previous_auto = existing
        .as_ref()
        .map(|record| balance::auto_note(&record.breakdown()))
        .unwrap_or_default();
    let note = balance::merge_note(&draft.note, &previous_auto, &balance::auto_note(&breakdown));

    let txn = db.begin().await?;
    let mut active = match &existing {
        Some(record) => record.transaction.clone().into(),
        None => transaction::ActiveModel {
            payment_month: Set(None),
            ..Default::default()
        },
    };
    active.date = Set(draft.date);
    active.status = Set(status);
    active.image_ref = Set(draft.image_ref.clone());
    active.note = Set(note);
    active.bus_id = Set(bus_id);
    apply_breakdown(&mut active, &breakdown, &summary);

    let transaction = if existing.is_some() {
        active.update(&txn).await?
    } else {
        active.insert(&txn).await?
    };
    let items = replace_items(&txn, transaction.id, &breakdown).await?;
    txn.commit().await?;

    info!(id = transaction.id, status = %transaction.status, "Transaction saved");
    Ok(SaveOutcome {
        record: TransactionRecord { transaction, items },
        summary,
        same_date_conflicts,
        confirmed_warnings: warnings,
    })
}

/// Deletes a transaction and its itemized lines.
///
/// # Errors
/// Returns [`Error::TransactionPaid`] for paid records and
/// [`Error::TransactionNotFound`] when there is nothing to delete.
#[instrument(skip(db))]
pub async fn delete_transaction(db: &DatabaseConnection, id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let transaction = get_transaction_by_id(&txn, id)
        .await?
        .ok_or(Error::TransactionNotFound { id })?;
    if transaction.status == TransactionStatus::Paid {
        return Err(Error::TransactionPaid { id });
    }

    TransactionItem::delete_many()
        .filter(transaction_item::Column::TransactionId.eq(id))
        .exec(&txn)
        .await?;
    transaction.delete(&txn).await?;
    txn.commit().await?;

    info!("Transaction deleted");
    Ok(())
}

/// Short one-line description of a stored record.
#[must_use]
pub fn format_transaction_summary(transaction: &transaction::Model) -> String {
    let mode = match transaction.balance_mode {
        Some(BalanceMode::Manual) => " (manual)",
        _ => "",
    };
    format!(
        "#{} | {} | {} | {} | remaining {}{mode}",
        transaction.id,
        format_date(transaction.date),
        transaction.bus_plate,
        transaction.status,
        money::format_amount(transaction.remaining_balance),
    )
}
