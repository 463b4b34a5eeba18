//! Payment cycle business logic - Monthly settlement batches of verified transactions.
//!
//! A cycle is keyed `YYYY.MM`. Adding a transaction marks it `PAID` with the cycle id
//! as its payment month; removing it (by editing or deleting the cycle) reverts it to
//! `VERIFIED` with no payment month. Every operation that touches several records
//! runs in one database transaction, so either all members change or none do.
//!
//! Which cycles may be changed is a caller policy ([`CyclePolicy`]); the operations
//! here work on any cycle.

use crate::{
    core::{
        bus::load_ownership_directory,
        distribution::{Distribution, OwnershipDirectory, aggregate_transactions},
        money,
    },
    entities::{PaymentCycle, Transaction, TransactionStatus, payment_cycle, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Builds the cycle id for a calendar month, e.g. `2024.05`.
///
/// # Errors
/// Returns a validation error for a month outside 1-12 or a year outside 1-9999.
pub fn cycle_id(year: i32, month: u32) -> Result<String> {
    if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
        return Err(Error::Validation {
            message: format!("Invalid cycle month {month}/{year}"),
        });
    }
    Ok(format!("{year:04}.{month:02}"))
}

/// Splits a cycle id back into year and month.
///
/// # Errors
/// Returns a validation error when the id is not `YYYY.MM`.
pub fn parse_cycle_id(id: &str) -> Result<(i32, u32)> {
    let invalid = || Error::Validation {
        message: format!("Invalid cycle id '{id}', expected YYYY.MM"),
    };
    let (year, month) = id.trim().split_once('.').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    cycle_id(year, month).map_err(|_| invalid())?;
    Ok((year, month))
}

/// Which cycles the caller allows to be changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Only the most recent cycle (highest id) may be edited or deleted
    #[default]
    LatestOnly,
    /// Any cycle may be edited or deleted
    Unrestricted,
}

impl CyclePolicy {
    /// Checks that `cycle_id` may be changed given the most recent cycle id.
    ///
    /// # Errors
    /// Returns [`Error::CycleLocked`] when the policy forbids the change.
    pub fn ensure_mutable(self, cycle_id: &str, latest: Option<&str>) -> Result<()> {
        match (self, latest) {
            (Self::LatestOnly, Some(latest)) if latest != cycle_id => Err(Error::CycleLocked {
                cycle_id: cycle_id.to_string(),
                latest: latest.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Checks a status change against the transaction lifecycle.
///
/// Allowed: `AI_GENERATED -> VERIFIED`, `VERIFIED -> PAID` and `PAID -> VERIFIED`.
///
/// # Errors
/// Returns [`Error::InvalidStatusTransition`] for anything else.
pub fn check_transition(id: i64, from: TransactionStatus, to: TransactionStatus) -> Result<()> {
    use TransactionStatus::{AiGenerated, Paid, Verified};
    match (from, to) {
        (AiGenerated, Verified) | (Verified, Paid) | (Paid, Verified) => Ok(()),
        _ => Err(Error::InvalidStatusTransition { id, from, to }),
    }
}

/// How a membership change splits into writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    /// Requested ids that are not members yet
    pub added: Vec<i64>,
    /// Current members that are no longer requested
    pub removed: Vec<i64>,
    /// Members that stay; nothing is written for them
    pub unchanged: Vec<i64>,
}

impl MembershipPlan {
    /// Whether any record needs writing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diffs current against requested membership. Duplicate requested ids count once.
#[must_use]
pub fn plan_membership(current: &[i64], requested: &[i64]) -> MembershipPlan {
    let current_set: HashSet<i64> = current.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut plan = MembershipPlan::default();

    for &id in requested {
        if !seen.insert(id) {
            continue;
        }
        if current_set.contains(&id) {
            plan.unchanged.push(id);
        } else {
            plan.added.push(id);
        }
    }
    plan.removed = current
        .iter()
        .copied()
        .filter(|id| !seen.contains(id))
        .collect();
    plan
}

/// What the payment form submits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleInput {
    /// Member transaction ids
    pub transaction_ids: Vec<i64>,
    /// Total settled amount, in thousands
    pub total_amount: f64,
    /// Free-text note
    pub note: String,
}

/// A cycle with its member ids.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    /// The cycle row
    pub cycle: payment_cycle::Model,
    /// Member transaction ids, ascending
    pub transaction_ids: Vec<i64>,
}

/// Member transactions of a cycle ordered by date.
pub async fn get_cycle_members<C>(db: &C, cycle_id: &str) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::PaymentMonth.eq(cycle_id))
        .order_by_asc(transaction::Column::Date)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn member_ids<C>(db: &C, cycle_id: &str) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let mut ids: Vec<i64> = get_cycle_members(db, cycle_id)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

async fn find_cycle<C>(db: &C, cycle_id: &str) -> Result<payment_cycle::Model>
where
    C: ConnectionTrait,
{
    PaymentCycle::find_by_id(cycle_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::CycleNotFound {
            cycle_id: cycle_id.to_string(),
        })
}

/// Loads a cycle and its member ids.
///
/// # Errors
/// Returns [`Error::CycleNotFound`] when no such cycle exists.
pub async fn get_cycle(db: &DatabaseConnection, cycle_id: &str) -> Result<CycleRecord> {
    let cycle = find_cycle(db, cycle_id).await?;
    let transaction_ids = member_ids(db, cycle_id).await?;
    Ok(CycleRecord {
        cycle,
        transaction_ids,
    })
}

/// All cycles, most recent first.
pub async fn list_cycles(db: &DatabaseConnection) -> Result<Vec<payment_cycle::Model>> {
    PaymentCycle::find()
        .order_by_desc(payment_cycle::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Id of the most recent cycle, if any.
pub async fn latest_cycle_id<C>(db: &C) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let latest = PaymentCycle::find()
        .order_by_desc(payment_cycle::Column::Id)
        .one(db)
        .await?;
    Ok(latest.map(|c| c.id))
}

fn validate_total(total_amount: f64) -> Result<()> {
    if total_amount.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidAmount {
            amount: total_amount,
        })
    }
}

/// Loads the records to be added and checks each may become `PAID`.
async fn load_additions(
    txn: &DatabaseTransaction,
    ids: &[i64],
) -> Result<Vec<transaction::Model>> {
    let mut additions = Vec::with_capacity(ids.len());
    for &id in ids {
        let model = Transaction::find_by_id(id)
            .one(txn)
            .await?
            .ok_or(Error::TransactionNotFound { id })?;
        check_transition(id, model.status, TransactionStatus::Paid)?;
        if let Some(month) = &model.payment_month {
            return Err(Error::Validation {
                message: format!("Transaction {id} already belongs to cycle {month}"),
            });
        }
        additions.push(model);
    }
    Ok(additions)
}

async fn set_payment(
    txn: &DatabaseTransaction,
    cycle_id: &str,
    model: transaction::Model,
    payment_month: Option<String>,
) -> Result<()> {
    let transaction_id = model.id;
    let status = if payment_month.is_some() {
        TransactionStatus::Paid
    } else {
        TransactionStatus::Verified
    };

    let mut active: transaction::ActiveModel = model.into();
    active.status = Set(status);
    active.payment_month = Set(payment_month);
    active
        .update(txn)
        .await
        .map_err(|source| Error::CycleMemberUpdate {
            cycle_id: cycle_id.to_string(),
            transaction_id,
            source,
        })?;
    debug!(transaction_id, %status, "Cycle member updated");
    Ok(())
}

async fn mark_paid(
    txn: &DatabaseTransaction,
    cycle_id: &str,
    additions: Vec<transaction::Model>,
) -> Result<()> {
    for model in additions {
        set_payment(txn, cycle_id, model, Some(cycle_id.to_string())).await?;
    }
    Ok(())
}

/// Reverts the given members to `VERIFIED` with no payment month.
async fn revert_members(txn: &DatabaseTransaction, cycle_id: &str, ids: &[i64]) -> Result<()> {
    for &id in ids {
        let model = Transaction::find_by_id(id)
            .one(txn)
            .await?
            .ok_or(Error::TransactionNotFound { id })?;
        set_payment(txn, cycle_id, model, None).await?;
    }
    Ok(())
}

/// Creates the cycle for a month and marks every named transaction `PAID`.
///
/// # Errors
/// - [`Error::CycleExists`] when the month already has a cycle
/// - [`Error::TransactionNotFound`] for an unknown id
/// - [`Error::InvalidStatusTransition`] when a record is not `VERIFIED`
/// - [`Error::CycleMemberUpdate`] when writing a member fails; nothing is kept
#[instrument(skip(db, input), fields(members = input.transaction_ids.len()))]
pub async fn create_cycle(
    db: &DatabaseConnection,
    year: i32,
    month: u32,
    input: CycleInput,
) -> Result<CycleRecord> {
    let id = cycle_id(year, month)?;
    validate_total(input.total_amount)?;

    let txn = db.begin().await?;
    if PaymentCycle::find_by_id(id.clone()).one(&txn).await?.is_some() {
        return Err(Error::CycleExists { cycle_id: id });
    }

    let plan = plan_membership(&[], &input.transaction_ids);
    let additions = load_additions(&txn, &plan.added).await?;

    let cycle = payment_cycle::ActiveModel {
        id: Set(id.clone()),
        created_at: Set(Utc::now()),
        total_amount: Set(input.total_amount),
        note: Set(input.note.trim().to_string()),
    }
    .insert(&txn)
    .await?;
    mark_paid(&txn, &id, additions).await?;

    let transaction_ids = member_ids(&txn, &id).await?;
    txn.commit().await?;

    info!(cycle_id = %id, total = cycle.total_amount, "Payment cycle created");
    Ok(CycleRecord {
        cycle,
        transaction_ids,
    })
}

/// Replaces the membership, total and note of a cycle.
///
/// Added records become `PAID`, removed ones revert to `VERIFIED`, unchanged
/// members are not written.
///
/// # Errors
/// - [`Error::CycleNotFound`] when the cycle does not exist
/// - [`Error::TransactionNotFound`] or [`Error::InvalidStatusTransition`] for a bad addition
/// - [`Error::CycleMemberUpdate`] when writing a member fails; nothing is kept
#[instrument(skip(db, input), fields(members = input.transaction_ids.len()))]
pub async fn update_cycle(
    db: &DatabaseConnection,
    cycle_id: &str,
    input: CycleInput,
) -> Result<CycleRecord> {
    validate_total(input.total_amount)?;

    let txn = db.begin().await?;
    let existing = find_cycle(&txn, cycle_id).await?;
    let current = member_ids(&txn, cycle_id).await?;
    let plan = plan_membership(&current, &input.transaction_ids);
    debug!(?plan, "Membership plan");

    let additions = load_additions(&txn, &plan.added).await?;
    revert_members(&txn, cycle_id, &plan.removed).await?;
    mark_paid(&txn, cycle_id, additions).await?;

    let mut active: payment_cycle::ActiveModel = existing.into();
    active.total_amount = Set(input.total_amount);
    active.note = Set(input.note.trim().to_string());
    let cycle = active.update(&txn).await?;

    let transaction_ids = member_ids(&txn, cycle_id).await?;
    txn.commit().await?;

    info!(
        added = plan.added.len(),
        removed = plan.removed.len(),
        "Payment cycle updated"
    );
    Ok(CycleRecord {
        cycle,
        transaction_ids,
    })
}

/// Deletes a cycle and reverts all its members to `VERIFIED`.
/// Returns the ids that were reverted.
///
/// # Errors
/// - [`Error::CycleNotFound`] when the cycle does not exist
/// - [`Error::CycleMemberUpdate`] when writing a member fails; nothing is kept
#[instrument(skip(db))]
pub async fn delete_cycle(db: &DatabaseConnection, cycle_id: &str) -> Result<Vec<i64>> {
    let txn = db.begin().await?;
    let cycle = find_cycle(&txn, cycle_id).await?;
    let members = member_ids(&txn, cycle_id).await?;

    revert_members(&txn, cycle_id, &members).await?;
    cycle.delete(&txn).await?;
    txn.commit().await?;

    info!(reverted = members.len(), "Payment cycle deleted");
    Ok(members)
}

/// Totals for a set of transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    /// The transactions, ordered by date
    pub transactions: Vec<transaction::Model>,
    /// Σ remaining balance, unrounded
    pub total_remaining: f64,
    /// Aggregated owner and shareholder shares, unrounded
    pub distribution: Distribution,
}

/// Sums remaining balances and aggregates the distribution.
#[must_use]
pub fn summarize_transactions(
    transactions: Vec<transaction::Model>,
    directory: &OwnershipDirectory,
) -> CycleSummary {
    let total_remaining = money::sum(transactions.iter().map(|t| t.remaining_balance));
    let distribution = aggregate_transactions(&transactions, directory);
    CycleSummary {
        transactions,
        total_remaining,
        distribution,
    }
}

/// Summary of a stored cycle.
///
/// # Errors
/// Returns [`Error::CycleNotFound`] when the cycle does not exist.
pub async fn cycle_summary(db: &DatabaseConnection, cycle_id: &str) -> Result<CycleSummary> {
    find_cycle(db, cycle_id).await?;
    let members = get_cycle_members(db, cycle_id).await?;
    let directory = load_ownership_directory(db).await?;
    Ok(summarize_transactions(members, &directory))
}

/// Summary of an arbitrary selection, e.g. before creating a cycle.
///
/// # Errors
/// Returns [`Error::TransactionNotFound`] for the first unknown id.
pub async fn selection_summary(db: &DatabaseConnection, ids: &[i64]) -> Result<CycleSummary> {
    let selected = Transaction::find()
        .filter(transaction::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(transaction::Column::Date)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await?;

    let found: HashSet<i64> = selected.iter().map(|t| t.id).collect();
    if let Some(&id) = ids.iter().find(|id| !found.contains(id)) {
        return Err(Error::TransactionNotFound { id });
    }

    let directory = load_ownership_directory(db).await?;
    Ok(summarize_transactions(selected, &directory))
}
