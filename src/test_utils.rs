//! Shared test utilities for the bus ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        balance::Breakdown,
        bus::{self, BusInput, BusRecord, ShareholderInput},
        transaction::{self, SaveOptions, TransactionDraft},
    },
    entities::{
        BalanceMode, BusStatus, TransactionStatus, bus as bus_entity, shareholder,
        transaction as transaction_entity,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shorthand for a calendar date. Panics on an invalid date.
#[allow(clippy::unwrap_used)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Bus form input.
///
/// # Defaults
/// * status: `ACTIVE`
/// * shareholders: "Anh Thảo" at 25% (dropped on save unless `is_shareholding`)
pub fn bus_input(plate: &str, is_shareholding: bool, share_percentage: f64) -> BusInput {
    BusInput {
        license_plate: plate.to_string(),
        is_partner: false,
        is_shareholding,
        status: BusStatus::Active,
        note: String::new(),
        share_percentage,
        shareholders: vec![ShareholderInput {
            name: "Anh Thảo".to_string(),
            percentage: 25.0,
        }],
    }
}

/// Creates a bus; a shareholding one gets 25% owner and "Anh Thảo" at 25%.
pub async fn create_test_bus(
    db: &DatabaseConnection,
    plate: &str,
    is_shareholding: bool,
) -> Result<BusRecord> {
    let share = if is_shareholding { 25.0 } else { 100.0 };
    bus::create_bus(db, bus_input(plate, is_shareholding, share)).await
}

/// Breakdown with the two route revenues and a total expense, not shared.
pub fn simple_breakdown(
    plate: &str,
    revenue_down: f64,
    revenue_up: f64,
    total_expense: f64,
) -> Breakdown {
    Breakdown {
        revenue_down,
        revenue_up,
        total_expense,
        bus_plate: plate.to_string(),
        ..Default::default()
    }
}

/// Saves a draft, confirming any warnings.
pub async fn save_draft(
    db: &DatabaseConnection,
    draft: TransactionDraft,
) -> Result<transaction_entity::Model> {
    let outcome = transaction::save_transaction(
        db,
        draft,
        SaveOptions {
            confirm_warnings: true,
        },
    )
    .await?;
    Ok(outcome.record.transaction)
}

/// Creates a `VERIFIED` shared-day transaction whose remaining balance equals `amount`.
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    date: NaiveDate,
    plate: &str,
    amount: f64,
) -> Result<transaction_entity::Model> {
    let mut breakdown = simple_breakdown(plate, amount, 0.0, 0.0);
    breakdown.is_shared = true;
    save_draft(db, TransactionDraft::new(date, breakdown)).await
}

/// In-memory bus row.
pub fn bus_model(
    id: i64,
    plate: &str,
    is_shareholding: bool,
    share_percentage: f64,
) -> bus_entity::Model {
    bus_entity::Model {
        id,
        license_plate: plate.to_string(),
        is_partner: false,
        is_shareholding,
        status: BusStatus::Active,
        note: String::new(),
        share_percentage,
    }
}

/// In-memory shareholder row.
pub fn shareholder_model(id: i64, bus_id: i64, name: &str, percentage: f64) -> shareholder::Model {
    shareholder::Model {
        id,
        bus_id,
        name: name.to_string(),
        percentage,
    }
}

/// In-memory `VERIFIED` transaction dated 01/05/2024 with only a remaining balance.
pub fn transaction_model(
    id: i64,
    plate: &str,
    bus_id: Option<i64>,
    remaining_balance: f64,
) -> transaction_entity::Model {
    transaction_entity::Model {
        id,
        date: date(2024, 5, 1),
        payment_month: None,
        revenue_down: 0.0,
        revenue_up: 0.0,
        expense_fuel: 0.0,
        expense_police: 0.0,
        expense_repair: 0.0,
        total_expense: 0.0,
        is_shared: true,
        balance_mode: Some(BalanceMode::Computed),
        manual_balance: 0.0,
        bus_plate: plate.to_string(),
        bus_id,
        partner_bus_plate: String::new(),
        status: TransactionStatus::Verified,
        image_ref: None,
        note: String::new(),
        revenue: remaining_balance,
        shared_expense: 0.0,
        total_balance: remaining_balance,
        split_balance: remaining_balance,
        remaining_balance,
    }
}
