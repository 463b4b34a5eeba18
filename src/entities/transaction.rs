//! Transaction entity - One day's revenue and expense record for one bus.
//!
//! Editable breakdown inputs are stored next to the derived balance fields so that
//! listings and aggregates can read `remaining_balance` without recomputing.
//! Itemized lines live in `transaction_items`. `bus_plate` is the plate string the
//! record was entered with; `bus_id` is the resolved foreign key.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a transaction: `AI_GENERATED -> VERIFIED -> PAID`
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Imported by the extraction pipeline, not yet reviewed
    #[sea_orm(string_value = "AI_GENERATED")]
    AiGenerated,
    /// Reviewed and eligible for a payment cycle
    #[sea_orm(string_value = "VERIFIED")]
    Verified,
    /// Settled as part of a payment cycle
    #[sea_orm(string_value = "PAID")]
    Paid,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AiGenerated => "AI_GENERATED",
            Self::Verified => "VERIFIED",
            Self::Paid => "PAID",
        };
        f.write_str(label)
    }
}

/// How `total_balance` is obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    /// Revenue minus total expense
    #[sea_orm(string_value = "computed")]
    Computed,
    /// Entered directly; only honoured while revenue and expense are both zero
    #[sea_orm(string_value = "manual")]
    Manual,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Day this record covers
    pub date: Date,
    /// Payment cycle id (`YYYY.MM`) once settled
    pub payment_month: Option<String>,
    /// Revenue from the down route
    pub revenue_down: f64,
    /// Revenue from the up route
    pub revenue_up: f64,
    /// Fuel expense
    pub expense_fuel: f64,
    /// Police and toll expense
    pub expense_police: f64,
    /// Repair expense
    pub expense_repair: f64,
    /// Manually entered total expense, authoritative over the itemized fields
    pub total_expense: f64,
    /// Whether the day was run with a second vehicle
    pub is_shared: bool,
    /// Stored balance mode; `None` for records saved before the mode was tracked
    pub balance_mode: Option<BalanceMode>,
    /// Directly entered balance used in manual mode
    pub manual_balance: f64,
    /// Plate of the assigned bus as entered
    pub bus_plate: String,
    /// Resolved bus id
    pub bus_id: Option<i64>,
    /// Plate of the partner bus, empty when none
    pub partner_bus_plate: String,
    pub status: TransactionStatus,
    /// Reference to the uploaded receipt image
    pub image_ref: Option<String>,
    /// Free-text note, may embed the auto-generated item summary
    pub note: String,
    /// Derived: total revenue
    pub revenue: f64,
    /// Derived: shared expense (the manual total expense)
    pub shared_expense: f64,
    /// Derived: total balance
    pub total_balance: f64,
    /// Derived: split balance
    pub split_balance: f64,
    /// Derived: remaining balance after private expenses
    pub remaining_balance: f64,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction may be attributed to one bus
    #[sea_orm(
        belongs_to = "super::bus::Entity",
        from = "Column::BusId",
        to = "super::bus::Column::Id",
        on_delete = "SetNull"
    )]
    Bus,
    /// Each transaction may belong to one payment cycle
    #[sea_orm(
        belongs_to = "super::payment_cycle::Entity",
        from = "Column::PaymentMonth",
        to = "super::payment_cycle::Column::Id"
    )]
    PaymentCycle,
    /// One transaction has many itemized lines
    #[sea_orm(has_many = "super::transaction_item::Entity")]
    Items,
}

impl Related<super::bus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bus.def()
    }
}

impl Related<super::payment_cycle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentCycle.def()
    }
}

impl Related<super::transaction_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
