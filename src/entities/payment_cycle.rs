//! Payment cycle entity - A monthly settlement batch keyed `YYYY.MM`.
//!
//! Membership is not stored on the cycle row: a transaction belongs to a cycle
//! when its `payment_month` equals the cycle id.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment cycle database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_cycles")]
pub struct Model {
    /// Cycle id in `YYYY.MM` form, one per calendar month
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// When the cycle was created
    pub created_at: DateTimeUtc,
    /// Total settled amount, in thousands
    pub total_amount: f64,
    /// Free-text note
    pub note: String,
}

/// Defines relationships between `PaymentCycle` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One cycle settles many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
