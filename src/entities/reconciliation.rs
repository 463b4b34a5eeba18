//! Reconciliation entity - Monthly snapshot of real holdings, keyed `recon_MM_YYYY`.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reconciliation report database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliations")]
pub struct Model {
    /// Report id in `recon_MM_YYYY` form
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub month: u32,
    pub year: i32,
    /// Cash held at the storage location
    pub cash_storage: f64,
    /// Cash carried in the wallet
    pub cash_wallet: f64,
    /// Bank account balance
    pub bank_account: f64,
    /// Money already settled and counted elsewhere
    pub existing_money: f64,
    /// Last time the report was saved
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Reconciliation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One report has many paid or debt items
    #[sea_orm(has_many = "super::reconciliation_item::Entity")]
    Items,
}

impl Related<super::reconciliation_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
