//! Reconciliation item entity - Paid-but-unrecorded amounts and debts/held money.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether an item raises or lowers the adjusted assets
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Already paid out but not yet recorded; added back to assets
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Owed or held for someone else; subtracted from assets
    #[sea_orm(string_value = "debt")]
    Debt,
}

/// Reconciliation item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliation_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning report
    pub reconciliation_id: String,
    pub kind: AdjustmentKind,
    pub position: i32,
    pub description: String,
    pub amount: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reconciliation::Entity",
        from = "Column::ReconciliationId",
        to = "super::reconciliation::Column::Id",
        on_delete = "Cascade"
    )]
    Reconciliation,
}

impl Related<super::reconciliation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reconciliation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
