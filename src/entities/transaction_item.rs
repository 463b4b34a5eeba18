//! Transaction item entity - Named revenue, expense and private expense lines.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which list of the breakdown a line belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Other revenue
    #[sea_orm(string_value = "revenue")]
    Revenue,
    /// Other shared expense
    #[sea_orm(string_value = "expense")]
    Expense,
    /// Private expense deducted after the split
    #[sea_orm(string_value = "private")]
    Private,
}

/// Transaction item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning transaction
    pub transaction_id: i64,
    pub kind: ItemKind,
    /// Order within its list
    pub position: i32,
    pub description: String,
    pub amount: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
