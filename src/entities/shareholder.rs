//! Shareholder entity - A person holding a percentage cut of one bus.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shareholder database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shareholders")]
pub struct Model {
    /// Unique identifier for the shareholder
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning bus
    pub bus_id: i64,
    /// Display name; aggregation across transactions merges on this
    pub name: String,
    /// Cut in percent (0-100), independent of the other shareholders
    pub percentage: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each shareholder belongs to one bus
    #[sea_orm(
        belongs_to = "super::bus::Entity",
        from = "Column::BusId",
        to = "super::bus::Column::Id",
        on_delete = "Cascade"
    )]
    Bus,
}

impl Related<super::bus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
