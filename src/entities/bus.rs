//! Bus entity - A vehicle and the ownership unit its transactions are attributed to.
//!
//! The license plate is the key users see and the key transactions carry at the
//! boundary. Shareholders hang off a bus as child rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operational status of a bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusStatus {
    /// In service
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Temporarily off the road
    #[sea_orm(string_value = "MAINTENANCE")]
    Maintenance,
    /// Retired or parked
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
}

impl std::fmt::Display for BusStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Active => "ACTIVE",
            Self::Maintenance => "MAINTENANCE",
            Self::Inactive => "INACTIVE",
        };
        f.write_str(label)
    }
}

/// Bus database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "buses")]
pub struct Model {
    /// Unique identifier for the bus
    #[sea_orm(primary_key)]
    pub id: i64,
    /// License plate, unique and used as the display key
    #[sea_orm(unique)]
    pub license_plate: String,
    /// Whether this bus belongs to a partner operator
    pub is_partner: bool,
    /// Whether the remaining balance is split with shareholders
    pub is_shareholding: bool,
    /// Operational status
    pub status: BusStatus,
    /// Free-text note
    pub note: String,
    /// Owner share in percent (0-100); 100 whenever `is_shareholding` is false
    pub share_percentage: f64,
}

/// Defines relationships between Bus and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One bus has many shareholders
    #[sea_orm(has_many = "super::shareholder::Entity")]
    Shareholders,
    /// One bus has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::shareholder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shareholders.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
