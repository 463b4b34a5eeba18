//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod bus;
pub mod payment_cycle;
pub mod reconciliation;
pub mod reconciliation_item;
pub mod shareholder;
pub mod transaction;
pub mod transaction_item;

// Re-export specific types to avoid conflicts
pub use bus::{BusStatus, Column as BusColumn, Entity as Bus, Model as BusModel};
pub use payment_cycle::{
    Column as PaymentCycleColumn, Entity as PaymentCycle, Model as PaymentCycleModel,
};
pub use reconciliation::{
    Column as ReconciliationColumn, Entity as Reconciliation, Model as ReconciliationModel,
};
pub use reconciliation_item::{
    AdjustmentKind, Column as ReconciliationItemColumn, Entity as ReconciliationItem,
    Model as ReconciliationItemModel,
};
pub use shareholder::{
    Column as ShareholderColumn, Entity as Shareholder, Model as ShareholderModel,
};
pub use transaction::{
    BalanceMode, Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionStatus,
};
pub use transaction_item::{
    Column as TransactionItemColumn, Entity as TransactionItem, ItemKind,
    Model as TransactionItemModel,
};
