//! Framework-agnostic business logic. Pure calculators take loaded entities;
//! orchestration functions take the database handle explicitly.

/// Bus and shareholder management
pub mod bus;
/// Transaction balance calculator
pub mod balance;
/// Payment cycles and the transaction status lifecycle
pub mod cycle;
/// Share distribution engine
pub mod distribution;
/// Rounding and formatting of amounts in thousands
pub mod money;
/// Monthly cash reconciliation
pub mod reconciliation;
/// Cycle reports and CSV export
pub mod report;
/// Saving, loading and deleting daily transactions
pub mod transaction;
