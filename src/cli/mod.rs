//! Command line surface: argument definitions and dispatch.
//!
//! Handlers validate arguments, call into `core` and print the result. All amounts
//! are entered and shown in thousands.

/// `bus` subcommands
pub mod bus;
/// `cycle` subcommands
pub mod cycle;
/// `recon` subcommands
pub mod reconciliation;
/// `tx` subcommands
pub mod transaction;

use crate::{
    config::settings::AppConfig,
    core::{balance::LineItem, bus::ShareholderInput, money, transaction::parse_date},
    entities::BusStatus,
    errors::Result,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sea_orm::DatabaseConnection;

/// Shared state handed to every handler.
pub struct Context<'a> {
    /// Database handle
    pub db: &'a DatabaseConnection,
    /// Loaded settings
    pub config: &'a AppConfig,
}

impl Context<'_> {
    /// Formats an amount with the configured thousands separator.
    #[must_use]
    pub fn amount(&self, value: f64) -> String {
        money::format_amount_with(value, self.config.display.thousands_separator)
    }
}

/// A calendar month given as `MM/YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

fn parse_period(text: &str) -> std::result::Result<Period, String> {
    let (month, year) = text
        .trim()
        .split_once('/')
        .ok_or_else(|| format!("expected MM/YYYY, got '{text}'"))?;
    let month: u32 = month.parse().map_err(|_| format!("invalid month '{month}'"))?;
    let year: i32 = year.parse().map_err(|_| format!("invalid year '{year}'"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month must be 1-12, got {month}"));
    }
    Ok(Period { month, year })
}

fn parse_day(text: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(text).map_err(|e| e.to_string())
}

/// Parses `description=amount`.
fn parse_item(text: &str) -> std::result::Result<LineItem, String> {
    let (description, amount) = text
        .rsplit_once('=')
        .ok_or_else(|| format!("expected description=amount, got '{text}'"))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount '{amount}'"))?;
    Ok(LineItem::new(description.trim(), amount))
}

/// Parses `name=percentage`.
fn parse_holder(text: &str) -> std::result::Result<ShareholderInput, String> {
    let item = parse_item(text)?;
    Ok(ShareholderInput {
        name: item.description,
        percentage: item.amount,
    })
}

fn parse_status(text: &str) -> std::result::Result<BusStatus, String> {
    match text.trim().to_ascii_uppercase().as_str() {
        "ACTIVE" => Ok(BusStatus::Active),
        "MAINTENANCE" => Ok(BusStatus::Maintenance),
        "INACTIVE" => Ok(BusStatus::Inactive),
        other => Err(format!("unknown status '{other}'")),
    }
}

#[derive(Parser)]
#[command(
    name = "bus-ledger",
    version,
    about = "Bookkeeping for bus revenue, shareholder payouts and cash reconciliation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage buses and their shareholders.
    Bus {
        #[command(subcommand)]
        command: BusCommands,
    },
    /// Record and edit daily transactions.
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },
    /// Manage monthly payment cycles.
    Cycle {
        #[command(subcommand)]
        command: CycleCommands,
    },
    /// Monthly cash reconciliation.
    Recon {
        #[command(subcommand)]
        command: ReconCommands,
    },
}

#[derive(Subcommand)]
pub enum BusCommands {
    /// Add a bus, or replace the settings of an existing plate.
    Add {
        /// License plate
        plate: String,
        /// Partner operator
        #[arg(long)]
        partner: bool,
        /// Split the remaining balance with shareholders
        #[arg(long)]
        shareholding: bool,
        /// Owner cut in percent (shareholding buses only)
        #[arg(long = "owner-percent", default_value = "100")]
        owner_percent: f64,
        /// Shareholder as name=percent; repeatable
        #[arg(long = "holder", value_parser = parse_holder)]
        holders: Vec<ShareholderInput>,
        /// ACTIVE, MAINTENANCE or INACTIVE
        #[arg(long, value_parser = parse_status, default_value = "ACTIVE")]
        status: BusStatus,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// List all buses.
    List,
    /// Delete a bus and its shareholders.
    Delete {
        /// License plate
        plate: String,
    },
}

/// Breakdown fields; on edit only the given ones change.
#[derive(Args, Debug, Default)]
pub struct BreakdownArgs {
    /// Bus plate
    #[arg(long)]
    pub plate: Option<String>,
    /// Partner bus plate
    #[arg(long)]
    pub partner_plate: Option<String>,
    #[arg(long)]
    pub revenue_down: Option<f64>,
    #[arg(long)]
    pub revenue_up: Option<f64>,
    #[arg(long)]
    pub fuel: Option<f64>,
    #[arg(long)]
    pub police: Option<f64>,
    #[arg(long)]
    pub repair: Option<f64>,
    /// Total expense ("chi chung"), authoritative over the itemized fields
    #[arg(long)]
    pub total_expense: Option<f64>,
    /// Whether the day was run with a second vehicle
    #[arg(long)]
    pub shared: Option<bool>,
    /// Directly entered balance; only used while revenue and expense are zero
    #[arg(long)]
    pub manual_balance: Option<f64>,
    /// Other revenue as description=amount; repeatable, replaces the list
    #[arg(long = "revenue-item", value_parser = parse_item)]
    pub revenue_items: Vec<LineItem>,
    /// Other expense as description=amount; repeatable, replaces the list
    #[arg(long = "expense-item", value_parser = parse_item)]
    pub expense_items: Vec<LineItem>,
    /// Private expense as description=amount; repeatable, replaces the list
    #[arg(long = "private-item", value_parser = parse_item)]
    pub private_items: Vec<LineItem>,
    /// Drop all itemized lines before applying the given ones
    #[arg(long)]
    pub clear_items: bool,
    /// Free-text note
    #[arg(long)]
    pub note: Option<String>,
    /// Receipt image reference
    #[arg(long)]
    pub image: Option<String>,
    /// Save despite warnings
    #[arg(long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a new day.
    Add {
        /// Date as DD/MM/YYYY
        #[arg(value_parser = parse_day)]
        date: NaiveDate,
        /// Mark as imported and not yet reviewed
        #[arg(long)]
        ai: bool,
        #[command(flatten)]
        fields: BreakdownArgs,
    },
    /// Edit an existing record.
    Edit {
        /// Transaction id
        id: i64,
        /// Move the record to another date (DD/MM/YYYY)
        #[arg(long, value_parser = parse_day)]
        date: Option<NaiveDate>,
        #[command(flatten)]
        fields: BreakdownArgs,
    },
    /// Show one record with its balances and split.
    Show {
        /// Transaction id
        id: i64,
    },
    /// List records of a month, or the unpaid ones.
    List {
        /// Month as MM/YYYY
        #[arg(long, value_parser = parse_period)]
        month: Option<Period>,
        /// Only verified records not in a cycle
        #[arg(long)]
        unpaid: bool,
    },
    /// Delete a record that is not paid.
    Delete {
        /// Transaction id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CycleCommands {
    /// Create the cycle for a month from unpaid transactions.
    Create {
        /// Month as MM/YYYY
        #[arg(value_parser = parse_period)]
        month: Period,
        /// Member transaction ids, comma separated
        #[arg(long = "tx", value_delimiter = ',', required = true)]
        transactions: Vec<i64>,
        /// Settled amount; defaults to the rounded total remaining balance
        #[arg(long)]
        total: Option<f64>,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Replace the members, total and note of a cycle.
    Update {
        /// Cycle id (YYYY.MM)
        id: String,
        /// Member transaction ids, comma separated; current members kept when omitted
        #[arg(long = "tx", value_delimiter = ',')]
        transactions: Option<Vec<i64>>,
        /// Settled amount; defaults to the rounded total remaining balance
        #[arg(long)]
        total: Option<f64>,
        /// New note; kept when omitted
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a cycle and revert its members to verified.
    Delete {
        /// Cycle id (YYYY.MM)
        id: String,
    },
    /// List cycles, most recent first.
    List,
    /// Show a cycle with its distribution.
    Show {
        /// Cycle id (YYYY.MM)
        id: String,
    },
    /// Export a cycle report as CSV.
    Export {
        /// Cycle id (YYYY.MM)
        id: String,
        /// Output path (default: cycle_<id>.csv)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Show the reconciliation of a month.
    Show {
        /// Month as MM/YYYY
        #[arg(value_parser = parse_period)]
        month: Period,
    },
    /// Update and save the holdings of a month.
    Set {
        /// Month as MM/YYYY
        #[arg(value_parser = parse_period)]
        month: Period,
        #[arg(long)]
        cash_storage: Option<f64>,
        #[arg(long)]
        cash_wallet: Option<f64>,
        #[arg(long)]
        bank: Option<f64>,
        /// Money already settled and counted elsewhere
        #[arg(long)]
        existing: Option<f64>,
        /// Paid but unrecorded, as description=amount; repeatable, replaces the list
        #[arg(long = "paid-item", value_parser = parse_item)]
        paid_items: Vec<LineItem>,
        /// Debt or held money, as description=amount; repeatable, replaces the list
        #[arg(long = "debt-item", value_parser = parse_item)]
        debt_items: Vec<LineItem>,
        /// Drop all paid and debt items before applying the given ones
        #[arg(long)]
        clear_items: bool,
    },
}

/// Runs one parsed command.
pub async fn run(command: Commands, ctx: &Context<'_>) -> Result<()> {
    match command {
        Commands::Bus { command } => match command {
            BusCommands::Add {
                plate,
                partner,
                shareholding,
                owner_percent,
                holders,
                status,
                note,
            } => {
                let input = crate::core::bus::BusInput {
                    license_plate: plate,
                    is_partner: partner,
                    is_shareholding: shareholding,
                    status,
                    note,
                    share_percentage: owner_percent,
                    shareholders: holders,
                };
                bus::add(ctx, input).await
            }
            BusCommands::List => bus::list(ctx).await,
            BusCommands::Delete { plate } => bus::delete(ctx, &plate).await,
        },
        Commands::Tx { command } => match command {
            TxCommands::Add { date, ai, fields } => transaction::add(ctx, date, ai, fields).await,
            TxCommands::Edit { id, date, fields } => transaction::edit(ctx, id, date, fields).await,
            TxCommands::Show { id } => transaction::show(ctx, id).await,
            TxCommands::List { month, unpaid } => transaction::list(ctx, month, unpaid).await,
            TxCommands::Delete { id } => transaction::delete(ctx, id).await,
        },
        Commands::Cycle { command } => match command {
            CycleCommands::Create {
                month,
                transactions,
                total,
                note,
            } => cycle::create(ctx, month, transactions, total, note).await,
            CycleCommands::Update {
                id,
                transactions,
                total,
                note,
            } => cycle::update(ctx, &id, transactions, total, note).await,
            CycleCommands::Delete { id } => cycle::delete(ctx, &id).await,
            CycleCommands::List => cycle::list(ctx).await,
            CycleCommands::Show { id } => cycle::show(ctx, &id).await,
            CycleCommands::Export { id, output } => cycle::export(ctx, &id, output).await,
        },
        Commands::Recon { command } => match command {
            ReconCommands::Show { month } => reconciliation::show(ctx, month).await,
            ReconCommands::Set {
                month,
                cash_storage,
                cash_wallet,
                bank,
                existing,
                paid_items,
                debt_items,
                clear_items,
            } => {
                let update = reconciliation::HoldingsUpdate {
                    cash_storage,
                    cash_wallet,
                    bank_account: bank,
                    existing_money: existing,
                    paid_items,
                    debt_items,
                    clear_items,
                };
                reconciliation::set(ctx, month, update).await
            }
        },
    }
}
