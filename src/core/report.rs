//! Cycle report generation and CSV export.
//!
//! Rows and totals are built from the same distribution functions used by cycle
//! summaries, so exported figures always match what the summary shows. Amounts are
//! rounded half-up only when written out.

use crate::{
    core::{
        bus::load_ownership_directory,
        cycle::get_cycle_members,
        distribution::{Distribution, OwnershipDirectory, aggregate_transactions, distribute_transaction},
        money,
        transaction::format_date,
    },
    entities::{PaymentCycle, transaction},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::collections::BTreeSet;
use std::io;
use tracing::{debug, instrument};

/// One member transaction of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Transaction id
    pub transaction_id: i64,
    /// Day of the record
    pub date: NaiveDate,
    /// Plate as entered
    pub bus_plate: String,
    /// Remaining balance, unrounded
    pub remaining_balance: f64,
    /// Split of the remaining balance, unrounded
    pub distribution: Distribution,
}

/// A cycle's rows and totals.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Cycle id (`YYYY.MM`)
    pub cycle_id: String,
    /// One row per member transaction, by date
    pub rows: Vec<ReportRow>,
    /// Every shareholder name appearing in any row, sorted
    pub shareholder_names: Vec<String>,
    /// Σ remaining balance
    pub total_remaining: f64,
    /// Aggregated split over all rows
    pub total: Distribution,
}

/// Builds a report from already loaded transactions.
#[must_use]
pub fn build_cycle_report(
    cycle_id: &str,
    transactions: &[transaction::Model],
    directory: &OwnershipDirectory,
) -> CycleReport {
    let rows: Vec<ReportRow> = transactions
        .iter()
        .map(|t| ReportRow {
            transaction_id: t.id,
            date: t.date,
            bus_plate: t.bus_plate.clone(),
            remaining_balance: t.remaining_balance,
            distribution: distribute_transaction(t, directory),
        })
        .collect();

    let shareholder_names: BTreeSet<String> = rows
        .iter()
        .flat_map(|row| row.distribution.shareholder_shares.keys().cloned())
        .collect();

    CycleReport {
        cycle_id: cycle_id.to_string(),
        total_remaining: money::sum(rows.iter().map(|row| row.remaining_balance)),
        total: aggregate_transactions(transactions, directory),
        shareholder_names: shareholder_names.into_iter().collect(),
        rows,
    }
}

fn rounded_cell(value: f64) -> String {
    format!("{}", money::round_half_up(value))
}

impl CycleReport {
    fn amount_cells(&self, remaining: f64, distribution: &Distribution) -> Vec<String> {
        let mut cells = vec![rounded_cell(remaining), rounded_cell(distribution.owner_share)];
        cells.extend(self.shareholder_names.iter().map(|name| {
            rounded_cell(
                distribution
                    .shareholder_shares
                    .get(name)
                    .copied()
                    .unwrap_or(0.0),
            )
        }));
        cells
    }

    /// Writes the report as CSV: a header, one row per transaction and a total row.
    ///
    /// The total row is rounded from the unrounded aggregate, not summed from the
    /// rounded rows.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![
            "Date".to_string(),
            "Plate".to_string(),
            "Remaining".to_string(),
            "Owner".to_string(),
        ];
        header.extend(self.shareholder_names.iter().cloned());
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![format_date(row.date), row.bus_plate.clone()];
            record.extend(self.amount_cells(row.remaining_balance, &row.distribution));
            csv_writer.write_record(&record)?;
        }

        let mut total = vec!["Total".to_string(), String::new()];
        total.extend(self.amount_cells(self.total_remaining, &self.total));
        csv_writer.write_record(&total)?;

        csv_writer.flush()?;
        Ok(())
    }
}

/// Loads a cycle's members and builds its report.
///
/// # Errors
/// Returns [`Error::CycleNotFound`] when the cycle does not exist.
#[instrument(skip(db))]
pub async fn generate_cycle_report(db: &DatabaseConnection, cycle_id: &str) -> Result<CycleReport> {
    PaymentCycle::find_by_id(cycle_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::CycleNotFound {
            cycle_id: cycle_id.to_string(),
        })?;

    let members = get_cycle_members(db, cycle_id).await?;
    let directory = load_ownership_directory(db).await?;
    debug!(rows = members.len(), "Building cycle report");
    Ok(build_cycle_report(cycle_id, &members, &directory))
}

/// Multi-line text of a distribution: owner, each shareholder, then the total.
#[must_use]
pub fn format_distribution_summary(distribution: &Distribution, separator: char) -> String {
    let mut lines = vec![format!(
        "Owner: {}",
        money::format_amount_with(distribution.owner_share, separator)
    )];
    lines.extend(distribution.shareholder_shares.iter().map(|(name, share)| {
        format!("{name}: {}", money::format_amount_with(*share, separator))
    }));
    lines.push(format!(
        "Total distributed: {}",
        money::format_amount_with(distribution.total_distributed(), separator)
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::cycle::{CycleInput, create_cycle};
    use crate::core::distribution::Ownership;
    use crate::test_utils::*;

    fn directory() -> OwnershipDirectory {
        let bus = bus_model(1, "51B-123.45", true, 25.0);
        let holders = vec![shareholder_model(1, 1, "Anh Thảo", 25.0)];
        OwnershipDirectory::new([Ownership::from_models(&bus, &holders)])
    }

    #[test]
    fn test_build_report_rows_and_totals() {
        let transactions = vec![
            transaction_model(1, "51B-123.45", Some(1), 1000.0),
            transaction_model(2, "99Z-000.00", None, 301.0),
        ];
        let report = build_cycle_report("2024.05", &transactions, &directory());

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.shareholder_names, vec!["Anh Thảo".to_string()]);
        assert_eq!(report.rows[0].distribution.owner_share, 250.0);
        assert!(report.rows[1].distribution.shareholder_shares.is_empty());
        assert_eq!(report.total_remaining, 1301.0);
        assert_eq!(report.total.owner_share, 551.0);
    }

    #[test]
    fn test_write_csv_rounds_only_at_output() {
        let transactions = vec![
            transaction_model(1, "51B-123.45", Some(1), 2.0),
            transaction_model(2, "51B-123.45", Some(1), 2.0),
        ];
        let report = build_cycle_report("2024.05", &transactions, &directory());

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Date,Plate,Remaining,Owner,Anh Thảo");
        // 0.5 per row rounds up to 1; the total rounds 1.0, not 1 + 1
        assert_eq!(lines[1], "01/05/2024,51B-123.45,2,1,1");
        assert_eq!(lines[3], "Total,,4,1,1");
    }

    #[test]
    fn test_format_distribution_summary() {
        let transactions = vec![transaction_model(1, "51B-123.45", Some(1), 13_400.0)];
        let report = build_cycle_report("2024.05", &transactions, &directory());

        assert_eq!(
            format_distribution_summary(&report.total, ','),
            "Owner: 3,350\nAnh Thảo: 3,350\nTotal distributed: 6,700"
        );
    }

    #[tokio::test]
    async fn test_generate_cycle_report() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_bus(&db, "51B-123.45", true).await?;
        let a = create_test_transaction(&db, date(2024, 5, 1), "51B-123.45", 1000.0).await?;
        create_cycle(
            &db,
            2024,
            5,
            CycleInput {
                transaction_ids: vec![a.id],
                total_amount: 500.0,
                note: String::new(),
            },
        )
        .await?;

        let report = generate_cycle_report(&db, "2024.05").await?;
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.total.shareholder_shares["Anh Thảo"], 250.0);

        assert!(matches!(
            generate_cycle_report(&db, "2023.01").await,
            Err(Error::CycleNotFound { .. })
        ));
        Ok(())
    }
}
