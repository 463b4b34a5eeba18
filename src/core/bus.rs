//! Bus business logic - Creating, updating and looking up buses and their shareholders.
//!
//! A bus and its shareholders are saved together: every update replaces the whole
//! shareholder list. Saving a non-shareholding bus stores 100% for the owner and
//! drops any shareholders.

use crate::{
    config::settings::BusSeed,
    core::distribution::OwnershipDirectory,
    entities::{Bus, BusStatus, Shareholder, bus, shareholder},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// A shareholder as entered on the bus form.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareholderInput {
    /// Display name
    pub name: String,
    /// Cut in percent (0-100)
    pub percentage: f64,
}

/// Editable fields of a bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusInput {
    /// License plate, required and unique
    pub license_plate: String,
    /// Partner operator flag
    pub is_partner: bool,
    /// Whether shareholders take a cut
    pub is_shareholding: bool,
    /// Operational status
    pub status: BusStatus,
    /// Free-text note
    pub note: String,
    /// Owner cut in percent (0-100)
    pub share_percentage: f64,
    /// Shareholders, ignored unless `is_shareholding`
    pub shareholders: Vec<ShareholderInput>,
}

impl From<&BusSeed> for BusInput {
    fn from(seed: &BusSeed) -> Self {
        Self {
            license_plate: seed.license_plate.clone(),
            is_partner: seed.is_partner,
            is_shareholding: seed.is_shareholding,
            status: BusStatus::Active,
            note: seed.note.clone(),
            share_percentage: seed.share_percentage,
            shareholders: seed
                .shareholders
                .iter()
                .map(|s| ShareholderInput {
                    name: s.name.clone(),
                    percentage: s.percentage,
                })
                .collect(),
        }
    }
}

/// A bus together with its shareholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BusRecord {
    /// The bus row
    pub bus: bus::Model,
    /// Its shareholders, in entry order
    pub shareholders: Vec<shareholder::Model>,
}

fn validate_percentage(percentage: f64) -> Result<()> {
    if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
        return Err(Error::InvalidAmount { amount: percentage });
    }
    Ok(())
}

/// Trims and validates the input, applying the non-shareholding rule.
fn normalize_input(input: BusInput) -> Result<BusInput> {
    let license_plate = input.license_plate.trim().to_string();
    if license_plate.is_empty() {
        return Err(Error::Validation {
            message: "License plate cannot be empty".to_string(),
        });
    }

    if !input.is_shareholding {
        return Ok(BusInput {
            license_plate,
            share_percentage: 100.0,
            shareholders: Vec::new(),
            ..input
        });
    }

    validate_percentage(input.share_percentage)?;
    let mut shareholders = Vec::with_capacity(input.shareholders.len());
    for holder in input.shareholders {
        let name = holder.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation {
                message: "Shareholder name cannot be empty".to_string(),
            });
        }
        validate_percentage(holder.percentage)?;
        shareholders.push(ShareholderInput {
            name,
            percentage: holder.percentage,
        });
    }

    Ok(BusInput {
        license_plate,
        shareholders,
        ..input
    })
}

/// Retrieves all buses ordered by license plate.
pub async fn get_all_buses(db: &DatabaseConnection) -> Result<Vec<bus::Model>> {
    Bus::find()
        .order_by_asc(bus::Column::LicensePlate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a bus by its license plate.
pub async fn get_bus_by_plate<C>(db: &C, plate: &str) -> Result<Option<bus::Model>>
where
    C: ConnectionTrait,
{
    Bus::find()
        .filter(bus::Column::LicensePlate.eq(plate.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the shareholders of one bus in entry order.
pub async fn get_shareholders_for_bus<C>(db: &C, bus_id: i64) -> Result<Vec<shareholder::Model>>
where
    C: ConnectionTrait,
{
    Shareholder::find()
        .filter(shareholder::Column::BusId.eq(bus_id))
        .order_by_asc(shareholder::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads a bus and its shareholders by plate.
pub async fn load_bus(db: &DatabaseConnection, plate: &str) -> Result<BusRecord> {
    let bus = get_bus_by_plate(db, plate)
        .await?
        .ok_or_else(|| Error::BusNotFound {
            plate: plate.to_string(),
        })?;
    let shareholders = get_shareholders_for_bus(db, bus.id).await?;
    Ok(BusRecord { bus, shareholders })
}

/// Loads every bus ownership, in id order, for share distribution.
pub async fn load_ownership_directory<C>(db: &C) -> Result<OwnershipDirectory>
where
    C: ConnectionTrait,
{
    let buses = Bus::find().order_by_asc(bus::Column::Id).all(db).await?;
    let shareholders = Shareholder::find()
        .order_by_asc(shareholder::Column::Id)
        .all(db)
        .await?;
    Ok(OwnershipDirectory::from_models(&buses, &shareholders))
}

async fn replace_shareholders<C>(
    db: &C,
    bus_id: i64,
    shareholders: &[ShareholderInput],
) -> Result<Vec<shareholder::Model>>
where
    C: ConnectionTrait,
{
    Shareholder::delete_many()
        .filter(shareholder::Column::BusId.eq(bus_id))
        .exec(db)
        .await?;

    let mut saved = Vec::with_capacity(shareholders.len());
    for holder in shareholders {
        let model = shareholder::ActiveModel {
            bus_id: Set(bus_id),
            name: Set(holder.name.clone()),
            percentage: Set(holder.percentage),
            ..Default::default()
        }
        .insert(db)
        .await?;
        saved.push(model);
    }
    Ok(saved)
}

/// Creates a bus with its shareholders.
///
/// # Errors
/// Returns an error if the plate is empty or already used, if a percentage is
/// outside 0-100, or if the database write fails.
#[instrument(skip(db, input), fields(plate = %input.license_plate))]
pub async fn create_bus(db: &DatabaseConnection, input: BusInput) -> Result<BusRecord> {
    let input = normalize_input(input)?;

    let txn = db.begin().await?;
    if get_bus_by_plate(&txn, &input.license_plate).await?.is_some() {
        return Err(Error::Validation {
            message: format!("License plate {} is already registered", input.license_plate),
        });
    }

    let bus = bus::ActiveModel {
        license_plate: Set(input.license_plate.clone()),
        is_partner: Set(input.is_partner),
        is_shareholding: Set(input.is_shareholding),
        status: Set(input.status),
        note: Set(input.note.clone()),
        share_percentage: Set(input.share_percentage),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let shareholders = replace_shareholders(&txn, bus.id, &input.shareholders).await?;
    txn.commit().await?;

    info!(bus_id = bus.id, "Bus created");
    Ok(BusRecord { bus, shareholders })
}

/// Replaces every editable field of a bus, including its shareholder list.
///
/// # Errors
/// Returns an error if the bus does not exist, the new plate belongs to another
/// bus, a percentage is out of range, or the database write fails.
#[instrument(skip(db, input))]
pub async fn update_bus(db: &DatabaseConnection, bus_id: i64, input: BusInput) -> Result<BusRecord> {
    let input = normalize_input(input)?;

    let txn = db.begin().await?;
    let existing = Bus::find_by_id(bus_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::BusNotFound {
            plate: bus_id.to_string(),
        })?;

    if let Some(other) = get_bus_by_plate(&txn, &input.license_plate).await? {
        if other.id != bus_id {
            return Err(Error::Validation {
                message: format!("License plate {} is already registered", input.license_plate),
            });
        }
    }

    let mut active: bus::ActiveModel = existing.into();
    active.license_plate = Set(input.license_plate.clone());
    active.is_partner = Set(input.is_partner);
    active.is_shareholding = Set(input.is_shareholding);
    active.status = Set(input.status);
    active.note = Set(input.note.clone());
    active.share_percentage = Set(input.share_percentage);
    let bus = active.update(&txn).await?;

    let shareholders = replace_shareholders(&txn, bus.id, &input.shareholders).await?;
    txn.commit().await?;

    info!("Bus updated");
    Ok(BusRecord { bus, shareholders })
}

/// Deletes a bus and its shareholders. Transactions keep their plate string and
/// lose the resolved bus id.
#[instrument(skip(db))]
pub async fn delete_bus(db: &DatabaseConnection, bus_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let existing = Bus::find_by_id(bus_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::BusNotFound {
            plate: bus_id.to_string(),
        })?;

    Shareholder::delete_many()
        .filter(shareholder::Column::BusId.eq(bus_id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;
    txn.commit().await?;

    info!("Bus deleted");
    Ok(())
}

/// Inserts seeded buses whose plate is not registered yet.
///
/// Returns how many buses were created.
pub async fn seed_buses(db: &DatabaseConnection, seeds: &[BusSeed]) -> Result<usize> {
    let mut created = 0;
    for seed in seeds {
        if get_bus_by_plate(db, &seed.license_plate).await?.is_some() {
            continue;
        }
        create_bus(db, BusInput::from(seed)).await?;
        created += 1;
    }
    if created > 0 {
        info!("Seeded {} buses from configuration", created);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::config::settings::ShareholderSeed;
    use crate::test_utils::*;

    #[test]
    fn test_normalize_rejects_empty_plate() {
        let mut input = bus_input("  ", true, 25.0);
        input.shareholders.clear();
        assert!(matches!(
            normalize_input(input),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_out_of_range_percentages() {
        let input = bus_input("51B-123.45", true, 120.0);
        assert!(matches!(
            normalize_input(input),
            Err(Error::InvalidAmount { amount }) if amount == 120.0
        ));

        let mut input = bus_input("51B-123.45", true, 25.0);
        input.shareholders.push(ShareholderInput {
            name: "Chị Lan".to_string(),
            percentage: f64::NAN,
        });
        assert!(matches!(
            normalize_input(input),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_normalize_clears_non_shareholding_config() {
        let mut input = bus_input(" 29A-999.99 ", false, 40.0);
        input.shareholders.push(ShareholderInput {
            name: "Ghost".to_string(),
            percentage: 500.0,
        });
        let normalized = normalize_input(input).unwrap();
        assert_eq!(normalized.license_plate, "29A-999.99");
        assert_eq!(normalized.share_percentage, 100.0);
        assert!(normalized.shareholders.is_empty());
    }

    #[tokio::test]
    async fn test_create_and_load_bus() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_bus(&db, bus_input("51B-123.45", true, 25.0)).await?;

        assert_eq!(created.bus.license_plate, "51B-123.45");
        assert_eq!(created.shareholders.len(), 1);

        let loaded = load_bus(&db, "51B-123.45").await?;
        assert_eq!(loaded, created);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_bus_duplicate_plate() -> Result<()> {
        let db = setup_test_db().await?;
        create_bus(&db, bus_input("51B-123.45", false, 100.0)).await?;

        let result = create_bus(&db, bus_input("51B-123.45", false, 100.0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_bus_replaces_shareholders() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_bus(&db, bus_input("51B-123.45", true, 25.0)).await?;

        let mut input = bus_input("51B-123.45", true, 50.0);
        input.shareholders = vec![
            ShareholderInput {
                name: "Chị Lan".to_string(),
                percentage: 30.0,
            },
            ShareholderInput {
                name: "Anh Tuấn".to_string(),
                percentage: 20.0,
            },
        ];
        let updated = update_bus(&db, created.bus.id, input).await?;

        assert_eq!(updated.bus.share_percentage, 50.0);
        let names: Vec<&str> = updated.shareholders.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Chị Lan", "Anh Tuấn"]);
        assert_eq!(get_shareholders_for_bus(&db, created.bus.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_bus_to_non_shareholding_drops_shareholders() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_bus(&db, bus_input("51B-123.45", true, 25.0)).await?;

        let updated = update_bus(&db, created.bus.id, bus_input("51B-123.45", false, 25.0)).await?;
        assert!(!updated.bus.is_shareholding);
        assert_eq!(updated.bus.share_percentage, 100.0);
        assert!(get_shareholders_for_bus(&db, created.bus.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_bus() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_bus(&db, bus_input("51B-123.45", true, 25.0)).await?;

        delete_bus(&db, created.bus.id).await?;
        assert!(get_bus_by_plate(&db, "51B-123.45").await?.is_none());
        assert!(Shareholder::find().all(&db).await?.is_empty());

        let result = delete_bus(&db, created.bus.id).await;
        assert!(matches!(result, Err(Error::BusNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_buses_skips_existing() -> Result<()> {
        let db = setup_test_db().await?;
        create_bus(&db, bus_input("51B-123.45", false, 100.0)).await?;

        let seeds = vec![
            BusSeed {
                license_plate: "51B-123.45".to_string(),
                is_partner: false,
                is_shareholding: true,
                share_percentage: 25.0,
                note: String::new(),
                shareholders: vec![],
            },
            BusSeed {
                license_plate: "29A-999.99".to_string(),
                is_partner: true,
                is_shareholding: true,
                share_percentage: 60.0,
                note: String::new(),
                shareholders: vec![ShareholderSeed {
                    name: "Anh Thảo".to_string(),
                    percentage: 40.0,
                }],
            },
        ];

        assert_eq!(seed_buses(&db, &seeds).await?, 1);
        assert_eq!(seed_buses(&db, &seeds).await?, 0);

        let existing = load_bus(&db, "51B-123.45").await?;
        assert!(!existing.bus.is_shareholding);
        let seeded = load_bus(&db, "29A-999.99").await?;
        assert!(seeded.bus.is_partner);
        assert_eq!(seeded.shareholders[0].percentage, 40.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_ownership_directory() -> Result<()> {
        let db = setup_test_db().await?;
        create_bus(&db, bus_input("29A-999.99", false, 100.0)).await?;
        create_bus(&db, bus_input("51B-123.45", true, 25.0)).await?;

        let directory = load_ownership_directory(&db).await?;
        assert_eq!(directory.ownerships().len(), 2);
        let main = directory.main_shareholding().unwrap();
        assert_eq!(main.license_plate, "51B-123.45");
        assert_eq!(main.stakes[0].name, "Anh Thảo");
        Ok(())
    }
}
