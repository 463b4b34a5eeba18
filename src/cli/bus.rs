use super::Context;
use crate::{
    core::{
        bus::{self as bus_core, BusInput},
        distribution::Ownership,
        money::format_percentage,
    },
    errors::Result,
};
use tracing::{info, instrument, warn};

/// Creates the bus, or updates it when the plate is already registered.
#[instrument(skip(ctx, input), fields(plate = %input.license_plate))]
pub async fn add(ctx: &Context<'_>, input: BusInput) -> Result<()> {
    let record = match bus_core::get_bus_by_plate(ctx.db, &input.license_plate).await? {
        Some(existing) => {
            info!("Plate already registered, updating");
            bus_core::update_bus(ctx.db, existing.id, input).await?
        }
        None => bus_core::create_bus(ctx.db, input).await?,
    };

    let ownership = Ownership::from_models(&record.bus, &record.shareholders);
    println!("Saved bus {}", record.bus.license_plate);
    print_ownership(&ownership);
    if let Some(gap) = ownership.allocation_gap() {
        warn!(gap, "Ownership does not add up to 100%");
        println!(
            "Note: owner and shareholder percentages total {}, not 100%",
            format_percentage(ownership.allocation_total())
        );
    }
    Ok(())
}

fn print_ownership(ownership: &Ownership) {
    if !ownership.is_shareholding {
        println!("  Owner: 100%");
        return;
    }
    println!("  Owner: {}", format_percentage(ownership.owner_percentage));
    for stake in &ownership.stakes {
        println!("  {}: {}", stake.name, format_percentage(stake.percentage));
    }
}

pub async fn list(ctx: &Context<'_>) -> Result<()> {
    let buses = bus_core::get_all_buses(ctx.db).await?;
    if buses.is_empty() {
        println!("No buses registered.");
        return Ok(());
    }

    let directory = bus_core::load_ownership_directory(ctx.db).await?;
    for bus in &buses {
        let partner = if bus.is_partner { " | partner" } else { "" };
        println!("{} | {}{partner}", bus.license_plate, bus.status);
        if let Some(ownership) = directory.resolve(Some(bus.id), &bus.license_plate) {
            print_ownership(ownership);
        }
        if !bus.note.is_empty() {
            println!("  Note: {}", bus.note);
        }
    }
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn delete(ctx: &Context<'_>, plate: &str) -> Result<()> {
    let record = bus_core::load_bus(ctx.db, plate).await?;
    bus_core::delete_bus(ctx.db, record.bus.id).await?;
    println!("Deleted bus {}", record.bus.license_plate);
    Ok(())
}
