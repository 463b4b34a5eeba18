use bus_ledger::{
    cli::{self, Cli, Context},
    config::{database, settings},
    core::bus::seed_buses,
    errors::Result,
};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible); stdout is for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file; env vars can be set externally
    dotenv().ok();

    // 3. Parse arguments before touching the database so --help stays cheap
    let cli = Cli::parse();

    // 4. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 5. Open the database and make sure every table exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to open database: {}", e))?;
    database::create_tables(&db).await?;
    info!("Database ready");

    // 6. Seed buses from configuration (existing plates are left alone)
    seed_buses(&db, &app_config.buses)
        .await
        .inspect_err(|e| error!("Failed to seed buses: {}", e))?;

    // 7. Run the command
    let ctx = Context {
        db: &db,
        config: &app_config,
    };
    cli::run(cli.command, &ctx)
        .await
        .inspect_err(|e| error!("Command failed: {}", e))
}
