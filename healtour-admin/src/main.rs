use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use clap::{Parser, Subcommand};
use healtour_catalog::CatalogFilters;
use healtour_store::app_config::Config;
use healtour_store::memory::MemoryUserDirectory;
use healtour_store::seed::{load_seed_file, seed_catalog};
use healtour_store::{AppContext, DbClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "healtour-admin", about = "Administrative tasks for the Healtour reservation store", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Insert catalog packages from a JSON seed file
    Seed {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List packages, including retired ones
    Packages {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Print the business rules in effect after database overrides
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healtour=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;

    if let Command::Migrate = cli.command {
        db.migrate().await.context("Migration failed")?;
        return Ok(());
    }

    // accounts live in the identity service; the admin tool books nothing
    let ctx = AppContext::from_db(&db, &config, Arc::new(MemoryUserDirectory::new()))
        .await
        .context("Failed to wire the reservation core")?;

    match cli.command {
        Command::Migrate => {}
        Command::Seed { file } => {
            let seeds = load_seed_file(&file).await?;
            tracing::info!("Seeding {} packages from {}", seeds.len(), file.display());
            let report = seed_catalog(ctx.repositories.packages.as_ref(), seeds, &ctx.rules.default_currency).await?;
            println!("inserted {}, skipped {}", report.inserted, report.skipped);
        }
        Command::Packages { search, location, page } => {
            let filters = CatalogFilters {
                search,
                location,
                page: Some(page),
                ..CatalogFilters::default()
            };
            let result = ctx.listing.list_admin(&filters).await?;
            for package in &result.items {
                println!(
                    "{}  {:<40} {}, {}  {}/{} booked  active={}",
                    package.id,
                    package.title,
                    package.location.city,
                    package.location.country,
                    package.capacity.current_bookings,
                    package.capacity.max_capacity,
                    package.is_active
                );
            }
            println!("page {} of {} ({} packages)", result.page, result.total_pages(), result.total);
        }
        Command::Rules => {
            println!("{:#?}", ctx.rules);
        }
    }

    Ok(())
}
