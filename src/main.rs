use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use inventory_scraper::db::{self, VehicleSink};
use inventory_scraper::render::{Fetcher, HttpFetcher, SnapshotRenderer, SpiderFetcher};
use inventory_scraper::{finalize, Pipeline, Settings};

#[derive(Parser)]
#[command(name = "inventory_scraper", about = "Dealer inventory scraper")]
struct Cli {
    /// How pages are fetched
    #[arg(long, value_enum, default_value_t = Backend::Http, global = true)]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Plain HTTP
    Http,
    /// spider.cloud (needs SPIDER_API_KEY)
    Spider,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover listing URLs and print them
    Discover,
    /// Discover, visit every listing, and store the batch
    Run {
        /// Max listings to visit (default: all discovered)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print the batch as JSON instead of storing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Stored vehicles table
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show store statistics
    Stats,
    /// Delete every stored vehicle
    Purge {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

type Session = SnapshotRenderer<Fetcher>;

fn renderer(backend: Backend, settings: &Settings) -> anyhow::Result<Session> {
    let fetcher = match backend {
        Backend::Http => Fetcher::Http(HttpFetcher::new(settings.entry_timeout())?),
        Backend::Spider => Fetcher::Spider(SpiderFetcher::from_env()?),
    };
    Ok(SnapshotRenderer::new(fetcher, settings.detail_timeout()))
}

fn pipeline(backend: Backend, settings: Settings) -> anyhow::Result<Pipeline<Session>> {
    let session = renderer(backend, &settings)?;
    Pipeline::new(session, settings).context("building field table")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("loading INVENTORY_* settings")?;
    info!(entry = %settings.entry_url, "Settings loaded");

    let result = match cli.command {
        Commands::Discover => {
            let mut pipeline = pipeline(cli.backend, settings)?;
            let discovery = pipeline.discover().await?;
            for id in &discovery.listings {
                println!("{}", id);
            }
            println!(
                "\n{} listings ({} expansions, {:?})",
                discovery.listings.len(),
                discovery.expansions,
                discovery.reason
            );
            Ok(())
        }
        Commands::Run { limit, dry_run } => {
            let db_path = settings.db_path.clone();
            let mut pipeline = pipeline(cli.backend, settings)?;

            let t_discover = Instant::now();
            let discovery = pipeline.discover().await?;
            println!(
                "Discovered {} listings in {:.1}s",
                discovery.listings.len(),
                t_discover.elapsed().as_secs_f64()
            );
            if discovery.listings.is_empty() {
                println!("No listings found. Check the entry URL and listing selector.");
                return Ok(());
            }

            let take = limit.unwrap_or(discovery.listings.len());
            println!("Visiting {} listings...", take.min(discovery.listings.len()));
            let records = pipeline
                .fetch_all(discovery.listings.iter().take(take))
                .await;
            let stats = pipeline.stats();
            let batch = finalize(records);

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                let conn = db::connect(&db_path)?;
                db::init_schema(&conn)?;
                let written = conn.upsert(&batch)?;
                println!("Stored {} vehicles in {}", written, db_path);
            }
            println!(
                "Visited {} ({} kept, {} degraded, {} dropped), {} after dedup",
                stats.visited,
                stats.kept,
                stats.degraded,
                stats.dropped,
                batch.len()
            );
            Ok(())
        }
        Commands::List { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_vehicles(&conn, limit)?;
            if rows.is_empty() {
                println!("No vehicles stored. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<36} | {:>4} | {:>9} | {:>8} | {:<10} | {:<17}",
                "#", "Title", "Year", "Price", "Km", "Trim", "VIN"
            );
            println!("{}", "-".repeat(104));

            for (i, r) in rows.iter().enumerate() {
                let title = truncate(r.title.as_deref().unwrap_or("-"), 36);
                let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into());
                let price = r.price.map(|p| format!("{:.0}", p)).unwrap_or_else(|| "-".into());
                let km = r.mileage.map(|m| format!("{:.0}", m)).unwrap_or_else(|| "-".into());
                let trim = r.trim.map(|t| t.to_string()).unwrap_or_else(|| "-".into());

                println!(
                    "{:>3} | {:<36} | {:>4} | {:>9} | {:>8} | {:<10} | {:<17}",
                    i + 1,
                    title,
                    year,
                    price,
                    km,
                    trim,
                    r.vin.as_deref().unwrap_or("-")
                );
            }

            println!("\n{} vehicles", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Vehicles:     {}", s.total);
            println!("With price:   {}", s.with_price);
            println!("With VIN:     {}", s.with_vin);
            match s.avg_price {
                Some(avg) => println!("Avg price:    {:.0}", avg),
                None => println!("Avg price:    -"),
            }
            println!("Last scraped: {}", s.last_scraped.as_deref().unwrap_or("-"));
            Ok(())
        }
        Commands::Purge { yes } => {
            if !yes {
                bail!("refusing to delete stored vehicles without --yes");
            }
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let removed = db::purge(&conn)?;
            println!("Deleted {} vehicles from {}", removed, settings.db_path);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
