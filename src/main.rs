//! Roster CLI
//!
//! Host binary for the roster client:
//! - Watch the live roster as it changes
//! - List a page of persons
//! - Print visitor statistics
//! - Generate a default config file

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster::client::statistics::VisitWindow;
use roster::client::{Fetch, HttpClient, PersonsApi, StatisticsApi};
use roster::config::{generate_default_config, Config};
use roster::model::Person;
use roster::pager::LoadOutcome;
use roster::LiveRoster;

#[derive(Parser)]
#[command(name = "roster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live person roster client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mount a live roster and print it as it changes
    Watch {
        /// Number of pages to load up front
        #[arg(short, long, default_value = "1")]
        pages: u32,
    },

    /// Print one page of persons
    List {
        /// Page index (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Page size (default: from config)
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Print visitor statistics
    Stats {
        /// Visit count window (last_6_hours, day, week, month)
        #[arg(short, long, default_value = "day")]
        window: VisitWindow,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config);

    match cli.command {
        Commands::Watch { pages } => watch(&config, pages, &cli.format).await?,
        Commands::List { page, page_size } => {
            let page_size = page_size.unwrap_or_else(|| config.pagination.effective_page_size());
            let persons = PersonsApi::new(http_client(&config)?);
            let listing = persons
                .list_page(page, page_size)
                .await
                .with_context(|| format!("failed to load page {}", page))?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&listing.results)?);
            } else {
                print_persons(&listing.results);
                println!();
                println!(
                    "Page {}/{} ({} total{})",
                    listing.info.current_page,
                    listing.info.total_pages,
                    listing.info.count,
                    if listing.info.has_next { ", more available" } else { "" }
                );
            }
        }
        Commands::Stats { window } => {
            let stats = StatisticsApi::new(http_client(&config)?);
            let visits = stats.visit_counts(window).await?;
            let genders = stats.genders().await?;
            let ages = stats.ages().await?;
            let body_types = stats.body_types().await?;
            let emotions = stats.emotions().await?;

            if cli.format == "json" {
                let all = serde_json::json!({
                    "visits": visits,
                    "genders": genders,
                    "ages": ages,
                    "body_types": body_types,
                    "emotions": emotions,
                });
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                println!("Visits ({}):", window.as_str());
                for bucket in &visits {
                    println!("  {:<20} {}", bucket.date, bucket.value);
                }
                for (title, shares) in [("Gender", &genders), ("Age", &ages), ("Body type", &body_types)] {
                    println!();
                    println!("{}:", title);
                    for share in shares {
                        println!("  {:<20} {:.1}%", share.kind, share.percentage);
                    }
                }
                println!();
                println!("Emotion:");
                for emotion in &emotions {
                    println!("  {:<20} {}", emotion.kind, emotion.value);
                }
            }
        }
        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Initialize tracing from the logging section; logs go to stderr
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("roster={}", config.logging.level).into());
    let json = config.logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn http_client(config: &Config) -> anyhow::Result<Arc<dyn Fetch>> {
    let client = HttpClient::new(&config.api).context("failed to create HTTP client")?;
    Ok(Arc::new(client))
}

async fn watch(config: &Config, pages: u32, format: &str) -> anyhow::Result<()> {
    tracing::info!("Roster v{}", env!("CARGO_PKG_VERSION"));

    let roster = LiveRoster::mount(config, http_client(config)?).await;
    for _ in 1..pages {
        match roster.load_more().await {
            Ok(LoadOutcome::Exhausted) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Preloading pages stopped");
                break;
            }
        }
    }

    let mut snapshots = roster.subscribe();
    let mut last_state = roster.connection_state();
    println!("Connection: {}", last_state);

    loop {
        {
            let snapshot = snapshots.borrow_and_update().clone();
            if format == "json" {
                println!("{}", serde_json::to_string(&*snapshot)?);
            } else {
                println!();
                println!(
                    "Roster v{}: {} shown, {} total",
                    snapshot.version,
                    snapshot.persons.len(),
                    snapshot.count
                );
                print_persons(&snapshot.persons);
            }
        }

        while let Some(arrival) = roster.current_arrival() {
            println!("Arrived: {}", arrival.person.display_name());
            roster.dismiss_arrival();
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }

        let state = roster.connection_state();
        if state != last_state {
            println!("Connection: {}", state);
            last_state = state;
        }
    }

    roster.teardown().await;
    let stats = roster.connection_stats();
    tracing::info!(
        sessions = stats.sessions_opened,
        reconnects = stats.reconnects_scheduled,
        frames = stats.frames_received,
        "Roster shutdown complete"
    );
    Ok(())
}

fn print_persons(persons: &[Person]) {
    if persons.is_empty() {
        println!("No persons");
        return;
    }

    println!(
        "{:<38} {:<24} {:>4} {:<10} {:<12} {:<20}",
        "ID", "Name", "Age", "Gender", "Emotion", "Last seen"
    );
    println!("{}", "-".repeat(112));

    for person in persons {
        println!(
            "{:<38} {:<24} {:>4} {:<10} {:<12} {:<20}",
            person.id,
            person.display_name(),
            person.age.map(|a| a.to_string()).unwrap_or_default(),
            person.gender.as_deref().unwrap_or("-"),
            person.emotion.as_deref().unwrap_or("-"),
            person
                .exit_time
                .or(person.entry_time)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}
