mod browser;
mod config;
mod convert;
mod driver;
mod error;
mod extract;
mod harvest;
mod locators;
mod pipeline;
mod record;
mod reshape;
mod store;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use browser::{Browser, WebDriver};
use config::Config;
use driver::DriverService;
use store::{Generation, Stamp};

#[derive(Parser)]
#[command(name = "kn_scraper", about = "Seven Knights character wiki scraper")]
struct Cli {
    /// Directory for raw backups and reshaped tables
    #[arg(long, global = true, env = "KN_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest links, extract every page, back up, and reshape
    Run {
        #[command(flatten)]
        browser: BrowserArgs,
        /// Concurrent page sessions
        #[arg(short, long, default_value_t = config::WORKERS)]
        workers: usize,
        /// Listing page to harvest character links from
        #[arg(long, default_value = config::LISTING_URL)]
        listing: String,
        /// Seconds to wait for the listing page to render
        #[arg(long, default_value_t = config::SETTLE_SECS)]
        settle: u64,
    },
    /// Print the character links found on the listing page
    Links {
        #[command(flatten)]
        browser: BrowserArgs,
        #[arg(long, default_value = config::LISTING_URL)]
        listing: String,
        #[arg(long, default_value_t = config::SETTLE_SECS)]
        settle: u64,
    },
    /// Extract one character page and print the record as JSON
    Page {
        url: String,
        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Rebuild the three tables from a raw backup (default: the latest)
    Reshape {
        #[arg(short, long)]
        backup: Option<PathBuf>,
    },
    /// Show the newest snapshot of a kind ("table" or "raw")
    Latest { kind: String },
    /// Download the current stable chromedriver if the local one is stale
    UpdateDriver {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = config::DRIVER_PLATFORM)]
        platform: String,
        #[arg(long, default_value = config::CHROMEDRIVER_ENDPOINT)]
        endpoint: String,
    },
}

#[derive(Args)]
struct BrowserArgs {
    /// Use an already running WebDriver server instead of spawning chromedriver
    #[arg(long, env = "KN_WEBDRIVER_URL")]
    webdriver_url: Option<String>,
    /// chromedriver binary to spawn when no server URL is given
    #[arg(long, default_value = driver::BINARY_NAME)]
    chromedriver: PathBuf,
    #[arg(long, default_value_t = config::WEBDRIVER_PORT)]
    port: u16,
}

impl BrowserArgs {
    /// The browser plus the driver process backing it, if one was spawned.
    /// The service must outlive every session.
    async fn connect(&self) -> anyhow::Result<(Arc<dyn Browser>, Option<DriverService>)> {
        match &self.webdriver_url {
            Some(url) => Ok((Arc::new(WebDriver::headless(url)), None)),
            None => {
                let service = DriverService::spawn(&self.chromedriver, self.port).await?;
                let browser = Arc::new(WebDriver::headless(service.url()));
                Ok((browser, Some(service)))
            }
        }
    }
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
    let out_dir = cli.out_dir;

    let result = match cli.command {
        Commands::Run {
            browser,
            workers,
            listing,
            settle,
        } => {
            std::fs::create_dir_all(&out_dir)?;
            let config = Config {
                out_dir,
                listing_url: listing,
                workers,
                settle: Duration::from_secs(settle),
            };
            let (browser, _service) = browser.connect().await?;
            let summary = pipeline::run(&config, browser).await?;
            println!(
                "Scraped {} characters from {} links ({} pages failed).",
                summary.characters, summary.links, summary.failed_pages
            );
            println!("Backup: {}", summary.backup.display());
            for path in &summary.tables {
                println!("Table:  {}", path.display());
            }
            Ok(())
        }
        Commands::Links {
            browser,
            listing,
            settle,
        } => {
            let (browser, _service) = browser.connect().await?;
            let links =
                harvest::collect_links(browser.as_ref(), &listing, Duration::from_secs(settle))
                    .await?;
            for link in &links {
                println!("{}", link);
            }
            println!("\n{} links", links.len());
            Ok(())
        }
        Commands::Page { url, browser } => {
            let (browser, _service) = browser.connect().await?;
            let snapshot = extract::extract_page(browser.as_ref(), &url).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Reshape { backup } => {
            let rows = match backup {
                Some(path) => store::read_backup(&path)?,
                None => match store::resolve_latest(&out_dir, "raw")? {
                    Generation::Raw { stamp, rows } => {
                        println!("Using raw backup {}", stamp);
                        rows
                    }
                    other => anyhow::bail!("expected a raw backup, found tables {}", other.stamp()),
                },
            };
            let tables = reshape::reshape(&rows);
            let written = reshape::write_tables(&out_dir, &tables, Stamp::now())?;
            println!(
                "Reshaped {} characters into {} skill rows and {} ascension rows.",
                tables.chars.len(),
                tables.skills.len(),
                tables.ascent.len()
            );
            for path in &written {
                println!("Table:  {}", path.display());
            }
            Ok(())
        }
        Commands::Latest { kind } => {
            match store::resolve_latest(&out_dir, &kind)? {
                Generation::Tables { stamp, tables } => {
                    println!("Latest tables: {}", stamp);
                    for (name, frame) in &tables {
                        if frame.is_empty() {
                            println!("  {:<14} empty | {}", name, frame.columns.join(", "));
                            continue;
                        }
                        let chars: BTreeSet<&str> = frame.index().collect();
                        println!(
                            "  {:<14} {:>5} rows | {:>4} characters | {}",
                            name,
                            frame.len(),
                            chars.len(),
                            frame.columns.join(", ")
                        );
                    }
                }
                Generation::Raw { stamp, rows } => {
                    println!("Latest raw backup: {} ({} characters)", stamp, rows.len());
                    let failed = rows
                        .iter()
                        .filter(|r| r.record.skills().iter().any(|(_, f)| f.is_failed()))
                        .count();
                    if failed > 0 {
                        println!("  {} characters with unreadable skills", failed);
                    }
                }
            }
            Ok(())
        }
        Commands::UpdateDriver {
            dir,
            platform,
            endpoint,
        } => {
            match driver::update(&endpoint, &dir, &platform).await? {
                Some(path) => println!("Installed {}", path.display()),
                None => println!("chromedriver is up to date."),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
