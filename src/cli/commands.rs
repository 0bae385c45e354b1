//! CLI commands implementation.

use std::path::PathBuf;

use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::{CrawlerConfig, MotiveType, Site, SkipRule};
use crate::server;
use crate::utils::address::normalize_street;

#[derive(Parser)]
#[command(name = "leads")]
#[command(about = "Distressed-property lead acquisition and record linkage system")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Manage target sites
    Site {
        #[command(subcommand)]
        command: SiteCommands,
    },

    /// Store raw captures
    Capture {
        #[command(subcommand)]
        command: CaptureCommands,
    },

    /// Run record linkage over a site's unparsed captures
    Link {
        /// Site ID to process
        site_id: i64,
        /// Limit number of captures to process (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: u64,
    },

    /// Show the crawl run ledger
    Runs {
        /// Filter by site ID
        #[arg(short, long)]
        site: Option<i64>,
        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show the current restart checkpoint for a site
    Checkpoint {
        /// Site ID
        site_id: i64,
    },

    /// Show the crawl error ledger
    Errors {
        /// Filter by site ID
        #[arg(short, long)]
        site: Option<i64>,
        /// Number of errors to show
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Manage the property skip list
    Skip {
        #[command(subcommand)]
        command: SkipCommands,
    },

    /// Start the admin web server
    Serve {
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind
        #[arg(short, long, default_value = "8090")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum SiteCommands {
    /// Register a site (or update it if url+module already exist)
    Add {
        /// Root URL of the source
        url: String,
        /// Parser module identifier
        module: String,
        /// Human-readable crawler name
        #[arg(short, long)]
        name: Option<String>,
        /// Scheduling priority (lower runs first)
        #[arg(long, default_value = "100")]
        priority: i64,
        /// Route fetches through a proxy
        #[arg(long)]
        proxy: bool,
        /// Insert a delay between fetches
        #[arg(long)]
        time_delay: bool,
        /// Allow intra-site fetch concurrency
        #[arg(long)]
        threads: bool,
        /// Rotate through the proxy pool
        #[arg(long)]
        rotate_proxies: bool,
    },
    /// List registered sites
    List,
    /// Remove a site
    Remove {
        /// Site ID
        site_id: i64,
    },
}

#[derive(Subcommand)]
enum CaptureCommands {
    /// Store a page capture (idempotent on site+url)
    Page {
        /// Site ID
        site_id: i64,
        /// Page URL
        url: String,
        /// Raw content (read from stdin when omitted)
        #[arg(long)]
        content: Option<String>,
        /// Extracted address text
        #[arg(long)]
        address: Option<String>,
        /// Extracted owner text
        #[arg(long)]
        owner: Option<String>,
        /// Listing identifier from the source
        #[arg(long)]
        listing_id: Option<String>,
        /// Distress-type code (FCL, DIV, PRB, TAX)
        #[arg(long)]
        motive: Option<String>,
    },
    /// Store a file capture (deduplicated on content MD5)
    File {
        /// Site ID
        site_id: i64,
        /// File URL
        url: String,
        /// Path to the captured file contents
        path: PathBuf,
        /// County ID
        #[arg(long)]
        county: Option<i64>,
    },
}

#[derive(Subcommand)]
enum SkipCommands {
    /// Add a skip rule for an address signature
    Add {
        /// Street number
        street_num: String,
        /// Street name (normalized automatically)
        street_name: String,
        /// Zip code
        zip: String,
        /// County name
        #[arg(long)]
        county: Option<String>,
        /// Label for the rule
        #[arg(long)]
        name: Option<String>,
        /// Exclusion reason code
        #[arg(long)]
        kind: Option<String>,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir)?;

    match cli.command {
        Commands::Init => {
            settings.ensure_data_dir()?;
            settings.open_repositories()?;
            println!(
                "{} initialized database at {}",
                style("ok").green(),
                settings.db_path.display()
            );
        }

        Commands::Site { command } => run_site(&settings, command)?,
        Commands::Capture { command } => run_capture(&settings, command)?,

        Commands::Link { site_id, limit } => {
            let repos = settings.open_repositories()?;
            let site = repos
                .sites
                .get(site_id)?
                .ok_or_else(|| anyhow::anyhow!("unknown site id {}", site_id))?;
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message(format!("linking captures for {}", site.crawler_name));
            spinner.enable_steady_tick(Duration::from_millis(100));

            let summary = repos.ingest(&settings).process_site(&site, limit)?;
            spinner.finish_and_clear();
            println!(
                "run {}: {} processed, {} linked, {} skipped, {} quarantined, {} errors ({})",
                summary.crawler_id,
                summary.processed,
                summary.linked,
                summary.skipped,
                summary.quarantined,
                summary.errors,
                summary
                    .status
                    .map(|s| s.as_str())
                    .unwrap_or("unknown"),
            );
        }

        Commands::Runs { site, limit } => {
            let repos = settings.open_repositories()?;
            for run in repos.runs.list(site, limit)? {
                let end = run
                    .last_run_end
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:>6}  site {:>4}  stage {:>2}  {:<8}  {}  {}",
                    run.crawler_id,
                    run.site_id,
                    run.stage,
                    run.run_status.as_str(),
                    run.last_run_start.to_rfc3339(),
                    end,
                );
            }
        }

        Commands::Checkpoint { site_id } => {
            let repos = settings.open_repositories()?;
            match repos.checkpoints.last_checkpoint(site_id)? {
                Some(cp) => println!(
                    "site {}: county={} city={} zip={} url={}",
                    cp.site_id, cp.county, cp.city, cp.zipcode, cp.data_url
                ),
                None => println!("site {}: no checkpoint (crawl starts from the beginning)", site_id),
            }
        }

        Commands::Errors { site, limit } => {
            let repos = settings.open_repositories()?;
            for err in repos.linkage.list_errors(site, limit)? {
                println!(
                    "{}  site {:>4}  {}",
                    err.date_time.to_rfc3339(),
                    err.site_id,
                    err.text
                );
            }
        }

        Commands::Skip { command } => run_skip(&settings, command)?,

        Commands::Serve { host, port } => {
            server::serve(&settings, &host, port).await?;
        }
    }

    Ok(())
}

fn run_site(settings: &Settings, command: SiteCommands) -> anyhow::Result<()> {
    let repos = settings.open_repositories()?;
    match command {
        SiteCommands::Add {
            url,
            module,
            name,
            priority,
            proxy,
            time_delay,
            threads,
            rotate_proxies,
        } => {
            let mut site = Site::new(url, module, name.unwrap_or_default());
            if site.crawler_name.is_empty() {
                site.crawler_name = site.module.clone();
            }
            site.priority = priority;
            let id = repos.sites.save(&site)?;
            repos.sites.save_config(&CrawlerConfig {
                site_id: id,
                proxy,
                time_delay,
                threads,
                rotate_proxies,
            })?;
            println!("{} site {} registered", style("ok").green(), id);
        }
        SiteCommands::List => {
            for site in repos.sites.get_all()? {
                let last = site
                    .last_run
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "never".into());
                println!(
                    "{:>4}  p{:<4} {:<20} {:<30} last run: {}",
                    site.id, site.priority, site.crawler_name, site.url, last
                );
            }
        }
        SiteCommands::Remove { site_id } => {
            if repos.sites.delete(site_id)? {
                println!("{} site {} removed", style("ok").green(), site_id);
            } else {
                println!("{} no such site {}", style("!!").red(), site_id);
            }
        }
    }
    Ok(())
}

fn run_capture(settings: &Settings, command: CaptureCommands) -> anyhow::Result<()> {
    let repos = settings.open_repositories()?;
    match command {
        CaptureCommands::Page {
            site_id,
            url,
            content,
            address,
            owner,
            listing_id,
            motive,
        } => {
            let content = match content {
                Some(content) => content,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let motive = motive
                .as_deref()
                .map(|code| {
                    MotiveType::from_code(&code.to_uppercase())
                        .ok_or_else(|| anyhow::anyhow!("unknown motive code {}", code))
                })
                .transpose()?;

            let capture = repos.captures.capture_page(site_id, &url, &content)?;
            if address.is_some() || owner.is_some() || listing_id.is_some() || motive.is_some() {
                repos.captures.set_page_extraction(
                    capture.id,
                    address.as_deref(),
                    owner.as_deref(),
                    None,
                    None,
                    listing_id.as_deref(),
                    motive,
                )?;
            }
            println!("{} capture {} stored", style("ok").green(), capture.id);
        }
        CaptureCommands::File {
            site_id,
            url,
            path,
            county,
        } => {
            let contents = std::fs::read_to_string(&path)?;
            let capture = repos.captures.capture_file(site_id, county, &url, &contents)?;
            println!(
                "{} file capture {} stored (md5 {})",
                style("ok").green(),
                capture.id,
                capture.html_md5
            );
        }
    }
    Ok(())
}

fn run_skip(settings: &Settings, command: SkipCommands) -> anyhow::Result<()> {
    let repos = settings.open_repositories()?;
    match command {
        SkipCommands::Add {
            street_num,
            street_name,
            zip,
            county,
            name,
            kind,
        } => {
            let rule = SkipRule {
                id: 0,
                name,
                street_num,
                street_name: normalize_street(&street_name),
                zip,
                county,
                skip: true,
                kind,
            };
            let id = repos.linkage.save_skip_rule(&rule)?;
            println!("{} skip rule {} added", style("ok").green(), id);
        }
    }
    Ok(())
}
