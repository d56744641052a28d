mod ai;
mod config;
mod error;
mod fallback;
mod models;
mod notion;
mod orchestrator;
mod page;
mod text;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use models::{JobRecord, JobStatus, RecordEdits};
use notion::NotionClient;
use orchestrator::{MessageChannel, Orchestrator, Request, Responder, Response};
use page::{HttpPageAccess, PageAccess, StaticPageAccess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobclip")]
#[command(about = "Clip job postings into a Notion database with help from a language model")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a job posting and print the structured details
    Scrape {
        /// Job posting URL
        url: String,

        /// Read the page from a saved HTML file instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,

        /// Model to use (gemini-2.0-flash, gemini-2.5-flash, gemini-2.5-pro, gpt-4o, gpt-4o-mini)
        #[arg(short, long)]
        model: Option<String>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a job posting to the Notion database
    Add {
        #[arg(long)]
        url: String,

        #[arg(long, default_value = "")]
        company: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        location: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Applied, Wishlist, Interviewing, Rejected, Offer, Closed or N/A
        #[arg(short, long, default_value = "Applied")]
        status: JobStatus,
    },

    /// Scrape a job posting and add it to Notion in one go
    Clip {
        /// Job posting URL
        url: String,

        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(short, long, default_value = "Applied")]
        status: JobStatus,

        /// Replace the scraped company name
        #[arg(long)]
        company: Option<String>,

        /// Replace the scraped job title
        #[arg(long)]
        title: Option<String>,

        /// Replace the scraped location
        #[arg(long)]
        location: Option<String>,

        /// Replace the scraped description
        #[arg(long)]
        description: Option<String>,
    },

    /// Manage saved settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Save Notion credentials and the default model
    Set {
        /// Notion integration token
        #[arg(long)]
        api_key: String,

        /// Notion database ID
        #[arg(long)]
        database_id: String,

        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show saved settings
    Show,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn page_access(html: Option<&Path>, url: &str) -> Result<Arc<dyn PageAccess>> {
    match html {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read HTML file: {}", path.display()))?;
            Ok(Arc::new(StaticPageAccess::new(url, content)))
        }
        None => Ok(Arc::new(HttpPageAccess::new()?)),
    }
}

fn scraping_orchestrator(
    config: &Config,
    html: Option<&Path>,
    url: &str,
    model: Option<&str>,
) -> Result<Orchestrator> {
    let name = model
        .or(config.model.as_deref())
        .unwrap_or(ai::DEFAULT_MODEL);
    let spec = ai::resolve_model(name)?;
    let provider = ai::create_provider(&spec)?;
    println!("Using model: {}", spec.short_name);

    Ok(Orchestrator::new(Arc::new(NotionClient::new()))
        .with_page_access(page_access(html, url)?)
        .with_model(Arc::from(provider)))
}

/// Sends one request through the channel and waits for its single answer.
fn dispatch(rt: &Runtime, orchestrator: &Arc<Orchestrator>, request: Request) -> Result<Response> {
    rt.block_on(async {
        let (responder, reply) = Responder::pair();
        if !orchestrator.on_message(request, responder) {
            bail!("Request was not handled");
        }
        reply.await.context("Background flow ended without responding")
    })
}

fn print_record(record: &JobRecord) {
    println!("Title:    {}", record.job_title);
    println!("Company:  {}", record.company_name);
    println!("Location: {}", record.location);
    println!("URL:      {}", record.url);
    println!("\n--- Description ---");
    for line in textwrap::fill(&record.description, 78).lines() {
        println!("{}", line);
    }
}

fn scrape(rt: &Runtime, orchestrator: &Arc<Orchestrator>, url: &str) -> Result<JobRecord> {
    println!("Scraping {}...", url);
    let response = dispatch(
        rt,
        orchestrator,
        Request::ScrapeJobDetails {
            job_url: url.to_string(),
        },
    )?;
    if !response.success {
        bail!("{}", response.message);
    }
    println!("{}", response.message);
    response
        .data
        .ok_or_else(|| anyhow!("Scrape succeeded without returning job details"))
}

fn submit(rt: &Runtime, orchestrator: &Arc<Orchestrator>, config: &Config, record: &JobRecord) -> Result<()> {
    let credentials = config.credentials()?;
    println!("Sending to Notion...");
    let response = dispatch(rt, orchestrator, Request::add_job(&credentials, record))?;
    if !response.success {
        bail!("{}", response.message);
    }
    println!("{}", response.message);
    if let Some(page_url) = response
        .result
        .as_ref()
        .and_then(|r| r.get("url"))
        .and_then(|u| u.as_str())
    {
        println!("Page: {}", page_url);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?.with_env_overrides();
    let rt = Runtime::new().context("Failed to start async runtime")?;

    match cli.command {
        Commands::Scrape {
            url,
            html,
            model,
            json,
        } => {
            let orchestrator = Arc::new(scraping_orchestrator(
                &config,
                html.as_deref(),
                &url,
                model.as_deref(),
            )?);
            let record = scrape(&rt, &orchestrator, &url)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!();
                print_record(&record);
            }
        }

        Commands::Add {
            url,
            company,
            title,
            location,
            description,
            status,
        } => {
            let orchestrator = Arc::new(Orchestrator::new(Arc::new(NotionClient::new())));
            let record = JobRecord {
                url,
                company_name: company,
                job_title: title,
                location,
                description,
                status,
            };
            submit(&rt, &orchestrator, &config, &record)?;
        }

        Commands::Clip {
            url,
            html,
            model,
            status,
            company,
            title,
            location,
            description,
        } => {
            let orchestrator = Arc::new(scraping_orchestrator(
                &config,
                html.as_deref(),
                &url,
                model.as_deref(),
            )?);
            let mut record = scrape(&rt, &orchestrator, &url)?;
            let edits = RecordEdits {
                company_name: company,
                job_title: title,
                location,
                description,
            };
            if !edits.is_empty() {
                println!("Applying edits to scraped details");
                edits.apply(&mut record);
            }
            record.status = status;
            println!();
            print_record(&record);
            println!();
            submit(&rt, &orchestrator, &config, &record)?;
        }

        Commands::Config { command } => match command {
            ConfigCommands::Set {
                api_key,
                database_id,
                model,
            } => {
                if let Some(name) = &model {
                    ai::resolve_model(name)?;
                }
                let updated = Config {
                    notion_api_key: api_key,
                    notion_database_id: database_id,
                    model: model.or(config.model),
                };
                updated.save(&config_path)?;
                println!("Configuration saved to {}", config_path.display());
            }

            ConfigCommands::Show => {
                println!("Config file:  {}", config_path.display());
                println!("API key:      {}", config.masked_api_key());
                println!(
                    "Database ID:  {}",
                    if config.notion_database_id.is_empty() {
                        "(not set)"
                    } else {
                        config.notion_database_id.as_str()
                    }
                );
                println!(
                    "Model:        {}",
                    config.model.as_deref().unwrap_or(ai::DEFAULT_MODEL)
                );
            }
        },
    }

    Ok(())
}
