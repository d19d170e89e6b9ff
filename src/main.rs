//! Caseflow - registry automation from the command line.
//!
//! Each subcommand runs one logged-in operation against the registry
//! configured in the settings file, reading request payloads from JSON
//! files and printing the operation's result as JSON.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use caseflow_cli::config::{load_settings, Settings};
use caseflow_cli::metrics;
use caseflow_cli::ops::OperationalClient;
use caseflow_core_types::{
    CreateOffenderRequest, CreateOrUpdateReleaseRequest, CreateOrUpdateSentenceRequest,
    CreateRecallRequest, OffenderRef, OffenderSearchRequest, ReleaseRef, SentenceRef,
    UpdateOffenderRequest,
};
use page_adapter::{ChromiumConfig, ChromiumUi};

/// Caseflow - browser automation for the case-management registry
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for offenders by identifier, or family name and birth date
    Search {
        #[arg(long)]
        cro_number: Option<String>,
        #[arg(long)]
        noms_id: Option<String>,
        #[arg(long)]
        family_name: Option<String>,
        #[arg(long)]
        date_of_birth: Option<NaiveDate>,
    },
    /// Create a new offender from a JSON request file
    CreateOffender {
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Update an existing offender from a JSON request file
    UpdateOffender {
        #[arg(long)]
        offender: String,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Create (or confirm) a sentence for an offender
    CreateSentence {
        #[arg(long)]
        offender: String,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Update an existing sentence
    UpdateSentence {
        #[arg(long)]
        offender: String,
        #[arg(long)]
        sentence: String,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Create or update a release under a sentence
    CreateRelease {
        #[arg(long)]
        offender: String,
        #[arg(long)]
        sentence: String,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Create (or confirm) a recall under a release
    CreateRecall {
        #[arg(long)]
        offender: String,
        #[arg(long)]
        release: String,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn read_request<T: DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading request file '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing request file '{}'", path.display()))
}

fn print_result<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn chromium_config(settings: &Settings) -> Result<ChromiumConfig> {
    Ok(ChromiumConfig {
        base_url: Url::parse(&settings.registry.base_url)
            .context("registry.base_url is not a valid URL")?,
        headless: settings.browser.headless,
        chrome_binary: settings.browser.binary.clone(),
        nav_timeout: settings.timeouts.navigation(),
        wait_timeout: settings.timeouts.wait(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!(
        "caseflow {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATE")
    );

    let settings = load_settings(cli.config.clone()).context("loading configuration")?;
    metrics::register_metrics(prometheus::default_registry());

    let ui = Arc::new(
        ChromiumUi::launch(chromium_config(&settings)?)
            .await
            .context("launching browser")?,
    );
    let client = OperationalClient::new(ui, &settings);

    match cli.command {
        Commands::Search {
            cro_number,
            noms_id,
            family_name,
            date_of_birth,
        } => {
            let request = OffenderSearchRequest {
                cro_number,
                noms_id,
                family_name,
                date_of_birth,
            };
            let results = client.search_offenders(&request).await?;
            print_result(&results)
        }
        Commands::CreateOffender { request } => {
            let payload: CreateOffenderRequest = read_request(&request)?;
            let created = client.create_offender(&payload).await?;
            print_result(&created)
        }
        Commands::UpdateOffender { offender, request } => {
            let payload: UpdateOffenderRequest = read_request(&request)?;
            client
                .update_offender(&OffenderRef::new(offender), &payload)
                .await?;
            Ok(())
        }
        Commands::CreateSentence { offender, request } => {
            let payload: CreateOrUpdateSentenceRequest = read_request(&request)?;
            let created = client
                .create_sentence(&OffenderRef::new(offender), &payload)
                .await?;
            print_result(&created)
        }
        Commands::UpdateSentence {
            offender,
            sentence,
            request,
        } => {
            let payload: CreateOrUpdateSentenceRequest = read_request(&request)?;
            client
                .update_sentence(&OffenderRef::new(offender), &SentenceRef::new(sentence), &payload)
                .await?;
            Ok(())
        }
        Commands::CreateRelease {
            offender,
            sentence,
            request,
        } => {
            let payload: CreateOrUpdateReleaseRequest = read_request(&request)?;
            let saved = client
                .create_or_update_release(
                    &OffenderRef::new(offender),
                    &SentenceRef::new(sentence),
                    &payload,
                )
                .await?;
            print_result(&saved)
        }
        Commands::CreateRecall {
            offender,
            release,
            request,
        } => {
            let payload: CreateRecallRequest = read_request(&request)?;
            let created = client
                .create_recall(
                    &OffenderRef::new(offender),
                    &ReleaseRef::new(release),
                    &payload,
                )
                .await?;
            print_result(&created)
        }
    }
}
