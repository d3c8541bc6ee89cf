use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobfy_client::{EnvCredentials, ReqwestClient, default_registry};
use jobfy_core::export::{write_csv, write_json};
use jobfy_core::traits::{CredentialProvider, NullSink};
use jobfy_core::{OrchestratorConfig, RunReport, ScrapeOrchestrator, ScrapeRequest};

#[derive(Parser)]
#[command(name = "jobfy", version, about = "Job posting scraper for Spanish and remote job boards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported sites and whether their credentials are configured
    Sites,

    /// Scrape job offers from one or more sites
    Scrape {
        /// Comma-separated site ids (see `jobfy sites`)
        #[arg(short, long, value_delimiter = ',', required_unless_present = "all")]
        sites: Vec<String>,

        /// Scrape every registered site
        #[arg(long, conflicts_with = "sites")]
        all: bool,

        /// Search keyword, e.g. "rust developer"
        #[arg(short, long)]
        keyword: Option<String>,

        /// Location filter, e.g. "Madrid"
        #[arg(short, long)]
        location: Option<String>,

        /// Write the offers to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to the output file extension, else CSV)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Sites scraped in parallel
        #[arg(long, env = "JOBFY_MAX_CONCURRENT_SITES", default_value_t = 5)]
        max_concurrent_sites: usize,

        /// Per-request timeout in seconds
        #[arg(long, env = "JOBFY_TIMEOUT_SECS", default_value_t = 30)]
        timeout: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobfy=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sites => cmd_sites()?,
        Commands::Scrape {
            sites,
            all,
            keyword,
            location,
            output,
            format,
            max_concurrent_sites,
            timeout,
        } => {
            let registry = default_registry().map_err(|e| anyhow::anyhow!(e))?;
            let sites = if all { registry.ids().to_vec() } else { sites };

            let mut request = ScrapeRequest::new(sites);
            if let Some(keyword) = &keyword {
                request = request.with_keyword(keyword);
            }
            if let Some(location) = &location {
                request = request.with_location(location);
            }

            let client = ReqwestClient::with_timeout(Duration::from_secs(timeout))
                .context("Failed to create HTTP client")?;
            let orchestrator =
                ScrapeOrchestrator::new(registry, client, EnvCredentials::new(), NullSink)
                    .with_config(
                        OrchestratorConfig::default().with_max_concurrent_sites(max_concurrent_sites),
                    );

            let report = cmd_scrape(&orchestrator, request).await?;
            print_summary(&report);

            if let Some(path) = output {
                let format = format.unwrap_or_else(|| OutputFormat::for_path(&path));
                export(&report, &path, format)?;
            }
        }
    }

    Ok(())
}

fn cmd_sites() -> Result<()> {
    let registry = default_registry().map_err(|e| anyhow::anyhow!(e))?;
    let credentials = EnvCredentials::new();

    println!("{:<12} {:<12} {:<6} {:<12} {}", "ID", "NAME", "AUTH", "CREDENTIALS", "URL");
    for site in registry.list() {
        let creds = if !site.requires_auth {
            "-"
        } else if credentials.credentials(&site.id).is_some() {
            "configured"
        } else {
            "missing"
        };
        println!(
            "{:<12} {:<12} {:<6} {:<12} {}",
            site.id,
            site.display_name,
            if site.requires_auth { "yes" } else { "no" },
            creds,
            site.base_url
        );
    }

    let missing: Vec<_> = registry
        .list()
        .into_iter()
        .filter(|s| s.requires_auth && credentials.credentials(&s.id).is_none())
        .map(|s| {
            format!(
                "{}/{}",
                EnvCredentials::var_name(&s.id, "USERNAME"),
                EnvCredentials::var_name(&s.id, "PASSWORD")
            )
        })
        .collect();
    if !missing.is_empty() {
        println!("\nSet {} to enable the remaining sites.", missing.join(", "));
    }

    Ok(())
}

async fn cmd_scrape(
    orchestrator: &ScrapeOrchestrator<ReqwestClient, EnvCredentials, NullSink>,
    request: ScrapeRequest,
) -> Result<RunReport> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling remaining sites");
            on_interrupt.cancel();
        }
    });

    let report = orchestrator
        .run(request, cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(report)
}

fn print_summary(report: &RunReport) {
    let entry = &report.entry;
    println!(
        "Run {} {} in {:.1}s: {} offers",
        entry.id,
        entry.status,
        entry.duration_ms().unwrap_or_default() as f64 / 1000.0,
        entry.jobs_found
    );

    for (site, outcome) in &entry.per_site_outcome {
        match (&outcome.error, &outcome.message) {
            (None, _) => println!(
                "  {site:<12} {:>4} found, {} skipped",
                outcome.count, outcome.skipped
            ),
            (Some(kind), Some(message)) => println!("  {site:<12} {kind}: {message}"),
            (Some(kind), None) => println!("  {site:<12} {kind}"),
        }
    }

    if !report.offers.is_empty() {
        println!();
        for offer in &report.offers {
            println!(
                "  [{}] {} @ {} ({})",
                offer.source, offer.title, offer.company, offer.location
            );
        }
    }
}

fn export(report: &RunReport, path: &Path, format: OutputFormat) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    match format {
        OutputFormat::Csv => write_csv(&report.offers, writer),
        OutputFormat::Json => write_json(&report.offers, writer),
    }
    .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        path = %path.display(),
        count = report.offers.len(),
        "Offers exported"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scrape_args() {
        let cli = Cli::try_parse_from([
            "jobfy", "scrape", "--sites", "remoteok,indeed", "-k", "rust", "-o", "out.json",
        ])
        .unwrap();
        let Commands::Scrape {
            sites,
            keyword,
            output,
            format,
            ..
        } = cli.command
        else {
            panic!("expected scrape");
        };
        assert_eq!(sites, vec!["remoteok", "indeed"]);
        assert_eq!(keyword.as_deref(), Some("rust"));
        assert_eq!(format, None);
        assert_eq!(OutputFormat::for_path(&output.unwrap()), OutputFormat::Json);
    }

    #[test]
    fn test_scrape_requires_sites_or_all() {
        assert!(Cli::try_parse_from(["jobfy", "scrape"]).is_err());
        assert!(Cli::try_parse_from(["jobfy", "scrape", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["jobfy", "scrape", "--all", "-s", "indeed"]).is_err());
    }

    #[test]
    fn test_format_defaults_to_csv() {
        assert_eq!(OutputFormat::for_path(Path::new("offers.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::for_path(Path::new("offers")), OutputFormat::Csv);
        assert_eq!(OutputFormat::for_path(Path::new("OFFERS.JSON")), OutputFormat::Json);
    }
}
