mod cli;
mod config;
mod discovery;
mod extract;
mod fetch;
mod gemini;
mod pipeline;
mod scrape;
mod search;
mod table;

pub const USER_AGENT: &str = concat!("npscout/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use chrono::Local;
use clap::Parser;
use reqwest::Client;
use tracing::{error, info};

use cli::{Args, Engine};
use config::{ConfigError, Credentials};
use extract::GeminiExtractor;
use fetch::HttpFetcher;
use gemini::GeminiClient;
use search::{DuckDuckGo, GeminiLookup, GoogleCustomSearch, SearchBackend};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Per-site failures are warnings, so they only surface with -v.
    let directive = if args.verbose {
        "npscout=debug"
    } else {
        "npscout=error"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let config = args.run_config();
    let credentials = Credentials::from_env();

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    let gemini = GeminiClient::new(
        http.clone(),
        credentials.gemini().inspect_err(|e| error!("{e}"))?,
    );
    let search = search_backend(args.engine, &http, &credentials, &gemini)
        .inspect_err(|e| error!("{e}"))?;
    let extractor = GeminiExtractor::new(gemini, HttpFetcher::new(http));

    info!(
        source = %config.source_link,
        n = config.n_associations,
        limit = config.limit,
        engine = ?args.engine,
        "starting run"
    );

    let summary = pipeline::run(&config, &search, &extractor)
        .await
        .inspect_err(|e| error!("run aborted: {e}"))?;

    let path = args.output_target().resolve(&Local::now());
    pipeline::persist(&summary.table, &path).inspect_err(|e| error!("{e}"))?;

    if summary.table.is_empty() {
        println!("No associations could be scraped; empty database saved to \"{}\"", path.display());
    } else {
        println!(
            "Saved {} of {} associations to \"{}\"",
            summary.table.len(),
            summary.discovered,
            path.display()
        );
    }
    for lookup in &summary.skipped_lookups {
        println!("  no website for {}: {}", lookup.name, lookup.reason);
    }
    for failed in &summary.failed_sites {
        println!("  skipped {} ({}): {}", failed.name, failed.website, failed.reason);
    }
    if config.verbose {
        summary.table.write_csv(std::io::stdout().lock())?;
    }

    Ok(())
}

fn search_backend(
    engine: Engine,
    http: &Client,
    credentials: &Credentials,
    gemini: &GeminiClient,
) -> Result<SearchBackend, ConfigError> {
    Ok(match engine {
        Engine::Ddg => SearchBackend::DuckDuckGo(DuckDuckGo::new(http.clone())),
        Engine::Google => {
            SearchBackend::Google(GoogleCustomSearch::new(http.clone(), credentials.google()?))
        }
        Engine::Gemini => SearchBackend::Gemini(GeminiLookup::new(gemini.clone())),
    })
}
