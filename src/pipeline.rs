//! The three steps of a run: discovery, per-site extraction, table assembly.

use std::path::Path;

use tracing::info;

use crate::config::RunConfig;
use crate::discovery::{self, DiscoveryError, DiscoveryRequest, SkippedLookup};
use crate::extract::Extractor;
use crate::scrape::{self, FailedSite, ScrapeRequest};
use crate::search::WebSearch;
use crate::table::{Table, TableError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("could not save database: {0}")]
    Write(#[from] TableError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub discovered: usize,
    pub table: Table,
    pub skipped_lookups: Vec<SkippedLookup>,
    pub failed_sites: Vec<FailedSite>,
}

pub async fn run(
    config: &RunConfig,
    search: &impl WebSearch,
    extractor: &impl Extractor,
) -> Result<RunSummary, RunError> {
    let discovery_req = DiscoveryRequest {
        source_link: &config.source_link,
        count: config.n_associations,
        query_suffix: config.query_suffix.as_deref(),
    };
    let discovery = discovery::discover(extractor, search, &discovery_req).await?;
    let organizations = discovery.organizations;
    info!(
        found = organizations.len(),
        skipped = discovery.skipped.len(),
        "finding the links of the associations done"
    );

    let scrape_req = ScrapeRequest {
        fields: &config.fields,
        limit: config.limit,
        site_timeout: config.site_timeout,
    };
    let report = scrape::scrape_all(extractor, &organizations, &scrape_req).await;

    let table = Table::from_records(report.records);
    info!(
        rows = table.len(),
        columns = table.columns().len(),
        failed = report.failed_sites.len(),
        "database created"
    );

    Ok(RunSummary {
        discovered: organizations.len(),
        table,
        skipped_lookups: discovery.skipped,
        failed_sites: report.failed_sites,
    })
}

pub fn persist(table: &Table, path: &Path) -> Result<(), RunError> {
    table.save(path)?;
    info!(path = %path.display(), rows = table.len(), "database saved");
    Ok(())
}
