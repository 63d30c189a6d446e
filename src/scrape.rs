//! Per-site information extraction. Sites are visited one at a time, in
//! discovery order; a failing site is recorded and skipped.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::discovery::DiscoveredOrganization;
use crate::extract::prompt::organization_instruction;
use crate::extract::{ExtractError, Extraction, Extractor};
use crate::table::{OrganizationRecord, is_reserved_column, normalize_field_name};

#[derive(Debug)]
pub struct ScrapeReport {
    pub records: Vec<OrganizationRecord>,
    pub failed_sites: Vec<FailedSite>,
}

#[derive(Debug)]
pub struct FailedSite {
    pub name: String,
    pub website: String,
    pub reason: String,
}

pub struct ScrapeRequest<'a> {
    pub fields: &'a [String],
    pub limit: usize,
    pub site_timeout: Duration,
}

pub async fn scrape_all(
    extractor: &impl Extractor,
    organizations: &[DiscoveredOrganization],
    req: &ScrapeRequest<'_>,
) -> ScrapeReport {
    let instruction = organization_instruction(req.fields, req.limit);
    let total = organizations.len();

    let mut records = Vec::with_capacity(total);
    let mut failed_sites = Vec::new();

    for (i, org) in organizations.iter().enumerate() {
        let progress = format!("{}/{total}", i + 1);
        let outcome = tokio::time::timeout(
            req.site_timeout,
            extract_site(extractor, &org.website, &instruction, req.limit),
        )
        .await;

        let reason = match outcome {
            Ok(Ok(extraction)) => {
                let record = to_record(org, extraction, req.limit);
                info!(%progress, name = %org.name, fields = record.fields.len(), "done");
                records.push(record);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", req.site_timeout.as_secs_f32()),
        };

        warn!(%progress, name = %org.name, website = %org.website, %reason, "extraction failed, skipping");
        failed_sites.push(FailedSite {
            name: org.name.clone(),
            website: org.website.clone(),
            reason,
        });
    }

    ScrapeReport {
        records,
        failed_sites,
    }
}

/// Tries the site's about page first, then the page discovery found.
async fn extract_site(
    extractor: &impl Extractor,
    website: &str,
    instruction: &str,
    limit: usize,
) -> Result<Extraction, ExtractError> {
    if let Some(about) = about_page(website) {
        match extractor.extract(&about, instruction, limit).await {
            Ok(extraction) if !extraction.is_empty() => return Ok(extraction),
            Ok(_) => debug!(url = %about, "about page had nothing, trying the discovered page"),
            Err(e) => debug!(url = %about, error = %e, "about page unavailable, trying the discovered page"),
        }
    }
    extractor.extract(website, instruction, limit).await
}

/// `https://org.example/en` becomes `https://org.example/en/about`. `None`
/// when the link already is an about page or cannot carry a path.
fn about_page(website: &str) -> Option<String> {
    let mut url = url::Url::parse(website).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }

    let base = url.path().trim_end_matches('/').to_string();
    let last_segment = base.rsplit('/').next().unwrap_or_default();
    if last_segment.eq_ignore_ascii_case("about") {
        return None;
    }

    url.set_path(&format!("{base}/about"));
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Every returned key keeps its column, even when its value is empty.
fn to_record(
    org: &DiscoveredOrganization,
    extraction: Extraction,
    limit: usize,
) -> OrganizationRecord {
    let mut fields: Vec<(String, String)> = Vec::with_capacity(extraction.len().min(limit));

    for (key, value) in extraction {
        if fields.len() == limit {
            break;
        }
        let field = normalize_field_name(&key);
        if field.is_empty() || is_reserved_column(&field) || fields.iter().any(|(k, _)| *k == field)
        {
            continue;
        }
        fields.push((field, flatten_value(&value).unwrap_or_default()));
    }

    OrganizationRecord {
        name: org.name.clone(),
        link: org.website.clone(),
        fields,
    }
}

/// Renders a JSON value as a single cell; `None` when there is nothing to show.
fn flatten_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(flatten_value)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| flatten_value(v).map(|v| format!("{k}: {v}")))
            .collect::<Vec<_>>()
            .join("; "),
    };
    (!text.is_empty()).then_some(text)
}
