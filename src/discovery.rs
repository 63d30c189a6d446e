//! Link discovery: read the association names from a listing page, then look
//! up a website for each of them.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::extract::prompt::discovery_instruction;
use crate::extract::{ExtractError, Extraction, Extractor};
use crate::search::{SearchError, WebSearch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredOrganization {
    pub name: String,
    pub website: String,
}

/// A listed name that did not get a website.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLookup {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub organizations: Vec<DiscoveredOrganization>,
    pub skipped: Vec<SkippedLookup>,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("could not read association list from {link}: {error}")]
    Source {
        link: String,
        #[source]
        error: ExtractError,
    },

    #[error("all {attempted} website lookups failed, last error: {source}")]
    Lookups {
        attempted: usize,
        #[source]
        source: SearchError,
    },
}

pub struct DiscoveryRequest<'a> {
    pub source_link: &'a str,
    pub count: usize,
    /// Appended to every website search, e.g. a region to disambiguate names.
    pub query_suffix: Option<&'a str>,
}

pub async fn discover(
    extractor: &impl Extractor,
    search: &impl WebSearch,
    req: &DiscoveryRequest<'_>,
) -> Result<Discovery, DiscoveryError> {
    if req.count == 0 {
        return Ok(Discovery::default());
    }

    let listing = extractor
        .extract(req.source_link, &discovery_instruction(req.source_link), 1)
        .await
        .map_err(|error| DiscoveryError::Source {
            link: req.source_link.to_string(),
            error,
        })?;

    let names = organization_names(&listing);
    info!(source = %req.source_link, names = names.len(), "association names found");

    let mut found = Vec::with_capacity(req.count.min(names.len()));
    let mut skipped = Vec::new();
    let mut attempted = 0;
    let mut failed = 0;
    let mut last_error = None;

    for (i, name) in names.iter().enumerate() {
        if found.len() == req.count {
            break;
        }
        attempted += 1;

        let query = match req.query_suffix {
            Some(suffix) => format!("{name} {suffix}"),
            None => name.clone(),
        };

        match search.find_website(&query).await {
            Ok(Some(website)) => {
                info!(progress = %format!("{}/{}", i + 1, names.len()), name = %name, %website, "website found");
                found.push(DiscoveredOrganization {
                    name: name.clone(),
                    website,
                });
            }
            Ok(None) => {
                warn!(name = %name, "no website found, skipping");
                skipped.push(SkippedLookup {
                    name: name.clone(),
                    reason: "no website found".to_string(),
                });
            }
            Err(e) => {
                warn!(name = %name, error = %e, "website lookup failed, skipping");
                skipped.push(SkippedLookup {
                    name: name.clone(),
                    reason: e.to_string(),
                });
                failed += 1;
                last_error = Some(e);
            }
        }
    }

    // Every lookup erroring means the provider is down, not that nothing was found.
    if failed == attempted
        && let Some(source) = last_error
    {
        return Err(DiscoveryError::Lookups { attempted, source });
    }

    debug!(
        requested = req.count,
        found = found.len(),
        skipped = skipped.len(),
        "discovery complete"
    );
    Ok(Discovery {
        organizations: found,
        skipped,
    })
}

/// Names are the first list in the response, either plain strings or
/// objects carrying a `name`.
fn organization_names(listing: &Extraction) -> Vec<String> {
    let Some(items) = listing.values().find_map(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::MockExtractor;
    use crate::search::testing::MockSearch;
    use serde_json::json;

    const SOURCE: &str = "https://bc-charities.example/members";

    fn request(count: usize) -> DiscoveryRequest<'static> {
        DiscoveryRequest {
            source_link: SOURCE,
            count,
            query_suffix: None,
        }
    }

    fn five_org_listing() -> MockExtractor {
        MockExtractor::default().with_result(
            SOURCE,
            json!({ "names": ["Alpha Aid", "Beta Care", "Gamma Trust", "Delta Fund", "Epsilon Club"] }),
        )
    }

    fn search_for_all() -> MockSearch {
        MockSearch::default()
            .with_site("Alpha Aid", "https://alpha.example")
            .with_site("Beta Care", "https://beta.example")
            .with_site("Gamma Trust", "https://gamma.example")
            .with_site("Delta Fund", "https://delta.example")
            .with_site("Epsilon Club", "https://epsilon.example")
    }

    #[tokio::test]
    async fn stops_after_requested_count() {
        let extractor = five_org_listing();
        let search = search_for_all();

        let found = discover(&extractor, &search, &request(3)).await.unwrap().organizations;

        assert_eq!(found.len(), 3);
        assert_eq!(
            found[0],
            DiscoveredOrganization {
                name: "Alpha Aid".into(),
                website: "https://alpha.example".into()
            }
        );
        assert_eq!(found[2].name, "Gamma Trust");
        assert_eq!(search.captured_queries().len(), 3);
    }

    #[tokio::test]
    async fn listing_is_requested_with_limit_one() {
        let extractor = five_org_listing();

        discover(&extractor, &search_for_all(), &request(1)).await.unwrap();

        let calls = extractor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SOURCE);
        assert!(calls[0].1.contains(SOURCE));
        assert_eq!(calls[0].2, 1);
    }

    #[tokio::test]
    async fn returns_fewer_when_source_is_exhausted() {
        let found = discover(&five_org_listing(), &search_for_all(), &request(10))
            .await
            .unwrap().organizations;
        assert_eq!(found.len(), 5);
    }

    #[tokio::test]
    async fn zero_count_makes_no_calls() {
        let extractor = five_org_listing();
        let search = search_for_all();

        let found = discover(&extractor, &search, &request(0)).await.unwrap().organizations;

        assert!(found.is_empty());
        assert!(extractor.calls().is_empty());
        assert!(search.captured_queries().is_empty());
    }

    #[tokio::test]
    async fn empty_listing_yields_nothing() {
        let extractor = MockExtractor::default().with_result(SOURCE, json!({ "names": [] }));

        let found = discover(&extractor, &search_for_all(), &request(3)).await.unwrap().organizations;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn unreachable_source_is_discovery_failure() {
        let extractor = MockExtractor::default().with_failure(SOURCE, 503);

        let err = discover(&extractor, &search_for_all(), &request(3))
            .await
            .unwrap_err();

        assert!(err.to_string().contains(SOURCE));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn failed_lookup_moves_on_to_next_name() {
        let search = MockSearch::default()
            .with_failure("Alpha Aid")
            .with_site("Gamma Trust", "https://gamma.example")
            .with_site("Delta Fund", "https://delta.example");

        let found = discover(&five_org_listing(), &search, &request(2))
            .await
            .unwrap().organizations;

        let names: Vec<&str> = found.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Gamma Trust", "Delta Fund"]);
        assert_eq!(
            search.captured_queries(),
            ["Alpha Aid", "Beta Care", "Gamma Trust", "Delta Fund"]
        );
    }

    #[tokio::test]
    async fn skipped_names_carry_their_reason() {
        let search = MockSearch::default()
            .with_failure("Alpha Aid")
            .with_site("Gamma Trust", "https://gamma.example");

        let discovery = discover(&five_org_listing(), &search, &request(1))
            .await
            .unwrap();

        assert_eq!(discovery.organizations.len(), 1);
        assert_eq!(discovery.skipped.len(), 2);
        assert_eq!(discovery.skipped[0].name, "Alpha Aid");
        assert!(discovery.skipped[0].reason.contains("rate limited"));
        assert_eq!(
            discovery.skipped[1],
            SkippedLookup {
                name: "Beta Care".into(),
                reason: "no website found".into()
            }
        );
    }

    #[tokio::test]
    async fn every_lookup_failing_is_discovery_failure() {
        let search = ["Alpha Aid", "Beta Care", "Gamma Trust", "Delta Fund", "Epsilon Club"]
            .iter()
            .fold(MockSearch::default(), |search, name| search.with_failure(name));

        let err = discover(&five_org_listing(), &search, &request(3))
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::Lookups { attempted: 5, .. }));
        assert_eq!(search.captured_queries().len(), 5);
    }

    #[tokio::test]
    async fn no_results_anywhere_is_not_a_failure() {
        let discovery = discover(&five_org_listing(), &MockSearch::default(), &request(3))
            .await
            .unwrap();

        assert!(discovery.organizations.is_empty());
        assert_eq!(discovery.skipped.len(), 5);
    }

    #[tokio::test]
    async fn query_suffix_is_appended() {
        let search = MockSearch::default().with_site("Alpha Aid BC", "https://alpha.example");
        let req = DiscoveryRequest {
            query_suffix: Some("BC"),
            ..request(1)
        };

        let found = discover(&five_org_listing(), &search, &req).await.unwrap().organizations;

        assert_eq!(found[0].website, "https://alpha.example");
        assert_eq!(search.captured_queries(), ["Alpha Aid BC"]);
    }

    #[test]
    fn names_from_strings_or_objects() {
        let listing = json!({
            "source": "members page",
            "associations": [" Alpha Aid ", { "name": "Beta Care", "city": "Kelowna" }, "", 42, { "title": "x" }]
        });
        let Value::Object(map) = listing else { unreachable!() };

        assert_eq!(organization_names(&map), ["Alpha Aid", "Beta Care"]);
    }

    #[test]
    fn duplicate_names_are_kept() {
        let Value::Object(map) = json!({ "names": ["Same", "Same"] }) else {
            unreachable!()
        };
        assert_eq!(organization_names(&map), ["Same", "Same"]);
    }
}
