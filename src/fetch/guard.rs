//! URL checks applied before and after every page download.
//!
//! Search results are untrusted input, so a discovered "website" must not be
//! able to point the scraper at loopback or private-network services.

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::warn;
use url::{Host, Url};

use super::FetchError;

const INTERNAL_SUFFIXES: &[&str] = &[".localhost", ".local", ".internal"];

pub(super) fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidScheme);
    }

    let internal = parsed.host().is_none_or(|host| host_is_internal(&host));
    if internal {
        warn!(url = %raw, "refusing to fetch internal/private host");
        return Err(FetchError::InternalHost);
    }
    Ok(parsed)
}

fn host_is_internal(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || INTERNAL_SUFFIXES.iter().any(|s| domain.ends_with(s))
        }
        Host::Ipv4(v4) => ipv4_is_internal(*v4),
        Host::Ipv6(v6) => ipv6_is_internal(*v6),
    }
}

fn ipv4_is_internal(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn ipv6_is_internal(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fe80::/10 link-local, fc00::/7 unique local
        || first & 0xffc0 == 0xfe80
        || first & 0xfe00 == 0xfc00
        || ip.to_ipv4_mapped().is_some_and(ipv4_is_internal)
}
