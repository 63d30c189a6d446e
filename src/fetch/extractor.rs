use dom_smoothie::{Config, Readability};
use tracing::debug;

pub(super) struct MainContent {
    pub title: Option<String>,
    pub html: String,
    /// True when Readability could not isolate an article and the whole page is used.
    pub used_raw_fallback: bool,
}

/// Isolates the main content of an organization page.
///
/// Non-profit "about" and home pages are often short and navigation-heavy, so
/// Readability frequently judges them unreadable. In that case the full page is
/// kept: contact details tend to live in headers and footers anyway.
pub(super) fn main_content(html: &str, url: Option<&str>) -> MainContent {
    let mut readability = match Readability::new(html, url, Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            debug!(%e, "readability init failed, keeping whole page");
            return whole_page(html);
        }
    };

    if !readability.is_probably_readable() {
        return whole_page(html);
    }

    match readability.parse() {
        Ok(article) => MainContent {
            title: Some(article.title.to_string()).filter(|t| !t.is_empty()),
            html: article.content.to_string(),
            used_raw_fallback: false,
        },
        Err(e) => {
            debug!(%e, "readability parse failed, keeping whole page");
            whole_page(html)
        }
    }
}

fn whole_page(html: &str) -> MainContent {
    MainContent {
        title: title_tag(html),
        html: html.to_string(),
        used_raw_fallback: true,
    }
}

fn title_tag(html: &str) -> Option<String> {
    // to_ascii_lowercase keeps byte offsets aligned with the original.
    let lower = html.to_ascii_lowercase();
    let tag_start = lower.find("<title")?;
    let content_start = tag_start + lower[tag_start..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title>")?;
    let title = html[content_start..content_end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABOUT_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head><title>About Us | Coastal Food Bank</title></head>
<body>
<nav>Home Donate Volunteer Contact</nav>
<article>
    <h1>About the Coastal Food Bank</h1>
    <p>The Coastal Food Bank has served families across the region since 1982.
    We collect surplus food from local farms and grocers and distribute it
    through a network of more than forty partner agencies.</p>
    <p>Our warehouse in Nanaimo handles over two million kilograms of food each
    year. Volunteers sort, pack and deliver hampers every weekday, and our
    school programme provides breakfasts to children in twelve districts.</p>
    <p>We are a registered charity governed by a volunteer board of directors.
    Around thirty staff and several hundred volunteers make the work possible,
    supported by donors, foundations and municipal partners.</p>
    <p>Contact us at info@coastalfoodbank.example or call 250-555-0134 to find
    a distribution site near you or to book a warehouse volunteer shift.</p>
</article>
<footer>Registered charity 123456789 RR0001</footer>
</body>
</html>"#;

    #[test]
    fn isolates_article_body() {
        let content = main_content(ABOUT_HTML, None);

        assert!(!content.used_raw_fallback);
        assert!(content.html.contains("distribution site"));
        assert!(!content.html.contains("<nav>"));
    }

    #[test]
    fn short_page_keeps_everything() {
        let html = "<html><head><title>Tiny Org</title></head><body><p>Call us.</p></body></html>";
        let content = main_content(html, None);

        assert!(content.used_raw_fallback);
        assert!(content.html.contains("Call us."));
        assert_eq!(content.title.as_deref(), Some("Tiny Org"));
    }

    #[test]
    fn title_tag_handles_attributes_and_case() {
        let html = r#"<HTML><HEAD><TITLE lang="fr">Société d'aide</TITLE></HEAD></HTML>"#;
        assert_eq!(title_tag(html).as_deref(), Some("Société d'aide"));
    }

    #[test]
    fn title_tag_missing_or_blank() {
        assert_eq!(title_tag("<html><head></head></html>"), None);
        assert_eq!(title_tag("<title>   </title>"), None);
    }
}
