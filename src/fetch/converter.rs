use super::extractor::MainContent;

/// A downloaded page reduced to Markdown, ready to be embedded in a prompt.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
    pub used_raw_fallback: bool,
}

pub(super) fn to_page(content: MainContent, url: String) -> Page {
    let markdown = html2md::rewrite_html(&content.html, false);

    Page {
        url,
        title: content.title,
        markdown: collapse_blank_lines(&markdown),
        used_raw_fallback: content.used_raw_fallback,
    }
}

/// Whole-page fallbacks leave long runs of empty lines where scripts and
/// layout divs used to be; they only waste prompt budget.
fn collapse_blank_lines(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;

    for line in markdown.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.trim().to_string()
}
