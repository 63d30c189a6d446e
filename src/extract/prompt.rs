use crate::fetch::Page;

/// Fields gathered for each organization unless `--field` overrides them.
/// The organization's name and link come from discovery, not from here.
pub const DEFAULT_FIELDS: &[&str] = &[
    "location",
    "type",
    "description",
    "size",
    "contacts",
    "linkedin",
];

/// Page text beyond this many bytes is dropped from the prompt.
const MAX_PAGE_BYTES: usize = 30_000;

fn field_hint(field: &str) -> Option<&'static str> {
    match field {
        "linkedin" => Some("give the link to the LinkedIn page"),
        "type" => Some(
            "the field where the non-profit operates, e.g. health, environment; one or two words",
        ),
        "contacts" => Some("email addresses and phone numbers"),
        "size" => Some("number of staff, volunteers or members, if stated"),
        _ => None,
    }
}

/// Instruction asking for the first `limit` of `fields`.
pub fn organization_instruction(fields: &[String], limit: usize) -> String {
    let requested: Vec<&str> = fields.iter().take(limit).map(String::as_str).collect();

    let mut instruction = format!(
        "Find this information about the non-profit organization: {}.",
        requested.join(", ")
    );
    for field in &requested {
        if let Some(hint) = field_hint(field) {
            instruction.push_str(&format!("\nFor {field}, {hint}."));
        }
    }
    instruction
}

pub fn discovery_instruction(source: &str) -> String {
    format!(
        "Find the names of all the associations listed in the website {source}. \
         Return a JSON object with a single key \"names\" whose value is an array \
         of the association names, in the order they appear on the page."
    )
}

pub(super) fn extraction_prompt(instruction: &str, limit: usize, page: &Page) -> String {
    let end = page.markdown.floor_char_boundary(MAX_PAGE_BYTES);
    let truncated = if end < page.markdown.len() {
        "\n\n(page truncated)"
    } else {
        ""
    };

    format!(
        "You extract structured data from web pages.\n\
         {instruction}\n\n\
         Respond with a single JSON object with at most {limit} top-level keys, \
         using the requested names as keys. Omit anything the page does not state; \
         do not guess.\n\n\
         Page URL: {url}\n\
         Page title: {title}\n\n\
         --- PAGE CONTENT ---\n\
         {content}{truncated}",
        url = page.url,
        title = page.title.as_deref().unwrap_or("(none)"),
        content = &page.markdown[..end],
    )
}
