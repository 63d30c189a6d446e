use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::RunConfig;
use crate::extract::prompt::DEFAULT_FIELDS;
use crate::table::{OutputTarget, is_reserved_column, normalize_field_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// DuckDuckGo HTML search (no key needed)
    Ddg,
    /// Google Custom Search (GOOGLE_API_KEY, GOOGLE_CSE_ID)
    Google,
    /// Gemini with Google Search grounding (GEMINI_API_KEY)
    Gemini,
}

/// Find non-profit associations listed on a page, scrape their websites and
/// save the results as a CSV database.
#[derive(Debug, Parser)]
#[command(name = "npscout", version)]
pub struct Args {
    /// Number of associations to process
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub n_associations: u32,

    /// Maximum number of fields to extract from each website
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,

    /// Page listing the associations
    #[arg(short, long)]
    pub source_link: String,

    /// Directory for the timestamped database file
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Write the database to this file instead
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Search engine used to find each association's website
    #[arg(short, long, value_enum, default_value_t = Engine::Ddg)]
    pub engine: Engine,

    /// Field to extract (repeatable); defaults to location, type, description, size, contacts, linkedin
    #[arg(short = 'f', long = "field")]
    pub fields: Vec<String>,

    /// Text appended to every website search, e.g. a province or city
    #[arg(long)]
    pub query_suffix: Option<String>,

    /// Seconds allowed for scraping a single website
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub site_timeout: u64,

    /// Show progress and per-site failures, and print the table when done
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            n_associations: self.n_associations as usize,
            limit: self.limit as usize,
            source_link: self.source_link.clone(),
            fields: self.requested_fields(),
            query_suffix: self
                .query_suffix
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            site_timeout: Duration::from_secs(self.site_timeout),
            verbose: self.verbose,
        }
    }

    pub fn output_target(&self) -> OutputTarget {
        match &self.output {
            Some(file) => OutputTarget::File(file.clone()),
            None => OutputTarget::Directory(self.path.clone()),
        }
    }

    fn requested_fields(&self) -> Vec<String> {
        let raw: Vec<&str> = if self.fields.is_empty() {
            DEFAULT_FIELDS.to_vec()
        } else {
            self.fields.iter().map(String::as_str).collect()
        };

        let mut fields: Vec<String> = Vec::with_capacity(raw.len());
        for field in raw.into_iter().map(normalize_field_name) {
            if !field.is_empty() && !is_reserved_column(&field) && !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}
