//! Database assembly: organization records in, one CSV table out.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::debug;

pub const NAME_COLUMN: &str = "name";
pub const LINK_COLUMN: &str = "link";

/// `name` and `link` always come from discovery, never from extraction.
pub fn is_reserved_column(field: &str) -> bool {
    field == NAME_COLUMN || field == LINK_COLUMN
}

/// `"Phone Number"` and `"phone-number"` both become `phone_number`.
pub fn normalize_field_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("could not create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV write failed: {0}")]
    Io(#[from] io::Error),
}

/// One scraped organization. Field names are unique and never reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRecord {
    pub name: String,
    pub link: String,
    pub fields: Vec<(String, String)>,
}

impl OrganizationRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            NAME_COLUMN => Some(&self.name),
            LINK_COLUMN => Some(&self.link),
            _ => self
                .fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<OrganizationRecord>,
}

impl Table {
    /// Columns are `name`, `link`, then every field name in first-seen order.
    pub fn from_records(records: Vec<OrganizationRecord>) -> Self {
        let mut columns = vec![NAME_COLUMN.to_string(), LINK_COLUMN.to_string()];
        for record in &records {
            for (field, _) in &record.fields {
                if !columns.contains(field) {
                    columns.push(field.clone());
                }
            }
        }
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cell values in column order; missing fields are empty strings.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.records.iter().map(|record| {
            self.columns
                .iter()
                .map(|column| record.field(column).unwrap_or(""))
                .collect()
        })
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), TableError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in self.rows() {
            csv_writer.write_record(&row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), TableError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| TableError::Create {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| TableError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        self.write_csv(file)?;
        debug!(path = %path.display(), rows = self.len(), "table written");
        Ok(())
    }
}

/// Where the table goes: an explicit file, or a timestamped file in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Directory(PathBuf),
    File(PathBuf),
}

impl OutputTarget {
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        match self {
            OutputTarget::File(path) => path.clone(),
            OutputTarget::Directory(dir) => {
                dir.join(format!("associations_{}.csv", now.format("%y%m%d-%H%M")))
            }
        }
    }
}
