//! Artifact and dump file naming

use crate::archive::Compressor;
use crate::error::{BackupError, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub const DEFAULT_FILENAME_PATTERN: &str = "db_backup_{{ .now }}.{{ .compression }}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Now,
    Compression,
}

/// Parsed artifact filename pattern with `{{ .now }}` and `{{ .compression }}` tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenamePattern {
    raw: String,
    parts: Vec<Part>,
}

impl FilenamePattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                BackupError::config(format!("unterminated token in filename pattern '{}'", raw))
            })?;

            parts.push(match after[..end].trim() {
                ".now" => Part::Now,
                ".compression" => Part::Compression,
                other => {
                    return Err(BackupError::config(format!(
                        "unknown token '{}' in filename pattern '{}'",
                        other, raw
                    )))
                }
            });
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        if parts.is_empty() {
            return Err(BackupError::config("filename pattern must not be empty"));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn render(&self, now: DateTime<Utc>, compressor: Compressor, safechars: bool) -> String {
        let stamp = timestamp(now, safechars);
        self.parts
            .iter()
            .map(|part| match part {
                Part::Literal(text) => text.as_str(),
                Part::Now => stamp.as_str(),
                Part::Compression => compressor.extension(),
            })
            .collect()
    }
}

impl Default for FilenamePattern {
    fn default() -> Self {
        Self {
            raw: DEFAULT_FILENAME_PATTERN.to_string(),
            parts: vec![
                Part::Literal("db_backup_".to_string()),
                Part::Now,
                Part::Literal(".".to_string()),
                Part::Compression,
            ],
        }
    }
}

/// RFC3339 UTC timestamp at second precision; `safechars` swaps `:` for `-`
pub fn timestamp(now: DateTime<Utc>, safechars: bool) -> String {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    if safechars {
        stamp.replace(':', "-")
    } else {
        stamp
    }
}

/// Name of the SQL file inside the archive: `<schema>_<ts>.sql`, or `all_<ts>.sql` for a combined dump
pub fn dump_file_name(schema: Option<&str>, stamp: &str) -> String {
    format!("{}_{}.sql", schema.unwrap_or("all"), stamp)
}
