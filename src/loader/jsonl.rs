//! JSONL loader
//!
//! Loads records from JSONL format (one JSON object per line), as used by
//! `documents.jsonl` and `queries.jsonl`.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// JSONL loader for reading records from a reader
pub struct JsonlLoader;

impl JsonlLoader {
    /// Load records from a reader
    ///
    /// Each line should be a valid JSON representation of `T`.
    /// Empty lines and lines starting with # are skipped.
    pub fn load_from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
        let buf_reader = BufReader::new(reader);
        let mut records = Vec::new();

        for (idx, line_result) in buf_reader.lines().enumerate() {
            let line_number = idx + 1;
            let line = line_result.with_context(|| format!("Failed to read line {}", line_number))?;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let record: T = serde_json::from_str(trimmed)
                .with_context(|| format!("Failed to parse JSON at line {}: {}", line_number, trimmed))?;

            records.push(record);
        }

        Ok(records)
    }

    /// Load records from a string
    pub fn load_from_string<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
        Self::load_from_reader(content.as_bytes())
    }

    /// Load records from a file
    pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Self::load_from_reader(file).with_context(|| format!("Failed to load {:?}", path))
    }

    /// Count non-empty, non-comment lines without parsing them
    pub fn count_records(path: &Path) -> Result<usize> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                count += 1;
            }
        }
        Ok(count)
    }
}
