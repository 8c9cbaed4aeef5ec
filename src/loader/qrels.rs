//! Relevance judgment loader
//!
//! Reads `qrels.tsv`: a header row followed by `query_id<TAB>doc_id<TAB>relevance`
//! rows with integer grades from 0 to [`MAX_GRADE`].

use crate::eval::{Qrels, MAX_GRADE};
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// TSV loader for relevance judgments
pub struct QrelsLoader;

impl QrelsLoader {
    /// Load judgments from a reader; the first line is a header and is skipped
    pub fn load_from_reader<R: Read>(reader: R) -> Result<Qrels> {
        let mut qrels = Qrels::new();

        for (idx, line_result) in BufReader::new(reader).lines().enumerate() {
            let line_number = idx + 1;
            let line = line_result.with_context(|| format!("Failed to read line {}", line_number))?;

            if line_number == 1 {
                continue;
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = trimmed.split('\t').collect();
            let &[query_id, doc_id, relevance] = fields.as_slice() else {
                return Err(anyhow!(
                    "Expected 3 tab-separated fields at line {}, found {}",
                    line_number,
                    fields.len()
                ));
            };

            let grade: u32 = relevance.trim().parse().with_context(|| {
                format!(
                    "Invalid relevance '{}' at line {} (expected a non-negative integer)",
                    relevance, line_number
                )
            })?;
            if grade > MAX_GRADE {
                return Err(anyhow!(
                    "Relevance {} at line {} exceeds the maximum grade {}",
                    grade,
                    line_number,
                    MAX_GRADE
                ));
            }

            qrels.insert(query_id.trim(), doc_id.trim(), grade);
        }

        Ok(qrels)
    }

    /// Load judgments from a string
    pub fn load_from_string(content: &str) -> Result<Qrels> {
        Self::load_from_reader(content.as_bytes())
    }

    /// Load judgments from a file
    pub fn load_from_path(path: &Path) -> Result<Qrels> {
        let file = File::open(path).with_context(|| format!("Failed to open qrels {:?}", path))?;
        let qrels = Self::load_from_reader(file).with_context(|| format!("Failed to load {:?}", path))?;
        tracing::debug!(
            queries = qrels.len(),
            judgments = qrels.num_judgments(),
            "loaded qrels from {:?}",
            path
        );
        Ok(qrels)
    }
}
