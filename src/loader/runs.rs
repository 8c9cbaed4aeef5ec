//! Stored runs
//!
//! `runs.json` maps a system name to a run (query ID -> ranked document IDs).

use super::atomic::write_atomic;
use crate::error::ValidationError;
use crate::eval::Run;
use crate::search::{doc_ids, ReciprocalRankFusion};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Runs of several retrieval systems over the same query set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunSet {
    systems: BTreeMap<String, Run>,
}

impl RunSet {
    /// Create an empty run set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a run set with an empty run for each system
    pub fn with_systems<S: AsRef<str>>(systems: &[S]) -> Self {
        let mut set = Self::new();
        for system in systems {
            set.ensure_system(system.as_ref());
        }
        set
    }

    /// Make sure a (possibly empty) run exists for `system`
    pub fn ensure_system(&mut self, system: &str) {
        self.systems.entry(system.to_string()).or_default();
    }

    /// Record the ranked list of one system for one query
    pub fn insert(&mut self, system: &str, query_id: impl Into<String>, ranked_ids: Vec<String>) {
        self.systems
            .entry(system.to_string())
            .or_default()
            .insert(query_id.into(), ranked_ids);
    }

    /// Replace or add a whole run
    pub fn insert_run(&mut self, system: impl Into<String>, run: Run) {
        self.systems.insert(system.into(), run);
    }

    /// Run of one system
    pub fn get(&self, system: &str) -> Option<&Run> {
        self.systems.get(system)
    }

    /// System names, sorted
    pub fn systems(&self) -> impl Iterator<Item = &String> {
        self.systems.keys()
    }

    /// Iterate over (system, run) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Run)> {
        self.systems.iter()
    }

    /// Whether every listed system has a ranked list for `query_id`
    pub fn has_query_in_all<S: AsRef<str>>(&self, systems: &[S], query_id: &str) -> bool {
        systems.iter().all(|system| {
            self.systems
                .get(system.as_ref())
                .is_some_and(|run| run.contains_key(query_id))
        })
    }

    /// Number of systems
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Check if there are no systems
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Reject ranked lists that contain a document more than once
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (system, run) in &self.systems {
            for (query_id, ranked_ids) in run {
                let mut seen = HashSet::new();
                if let Some(dup) = ranked_ids.iter().find(|id| !seen.insert(id.as_str())) {
                    return Err(ValidationError::DuplicateInRun {
                        system: system.clone(),
                        query_id: query_id.clone(),
                        doc_id: dup.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Fuse stored runs of `systems` into a new run with RRF
    ///
    /// Every query answered by at least one of the systems is fused; a
    /// system without that query contributes an empty list.
    pub fn fuse_systems<S: AsRef<str>>(
        &self,
        systems: &[S],
        rrf: &ReciprocalRankFusion,
        max_out: usize,
    ) -> Result<Run> {
        let runs: Vec<&Run> = systems
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .ok_or_else(|| anyhow!("Unknown system '{}'", name.as_ref()))
            })
            .collect::<Result<_>>()?;

        let query_ids: BTreeSet<&String> = runs.iter().flat_map(|run| run.keys()).collect();
        let empty: Vec<String> = Vec::new();

        let mut fused = Run::new();
        for query_id in query_ids {
            let lists: Vec<&Vec<String>> = runs
                .iter()
                .map(|run| run.get(query_id).unwrap_or(&empty))
                .collect();
            let results = rrf
                .fuse(&lists, max_out)
                .with_context(|| format!("Failed to fuse query '{}'", query_id))?;
            fused.insert(query_id.clone(), doc_ids(&results));
        }
        Ok(fused)
    }

    /// Save the run set as pretty JSON, atomically
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json)
    }

    /// Load a run set and validate it
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runs from {:?}", path))?;

        let runs: RunSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse runs from {:?}", path))?;
        runs.validate()?;
        Ok(runs)
    }
}
