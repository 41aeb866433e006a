use log::{debug, info, warn};
use std::collections::HashSet;

use crate::name_matching::{format_name, normalize_name, similarity};
use crate::tabular::{Table, TabularSource};

// Positional contract of the AFAS HR export
const EMPLOYEE_COLUMN: usize = 1; // B
const STATUS_COLUMN: usize = 2; // C
const ORG_UNIT_COLUMN: usize = 11; // L
const MIN_HR_COLUMNS: usize = 12;

const ACTIVE_STATUS: &str = "in dienst";

/// Outcome of looking a name up in the mapping. `score` is the best score
/// seen, also when no label was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgUnitMatch {
    pub label: Option<String>,
    pub score: f64,
}

/// Normalized employee name → organizational-unit label. Insertion order is
/// kept so ties during lookup resolve to the first entry.
#[derive(Debug, Clone, Default)]
pub struct OrgUnitMapping {
    entries: Vec<(String, String)>,
    keys: HashSet<String>,
}

impl OrgUnitMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a mapping unless the key already exists. Returns whether it was added.
    pub fn insert(&mut self, normalized_name: String, label: String) -> bool {
        if !self.keys.insert(normalized_name.clone()) {
            return false;
        }
        self.entries.push((normalized_name, label));
        true
    }

    #[cfg(test)]
    pub fn get(&self, normalized_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == normalized_name)
            .map(|(_, label)| label.as_str())
    }

    /// Builds the mapping from the HR export rows whose status is "in dienst".
    pub fn from_hr_table(table: &Table) -> Self {
        let mut mapping = OrgUnitMapping::default();

        if table.column_count() < MIN_HR_COLUMNS {
            warn!(
                "HR export has too few columns (expected at least {}, found {}); skipping org-unit enrichment",
                MIN_HR_COLUMNS,
                table.column_count()
            );
            return mapping;
        }

        let headers = table.headers();
        info!("Using column '{}' for employee names", headers[EMPLOYEE_COLUMN]);
        info!("Using column '{}' for employment status", headers[STATUS_COLUMN]);
        info!("Using column '{}' for org-unit labels", headers[ORG_UNIT_COLUMN]);

        let mut active_rows = 0;
        for row in table.rows() {
            let is_active = row
                .text(STATUS_COLUMN)
                .map(|status| status.to_lowercase().contains(ACTIVE_STATUS))
                .unwrap_or(false);
            if !is_active {
                continue;
            }
            active_rows += 1;

            let (Some(employee), Some(label)) = (row.text(EMPLOYEE_COLUMN), row.text(ORG_UNIT_COLUMN))
            else {
                continue;
            };
            let Some(formatted) = format_name(Some(employee)) else {
                continue;
            };
            let key = normalize_name(Some(&formatted));
            if key.is_empty() {
                continue;
            }
            if !mapping.insert(key, label.to_string()) {
                debug!("Keeping first org unit for duplicate employee '{}'", formatted);
            }
        }

        info!(
            "Filtered on '{}': {} of {} HR rows kept",
            ACTIVE_STATUS,
            active_rows,
            table.row_count()
        );
        info!("{} employee -> org-unit mappings built", mapping.len());
        mapping
    }

    /// Best-scoring label for `name`, accepted when the score reaches `min_similarity`.
    pub fn resolve(&self, name: &str, min_similarity: f64) -> OrgUnitMatch {
        let target = normalize_name(Some(name));
        if target.is_empty() || self.entries.is_empty() {
            return OrgUnitMatch { label: None, score: 0.0 };
        }

        let mut best: Option<&str> = None;
        let mut best_score = 0.0;
        for (key, label) in &self.entries {
            let score = similarity(&target, key);
            if score > best_score {
                best_score = score;
                best = Some(label.as_str());
            }
        }

        OrgUnitMatch {
            label: best.filter(|_| best_score >= min_similarity).map(str::to_string),
            score: best_score,
        }
    }
}

/// Reads the HR export. Any failure degrades to an empty mapping.
pub fn load_org_unit_mapping(source: &dyn TabularSource) -> OrgUnitMapping {
    info!("Reading HR export {} for org-unit labels...", source.describe());
    match source.read_table() {
        Ok(table) => OrgUnitMapping::from_hr_table(&table),
        Err(e) => {
            warn!("Could not read HR export: {}; continuing without org units", e);
            OrgUnitMapping::default()
        }
    }
}

/// Decides whether a matched label replaces the unit already on a record:
/// an empty unit is always filled, an existing one only on a high-confidence match.
pub fn merge_org_unit(
    existing: Option<String>,
    matched: &str,
    score: f64,
    override_similarity: f64,
) -> Option<String> {
    let existing_is_empty = existing.as_deref().map_or(true, |e| e.trim().is_empty());
    if existing_is_empty || score >= override_similarity {
        Some(matched.to_string())
    } else {
        existing
    }
}
