//! Site document model
//!
//! The denormalized document tree assembled from the relational tables:
//! Site -> SampleGroup -> PhysicalSample -> AnalysisEntity, plus the
//! flattened enrichment output (data groups) and the shared lookup tables.
//!
//! All maps are `BTreeMap` so a document serializes identically every time
//! it is rebuilt from the same rows.

pub mod lookup;

pub use lookup::LookupTables;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Root investigation-site document. One per physical site; built fresh on
/// cache miss and persisted wholesale, never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub site_id: i32,
    pub site_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_site_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude_dd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude_dd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub biblio: Vec<BiblioRef>,
    #[serde(default)]
    pub sample_groups: Vec<SampleGroup>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub lookup_tables: LookupTables,
    #[serde(default)]
    pub data_groups: Vec<DataGroup>,
}

impl Site {
    /// Unique dataset ids referenced by the analysis-entity leaves, in
    /// ascending order. Drives the dataset-grouping fetch stage.
    pub fn leaf_dataset_ids(&self) -> Vec<i32> {
        let mut ids = BTreeSet::new();
        for group in &self.sample_groups {
            for sample in &group.physical_samples {
                for entity in &sample.analysis_entities {
                    ids.insert(entity.dataset_id);
                }
            }
        }
        ids.into_iter().collect()
    }

    pub fn dataset(&self, dataset_id: i32) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.dataset_id == dataset_id)
    }

    /// Iterate every analysis entity in the sample tree.
    pub fn analysis_entities(&self) -> impl Iterator<Item = &AnalysisEntity> {
        self.sample_groups
            .iter()
            .flat_map(|g| g.physical_samples.iter())
            .flat_map(|s| s.analysis_entities.iter())
    }

    pub fn analysis_entities_mut(&mut self) -> impl Iterator<Item = &mut AnalysisEntity> {
        self.sample_groups
            .iter_mut()
            .flat_map(|g| g.physical_samples.iter_mut())
            .flat_map(|s| s.analysis_entities.iter_mut())
    }

    /// True iff any dataset's method id or method-group id intersects the
    /// given capability sets. Used by enrichment-module applicability.
    pub fn any_dataset_matches(&self, method_ids: &[i32], method_group_ids: &[i32]) -> bool {
        self.datasets.iter().any(|d| {
            method_ids.contains(&d.method_id)
                || d.method_group_id
                    .map(|g| method_group_ids.contains(&g))
                    .unwrap_or(false)
        })
    }

    /// Structural cleanup after enrichment: raw fetched rows attached to
    /// the analysis entities are only needed while modules run and are not
    /// part of the persisted document.
    pub fn strip_transient(&mut self) {
        for entity in self.analysis_entities_mut() {
            entity.raw = None;
        }
    }
}

/// Bibliographic reference attached to the site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiblioRef {
    pub biblio_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleGroup {
    pub sample_group_id: i32,
    pub site_id: i32,
    pub sample_group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_context: Option<String>,
    #[serde(default)]
    pub physical_samples: Vec<PhysicalSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalSample {
    pub physical_sample_id: i32,
    pub sample_group_id: i32,
    pub sample_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_type: Option<String>,
    #[serde(default)]
    pub analysis_entities: Vec<AnalysisEntity>,
}

/// The unit of scientific measurement. `raw` temporarily carries the rows a
/// module's fetch stage attached; it is cleared before the document is
/// cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEntity {
    pub analysis_entity_id: i32,
    pub physical_sample_id: i32,
    pub dataset_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// Groups analysis entities produced by one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset_id: i32,
    pub dataset_name: String,
    pub method_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_group_id: Option<i32>,
}

/// Classification of how a measurement was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub method_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_group_id: Option<i32>,
    pub method_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_abbrev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i32>,
}

/// Flattened, chart-ready projection of one dataset's enrichment output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataGroup {
    pub data_group_id: String,
    pub dataset_id: i32,
    pub method_ids: Vec<i32>,
    pub name: String,
    pub values: Vec<DataGroupValue>,
}

/// One keyed value inside a data group, tied to one analysis entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataGroupValue {
    pub analysis_entity_id: i32,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub value_type: ValueType,
    /// Structured payload for complex values (derived estimates etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Simple,
    Complex,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: i32, dataset_id: i32) -> AnalysisEntity {
        AnalysisEntity {
            analysis_entity_id: id,
            physical_sample_id: 1,
            dataset_id,
            raw: Some(serde_json::json!({"rows": []})),
        }
    }

    fn site_with_leaves(leaves: Vec<AnalysisEntity>) -> Site {
        Site {
            site_id: 1,
            site_name: "Test site".to_string(),
            national_site_identifier: None,
            latitude_dd: None,
            longitude_dd: None,
            description: None,
            biblio: vec![],
            sample_groups: vec![SampleGroup {
                sample_group_id: 1,
                site_id: 1,
                sample_group_name: "Group".to_string(),
                sampling_context: None,
                physical_samples: vec![PhysicalSample {
                    physical_sample_id: 1,
                    sample_group_id: 1,
                    sample_name: "Sample".to_string(),
                    sample_type: None,
                    analysis_entities: leaves,
                }],
            }],
            datasets: vec![],
            lookup_tables: LookupTables::default(),
            data_groups: vec![],
        }
    }

    #[test]
    fn test_leaf_dataset_ids_unique_and_sorted() {
        let site = site_with_leaves(vec![leaf(1, 30), leaf(2, 10), leaf(3, 30)]);
        assert_eq!(site.leaf_dataset_ids(), vec![10, 30]);
    }

    #[test]
    fn test_strip_transient_clears_raw() {
        let mut site = site_with_leaves(vec![leaf(1, 10)]);
        assert!(site.analysis_entities().all(|e| e.raw.is_some()));
        site.strip_transient();
        assert!(site.analysis_entities().all(|e| e.raw.is_none()));
    }

    #[test]
    fn test_dataset_capability_match() {
        let mut site = site_with_leaves(vec![]);
        site.datasets.push(Dataset {
            dataset_id: 1,
            dataset_name: "Dendro".to_string(),
            method_id: 10,
            method_group_id: Some(2),
        });
        assert!(site.any_dataset_matches(&[10], &[]));
        assert!(site.any_dataset_matches(&[], &[2]));
        assert!(!site.any_dataset_matches(&[11], &[3]));
    }
}
