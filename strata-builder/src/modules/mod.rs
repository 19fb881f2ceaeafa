//! Enrichment modules
//!
//! Each module owns a narrow slice of relational fetching and output
//! reshaping for one family of analysis methods. Applicability is a
//! capability set (method ids and/or method-group ids) checked against the
//! site's datasets; the registry iterates modules in one fixed order for
//! `fetch`, then the same order again for `post_process`.
//!
//! A module's `fetch` issues one query per matching analysis entity
//! (fanned out concurrently, joined all-complete) and may follow up on ids
//! discovered in the first round; raw results attach to the entity graph.
//! `post_process` is pure and synchronous: it reshapes the attached rows
//! into data groups and must not touch the database.

pub mod abundance;
pub mod dendro;
pub mod isotope;
pub mod measured_values;

use crate::models::{Dataset, Site};
use sqlx::SqlitePool;
use std::sync::Arc;
use strata_common::Result;

#[async_trait::async_trait]
pub trait EnrichmentModule: Send + Sync {
    /// Module name; also the key raw rows are attached under.
    fn name(&self) -> &'static str;

    /// Method ids this module covers.
    fn method_ids(&self) -> &[i32];

    /// Method-group ids this module covers.
    fn method_group_ids(&self) -> &[i32];

    /// True iff any dataset's method id or method-group id intersects the
    /// module's declared sets.
    fn applies_to(&self, site: &Site) -> bool {
        site.any_dataset_matches(self.method_ids(), self.method_group_ids())
    }

    /// Fetch raw rows for every matching analysis entity and attach them
    /// to the entity graph. May assume samples and datasets exist; must
    /// not assume any module's `post_process` has run.
    async fn fetch(&self, pool: &SqlitePool, site: &mut Site) -> Result<()>;

    /// Reshape attached raw rows into data groups. Pure, no I/O.
    fn post_process(&self, site: &mut Site) -> Result<()>;
}

/// Fixed registration order. `fetch` and `post_process` both run in this
/// order across the whole registry.
pub fn registry() -> Vec<Arc<dyn EnrichmentModule>> {
    vec![
        Arc::new(dendro::DendroModule),
        Arc::new(abundance::AbundanceModule),
        Arc::new(measured_values::MeasuredValuesModule),
        Arc::new(isotope::IsotopeModule),
    ]
}

/// True iff the dataset falls under the module's capability sets.
pub(crate) fn covers_dataset(module: &dyn EnrichmentModule, dataset: &Dataset) -> bool {
    module.method_ids().contains(&dataset.method_id)
        || dataset
            .method_group_id
            .map(|g| module.method_group_ids().contains(&g))
            .unwrap_or(false)
}

/// Analysis-entity ids whose dataset the module covers, in document order.
pub(crate) fn matching_entity_ids(site: &Site, module: &dyn EnrichmentModule) -> Vec<i32> {
    site.analysis_entities()
        .filter(|entity| {
            site.dataset(entity.dataset_id)
                .map(|dataset| covers_dataset(module, dataset))
                .unwrap_or(false)
        })
        .map(|entity| entity.analysis_entity_id)
        .collect()
}

/// Attach one module's raw rows to an analysis entity, keyed by module
/// name so modules never clobber each other.
pub(crate) fn attach_raw(
    site: &mut Site,
    entity_id: i32,
    module_name: &str,
    rows: serde_json::Value,
) {
    for entity in site.analysis_entities_mut() {
        if entity.analysis_entity_id == entity_id {
            let raw = entity
                .raw
                .get_or_insert_with(|| serde_json::Value::Object(Default::default()));
            if let Some(map) = raw.as_object_mut() {
                map.insert(module_name.to_string(), rows);
            }
            return;
        }
    }
}

/// Read back one module's raw rows from an entity.
pub(crate) fn raw_rows<'a>(
    entity_raw: &'a Option<serde_json::Value>,
    module_name: &str,
) -> Option<&'a serde_json::Value> {
    entity_raw.as_ref().and_then(|raw| raw.get(module_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnalysisEntity, Dataset, LookupTables, PhysicalSample, SampleGroup, Site,
    };

    struct NullModule;

    #[async_trait::async_trait]
    impl EnrichmentModule for NullModule {
        fn name(&self) -> &'static str {
            "null"
        }
        fn method_ids(&self) -> &[i32] {
            &[10]
        }
        fn method_group_ids(&self) -> &[i32] {
            &[]
        }
        async fn fetch(&self, _pool: &SqlitePool, _site: &mut Site) -> Result<()> {
            Ok(())
        }
        fn post_process(&self, _site: &mut Site) -> Result<()> {
            Ok(())
        }
    }

    fn site() -> Site {
        Site {
            site_id: 1,
            site_name: "s".into(),
            national_site_identifier: None,
            latitude_dd: None,
            longitude_dd: None,
            description: None,
            biblio: vec![],
            sample_groups: vec![SampleGroup {
                sample_group_id: 1,
                site_id: 1,
                sample_group_name: "g".into(),
                sampling_context: None,
                physical_samples: vec![PhysicalSample {
                    physical_sample_id: 1,
                    sample_group_id: 1,
                    sample_name: "p".into(),
                    sample_type: None,
                    analysis_entities: vec![
                        AnalysisEntity {
                            analysis_entity_id: 100,
                            physical_sample_id: 1,
                            dataset_id: 5,
                            raw: None,
                        },
                        AnalysisEntity {
                            analysis_entity_id: 101,
                            physical_sample_id: 1,
                            dataset_id: 6,
                            raw: None,
                        },
                    ],
                }],
            }],
            datasets: vec![
                Dataset {
                    dataset_id: 5,
                    dataset_name: "covered".into(),
                    method_id: 10,
                    method_group_id: None,
                },
                Dataset {
                    dataset_id: 6,
                    dataset_name: "other".into(),
                    method_id: 99,
                    method_group_id: None,
                },
            ],
            lookup_tables: LookupTables::default(),
            data_groups: vec![],
        }
    }

    #[test]
    fn test_matching_entity_ids_respects_capability_set() {
        let site = site();
        let module = NullModule;
        assert!(module.applies_to(&site));
        assert_eq!(matching_entity_ids(&site, &module), vec![100]);
    }

    #[test]
    fn test_attach_raw_keyed_by_module() {
        let mut site = site();
        attach_raw(&mut site, 100, "a", serde_json::json!([1]));
        attach_raw(&mut site, 100, "b", serde_json::json!([2]));
        let entity = site
            .analysis_entities()
            .find(|e| e.analysis_entity_id == 100)
            .unwrap();
        assert_eq!(raw_rows(&entity.raw, "a"), Some(&serde_json::json!([1])));
        assert_eq!(raw_rows(&entity.raw, "b"), Some(&serde_json::json!([2])));
    }
}
