//! Dendrochronology enrichment
//!
//! Fetches keyed dendro measurement rows per analysis entity, resolves the
//! dating labs they reference into the site lookup tables, and reshapes
//! the rows into one data group per dataset. Each entity's series also
//! yields the four derived germination/felling estimates as complex
//! values.

use super::{attach_raw, covers_dataset, matching_entity_ids, raw_rows, EnrichmentModule};
use crate::dating::{self, keys, DendroSeries, FellingYear};
use crate::models::lookup::DatingLab;
use crate::models::{DataGroup, DataGroupValue, Site, ValueType};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use strata_common::Result;
use tracing::debug;

// Membership is maintained here until a methods registry exists; see
// DESIGN.md.
const METHOD_IDS: &[i32] = &[10];
const METHOD_GROUP_IDS: &[i32] = &[];

pub struct DendroModule;

#[derive(Debug, Serialize, Deserialize)]
struct MeasurementRow {
    key: String,
    value: Option<String>,
    dating_lab_id: Option<i32>,
}

#[async_trait::async_trait]
impl EnrichmentModule for DendroModule {
    fn name(&self) -> &'static str {
        "dendro"
    }

    fn method_ids(&self) -> &[i32] {
        METHOD_IDS
    }

    fn method_group_ids(&self) -> &[i32] {
        METHOD_GROUP_IDS
    }

    async fn fetch(&self, pool: &SqlitePool, site: &mut Site) -> Result<()> {
        let ids = matching_entity_ids(site, self);
        debug!(site_id = site.site_id, entities = ids.len(), "Fetching dendro measurements");

        let fetched = try_join_all(ids.into_iter().map(|id| fetch_measurements(pool, id))).await?;

        // Follow-up fetch for dating labs discovered in the first round;
        // lookups are checked first so population stays idempotent.
        let lab_ids: BTreeSet<i32> = fetched
            .iter()
            .flat_map(|(_, rows)| rows.iter().filter_map(|r| r.dating_lab_id))
            .filter(|id| !site.lookup_tables.dating_labs.contains_key(id))
            .collect();
        let labs = try_join_all(lab_ids.into_iter().map(|id| fetch_lab(pool, id))).await?;
        for lab in labs.into_iter().flatten() {
            site.lookup_tables.add_dating_lab(lab);
        }

        for (entity_id, rows) in fetched {
            attach_raw(site, entity_id, self.name(), serde_json::to_value(rows)?);
        }
        Ok(())
    }

    fn post_process(&self, site: &mut Site) -> Result<()> {
        let mut groups = Vec::new();

        for dataset in &site.datasets {
            if !covers_dataset(self, dataset) {
                continue;
            }

            let mut values = Vec::new();
            for entity in site.analysis_entities() {
                if entity.dataset_id != dataset.dataset_id {
                    continue;
                }
                let Some(raw) = raw_rows(&entity.raw, self.name()) else {
                    continue;
                };
                let rows: Vec<MeasurementRow> = serde_json::from_value(raw.clone())?;

                let mut series = DendroSeries::new();
                for row in &rows {
                    let Some(value) = &row.value else { continue };
                    if row.key == keys::ESTIMATED_FELLING_YEAR {
                        series.set_felling(parse_felling(value));
                    } else {
                        series.insert(row.key.clone(), value.clone());
                    }
                    values.push(DataGroupValue {
                        analysis_entity_id: entity.analysis_entity_id,
                        key: row.key.clone(),
                        value: Some(value.clone()),
                        value_type: ValueType::Simple,
                        data: None,
                    });
                }

                for (key, estimate) in [
                    ("Oldest germination year", dating::oldest_germination_year(&series)),
                    ("Youngest germination year", dating::youngest_germination_year(&series)),
                    ("Oldest felling year", dating::oldest_felling_year(&series)),
                    ("Youngest felling year", dating::youngest_felling_year(&series)),
                ] {
                    values.push(DataGroupValue {
                        analysis_entity_id: entity.analysis_entity_id,
                        key: key.to_string(),
                        value: estimate.value.map(|v| v.to_string()),
                        value_type: ValueType::Complex,
                        data: Some(serde_json::to_value(&estimate)?),
                    });
                }
            }

            if !values.is_empty() {
                groups.push(DataGroup {
                    data_group_id: format!("dendro-{}", dataset.dataset_id),
                    dataset_id: dataset.dataset_id,
                    method_ids: vec![dataset.method_id],
                    name: dataset.dataset_name.clone(),
                    values,
                });
            }
        }

        site.data_groups.extend(groups);
        Ok(())
    }
}

/// The felling-year measurement value is either a structured record or a
/// bare year, which then counts as the older bound.
fn parse_felling(raw: &str) -> FellingYear {
    if let Ok(felling) = serde_json::from_str::<FellingYear>(raw) {
        return felling;
    }
    FellingYear {
        older: raw.trim().parse().ok(),
        ..Default::default()
    }
}

async fn fetch_measurements(
    pool: &SqlitePool,
    entity_id: i32,
) -> Result<(i32, Vec<MeasurementRow>)> {
    let rows = sqlx::query(
        r#"
        SELECT measurement_key, measurement_value, dating_lab_id
        FROM dendro_measurements
        WHERE analysis_entity_id = ?
        ORDER BY measurement_key
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok((
        entity_id,
        rows.into_iter()
            .map(|row| MeasurementRow {
                key: row.get("measurement_key"),
                value: row.get("measurement_value"),
                dating_lab_id: row.get("dating_lab_id"),
            })
            .collect(),
    ))
}

async fn fetch_lab(pool: &SqlitePool, lab_id: i32) -> Result<Option<DatingLab>> {
    let row = sqlx::query(
        r#"
        SELECT lab_id, lab_name, country
        FROM dating_labs
        WHERE lab_id = ?
        "#,
    )
    .bind(lab_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| DatingLab {
        lab_id: row.get("lab_id"),
        lab_name: row.get("lab_name"),
        country: row.get("country"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_felling_bare_year() {
        let felling = parse_felling("1200");
        assert_eq!(felling.older, Some(1200));
        assert!(felling.younger.is_none());
    }

    #[test]
    fn test_parse_felling_structured_record() {
        let felling = parse_felling(r#"{"older":1200,"younger":1230,"uncertainty":"ca"}"#);
        assert_eq!(felling.older, Some(1200));
        assert_eq!(felling.younger, Some(1230));
        assert_eq!(felling.uncertainty.as_deref(), Some("ca"));
    }

    #[test]
    fn test_parse_felling_garbage_is_empty_record() {
        let felling = parse_felling("unknown");
        assert!(felling.older.is_none() && felling.younger.is_none());
    }
}
