//! Abundance-count enrichment
//!
//! Taxon abundance counts per analysis entity, with follow-up fetches for
//! the taxa and abundance elements discovered in the first round.

use super::{attach_raw, covers_dataset, matching_entity_ids, raw_rows, EnrichmentModule};
use crate::models::lookup::{AbundanceElement, Taxon};
use crate::models::{DataGroup, DataGroupValue, Site, ValueType};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use strata_common::Result;
use tracing::debug;

// Membership is maintained here until a methods registry exists; see
// DESIGN.md.
const METHOD_IDS: &[i32] = &[3, 6, 8];
const METHOD_GROUP_IDS: &[i32] = &[1];

pub struct AbundanceModule;

#[derive(Debug, Serialize, Deserialize)]
struct AbundanceRow {
    abundance_id: i32,
    taxon_id: i32,
    abundance_element_id: Option<i32>,
    abundance: i32,
}

#[async_trait::async_trait]
impl EnrichmentModule for AbundanceModule {
    fn name(&self) -> &'static str {
        "abundance"
    }

    fn method_ids(&self) -> &[i32] {
        METHOD_IDS
    }

    fn method_group_ids(&self) -> &[i32] {
        METHOD_GROUP_IDS
    }

    async fn fetch(&self, pool: &SqlitePool, site: &mut Site) -> Result<()> {
        let ids = matching_entity_ids(site, self);
        debug!(site_id = site.site_id, entities = ids.len(), "Fetching abundances");

        let fetched = try_join_all(ids.into_iter().map(|id| fetch_abundances(pool, id))).await?;

        let taxon_ids: BTreeSet<i32> = fetched
            .iter()
            .flat_map(|(_, rows)| rows.iter().map(|r| r.taxon_id))
            .filter(|id| !site.lookup_tables.has_taxon(*id))
            .collect();
        let taxa = try_join_all(taxon_ids.into_iter().map(|id| fetch_taxon(pool, id))).await?;
        for taxon in taxa.into_iter().flatten() {
            site.lookup_tables.add_taxon(taxon);
        }

        let element_ids: BTreeSet<i32> = fetched
            .iter()
            .flat_map(|(_, rows)| rows.iter().filter_map(|r| r.abundance_element_id))
            .filter(|id| !site.lookup_tables.abundance_elements.contains_key(id))
            .collect();
        let elements =
            try_join_all(element_ids.into_iter().map(|id| fetch_element(pool, id))).await?;
        for element in elements.into_iter().flatten() {
            site.lookup_tables.add_abundance_element(element);
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
                let rows: Vec<AbundanceRow> = serde_json::from_value(raw.clone())?;
                for row in rows {
                    values.push(DataGroupValue {
                        analysis_entity_id: entity.analysis_entity_id,
                        key: taxon_label(site, row.taxon_id),
                        value: Some(row.abundance.to_string()),
                        value_type: ValueType::Simple,
                        data: Some(serde_json::json!({
                            "taxon_id": row.taxon_id,
                            "abundance_element_id": row.abundance_element_id,
                        })),
                    });
                }
            }

            if !values.is_empty() {
                groups.push(DataGroup {
                    data_group_id: format!("abundance-{}", dataset.dataset_id),
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

/// Chart label for a taxon, from the lookup tables populated during fetch.
fn taxon_label(site: &Site, taxon_id: i32) -> String {
    match site.lookup_tables.taxa.get(&taxon_id) {
        Some(taxon) => {
            let mut parts = Vec::new();
            if let Some(genus) = &taxon.genus {
                parts.push(genus.as_str());
            }
            if let Some(species) = &taxon.species {
                parts.push(species.as_str());
            }
            if parts.is_empty() {
                taxon.family.clone().unwrap_or_else(|| format!("Taxon {}", taxon_id))
            } else {
                parts.join(" ")
            }
        }
        None => format!("Taxon {}", taxon_id),
    }
}

async fn fetch_abundances(pool: &SqlitePool, entity_id: i32) -> Result<(i32, Vec<AbundanceRow>)> {
    let rows = sqlx::query(
        r#"
        SELECT abundance_id, taxon_id, abundance_element_id, abundance
        FROM abundances
        WHERE analysis_entity_id = ?
        ORDER BY abundance_id
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok((
        entity_id,
        rows.into_iter()
            .map(|row| AbundanceRow {
                abundance_id: row.get("abundance_id"),
                taxon_id: row.get("taxon_id"),
                abundance_element_id: row.get("abundance_element_id"),
                abundance: row.get("abundance"),
            })
            .collect(),
    ))
}

async fn fetch_taxon(pool: &SqlitePool, taxon_id: i32) -> Result<Option<Taxon>> {
    let row = sqlx::query(
        r#"
        SELECT taxon_id, family, genus, species
        FROM taxa
        WHERE taxon_id = ?
        "#,
    )
    .bind(taxon_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Taxon {
        taxon_id: row.get("taxon_id"),
        family: row.get("family"),
        genus: row.get("genus"),
        species: row.get("species"),
    }))
}

async fn fetch_element(pool: &SqlitePool, element_id: i32) -> Result<Option<AbundanceElement>> {
    let row = sqlx::query(
        r#"
        SELECT abundance_element_id, element_name
        FROM abundance_elements
        WHERE abundance_element_id = ?
        "#,
    )
    .bind(element_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| AbundanceElement {
        abundance_element_id: row.get("abundance_element_id"),
        element_name: row.get("element_name"),
    }))
}
