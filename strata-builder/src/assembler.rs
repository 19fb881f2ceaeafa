//! Site assembly orchestration
//!
//! Walks the relational schema into the nested site document through a
//! fixed stage sequence: base row, bibliography, sample tree, dataset
//! grouping, method resolution, per-module enrichment fetch, per-module
//! post-processing, structural cleanup, cache write. Each stage may depend
//! on the previous; enrichment modules require samples and datasets to
//! already exist.
//!
//! Any relational failure aborts the whole assembly with no partial cache
//! write. A missing base row short-circuits to `Ok(None)` before any later
//! stage runs.

use crate::cache::CacheStore;
use crate::db;
use crate::models::Site;
use crate::modules::{registry, EnrichmentModule};
use futures::future::try_join_all;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_common::Result;
use tracing::{debug, info};

/// Per-call assembly options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    /// Skip the cache read and rebuild unconditionally.
    pub no_cache: bool,
    /// Accept cached documents regardless of their source version.
    pub ignore_version: bool,
}

pub struct SiteAssembler {
    pool: SqlitePool,
    cache: CacheStore,
    collection: String,
    modules: Vec<Arc<dyn EnrichmentModule>>,
}

impl SiteAssembler {
    /// Assembler over the default module registry.
    pub fn new(pool: SqlitePool, cache: CacheStore, collection: impl Into<String>) -> Self {
        Self::with_modules(pool, cache, collection, registry())
    }

    pub fn with_modules(
        pool: SqlitePool,
        cache: CacheStore,
        collection: impl Into<String>,
        modules: Vec<Arc<dyn EnrichmentModule>>,
    ) -> Self {
        Self {
            pool,
            cache,
            collection: collection.into(),
            modules,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fetch one assembled site document. Cache hit returns immediately;
    /// otherwise the full stage sequence runs and the result replaces
    /// whatever the cache held. `Ok(None)` when the site does not exist.
    pub async fn get_site(&self, site_id: i32, opts: AssembleOptions) -> Result<Option<Site>> {
        if !opts.no_cache {
            if let Some(site) = self
                .cache
                .get::<Site>(&self.collection, site_id, opts.ignore_version)
                .await?
            {
                debug!(site_id, "Cache hit");
                return Ok(Some(site));
            }
        }

        let Some(site) = self.assemble(site_id).await? else {
            return Ok(None);
        };

        self.cache.put(&self.collection, site_id, &site).await?;
        info!(site_id, data_groups = site.data_groups.len(), "Site document assembled");
        Ok(Some(site))
    }

    /// Delete every cached site document.
    pub async fn flush_cache(&self) -> Result<u64> {
        let flushed = self.cache.flush(&self.collection).await?;
        info!(flushed, "Cache flushed");
        Ok(flushed)
    }

    async fn assemble(&self, site_id: i32) -> Result<Option<Site>> {
        // Stage 1: base row; absence ends the assembly here.
        let Some(mut site) = db::sites::fetch_site_row(&self.pool, site_id).await? else {
            debug!(site_id, "Site not found");
            return Ok(None);
        };

        // Stage 2: bibliography.
        site.biblio = db::sites::fetch_biblio(&self.pool, site_id).await?;

        // Stage 3: sample tree. Sibling sub-fetches fan out concurrently
        // with an all-complete join before the next level attaches.
        let mut groups = db::samples::fetch_sample_groups(&self.pool, site_id).await?;
        let sample_sets = try_join_all(
            groups
                .iter()
                .map(|g| db::samples::fetch_physical_samples(&self.pool, g.sample_group_id)),
        )
        .await?;
        for (group, samples) in groups.iter_mut().zip(sample_sets) {
            group.physical_samples = samples;
        }
        for group in &mut groups {
            let entity_sets = try_join_all(
                group
                    .physical_samples
                    .iter()
                    .map(|s| db::samples::fetch_analysis_entities(&self.pool, s.physical_sample_id)),
            )
            .await?;
            for (sample, entities) in group.physical_samples.iter_mut().zip(entity_sets) {
                sample.analysis_entities = entities;
            }
        }
        site.sample_groups = groups;

        // Stage 4: dataset grouping from the leaves.
        let dataset_ids = site.leaf_dataset_ids();
        let datasets = try_join_all(
            dataset_ids
                .iter()
                .map(|&id| db::datasets::fetch_dataset(&self.pool, id)),
        )
        .await?;
        site.datasets = datasets.into_iter().flatten().collect();

        // Stage 5: method and unit resolution into the lookup tables.
        let method_ids: BTreeSet<i32> = site.datasets.iter().map(|d| d.method_id).collect();
        let methods = try_join_all(
            method_ids
                .iter()
                .map(|&id| db::datasets::fetch_method(&self.pool, id)),
        )
        .await?;
        let mut unit_ids = BTreeSet::new();
        for method in methods.into_iter().flatten() {
            if let Some(unit_id) = method.unit_id {
                unit_ids.insert(unit_id);
            }
            site.lookup_tables.add_method(method);
        }
        let units = try_join_all(
            unit_ids
                .iter()
                .filter(|id| !site.lookup_tables.has_unit(**id))
                .map(|&id| db::datasets::fetch_unit(&self.pool, id)),
        )
        .await?;
        for unit in units.into_iter().flatten() {
            site.lookup_tables.add_unit(unit);
        }

        // Stage 6: enrichment fetch, fixed registration order. A failure
        // anywhere in a module's fan-out aborts the assembly.
        for module in &self.modules {
            if module.applies_to(&site) {
                debug!(site_id, module = module.name(), "Running enrichment fetch");
                module.fetch(&self.pool, &mut site).await?;
            }
        }

        // Stage 7: post-processing, same order. Pure reshaping only.
        for module in &self.modules {
            if module.applies_to(&site) {
                module.post_process(&mut site)?;
            }
        }

        // Stage 8: structural cleanup before the document is persisted.
        site.strip_transient();

        Ok(Some(site))
    }
}
