//! Bounded-concurrency batch regeneration
//!
//! Regenerates many site documents through the assembler with a hard
//! in-flight ceiling. Permits are acquired in strict FIFO order before a
//! task starts; completions are unordered. One item's failure is logged,
//! counted, and its slot freed; the batch always runs to the end.

use crate::assembler::{AssembleOptions, SiteAssembler};
use crate::db;
use std::sync::Arc;
use strata_common::Result;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Outcome counts for one batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
    pub missing: usize,
}

pub struct BatchScheduler {
    concurrency: usize,
}

impl BatchScheduler {
    /// `concurrency` is the in-flight ceiling; never exceeded.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Rebuild every id in queue order. Each item bypasses the cache read;
    /// the rebuilt document replaces the cached one.
    pub async fn run(&self, assembler: Arc<SiteAssembler>, ids: Vec<i32>) -> BatchReport {
        let total = ids.len();
        info!(total, concurrency = self.concurrency, "Batch regeneration started");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);

        for site_id in ids {
            // Acquiring here, before spawn, keeps task starts strictly FIFO
            // and caps in-flight work at the permit count.
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let assembler = Arc::clone(&assembler);
            handles.push(tokio::spawn(async move {
                let result = assembler
                    .get_site(site_id, AssembleOptions { no_cache: true, ignore_version: false })
                    .await;
                drop(permit);
                (site_id, result)
            }));
        }

        let mut report = BatchReport::default();
        for handle in handles {
            match handle.await {
                Ok((_, Ok(Some(_)))) => report.completed += 1,
                Ok((site_id, Ok(None))) => {
                    warn!(site_id, "Site vanished during batch regeneration");
                    report.missing += 1;
                }
                Ok((site_id, Err(e))) => {
                    warn!(site_id, error = %e, "Site regeneration failed");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Batch task panicked");
                    report.failed += 1;
                }
            }
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            missing = report.missing,
            "Batch regeneration finished"
        );
        report
    }
}

/// Regenerate all known sites, optionally flushing the cache first.
pub async fn preload(
    assembler: Arc<SiteAssembler>,
    concurrency: usize,
    flush_first: bool,
) -> Result<BatchReport> {
    if flush_first {
        assembler.flush_cache().await?;
    }
    let ids = db::sites::all_site_ids(assembler.pool()).await?;
    Ok(BatchScheduler::new(concurrency).run(assembler, ids).await)
}
