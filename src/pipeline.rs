use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::browser::Browser;
use crate::config::{Config, LINK_PLACEHOLDER};
use crate::record::Snapshot;
use crate::store::{self, Stamp};
use crate::{extract, harvest, reshape};

/// Outcome of a full run.
pub struct RunSummary {
    pub links: usize,
    pub characters: usize,
    pub failed_pages: usize,
    pub backup: PathBuf,
    pub tables: Vec<PathBuf>,
}

/// Counts from one extraction pass.
pub struct ExtractStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Harvest → pooled extraction → raw backup → reload → reshape.
///
/// The reshape step reads the backup back from disk, so a reshape failure can
/// be retried from the file without scraping again.
pub async fn run(config: &Config, browser: Arc<dyn Browser>) -> Result<RunSummary> {
    let links = harvest::collect_links(browser.as_ref(), &config.listing_url, config.settle).await?;
    let link_count = links.len();

    let (snapshot, stats) = extract_all(Arc::clone(&browser), links, config.workers).await;
    info!(
        "Extracted {} pages ({} ok, {} errors) into {} characters",
        stats.total,
        stats.ok,
        stats.errors,
        snapshot.len()
    );

    let backup = store::create_backup(&config.out_dir, &snapshot)?;
    let rows = store::read_backup(&backup)
        .with_context(|| format!("Failed to reload backup {}", backup.display()))?;

    let tables = reshape::reshape(&rows);
    let written = reshape::write_tables(&config.out_dir, &tables, Stamp::now())?;

    Ok(RunSummary {
        links: link_count,
        characters: snapshot.len(),
        failed_pages: stats.errors,
        backup,
        tables: written,
    })
}

/// Extract every link with at most `workers` sessions open at once.
///
/// All tasks are awaited before anything is merged; results are merged in
/// link order.
pub async fn extract_all(
    browser: Arc<dyn Browser>,
    links: Vec<String>,
    workers: usize,
) -> (Snapshot, ExtractStats) {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));

    let pb = ProgressBar::new(links.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut handles = Vec::with_capacity(links.len());
    for url in links {
        if url == LINK_PLACEHOLDER {
            warn!("Skipping anchor without href");
            pb.inc(1);
            continue;
        }
        let browser = Arc::clone(&browser);
        let sem = Arc::clone(&semaphore);
        let pb = pb.clone();
        let task_url = url.clone();

        let handle = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await?;
            let result = extract::extract_page(browser.as_ref(), &task_url).await;
            pb.inc(1);
            result
        });
        handles.push((url, handle));
    }

    let total = handles.len();
    let mut results = Vec::with_capacity(total);
    let mut errors = 0usize;
    for (url, handle) in handles {
        match handle.await {
            Ok(Ok(snapshot)) => results.push(snapshot),
            Ok(Err(e)) => {
                warn!("Extraction failed for {}: {:#}", url, e);
                errors += 1;
            }
            Err(e) => {
                warn!("Task failed for {}: {}", url, e);
                errors += 1;
            }
        }
    }
    pb.finish_and_clear();

    let stats = ExtractStats {
        total,
        ok: total - errors,
        errors,
    };
    (merge(results), stats)
}

/// Fold per-page snapshots into one; a later page wins a name collision.
pub fn merge(results: impl IntoIterator<Item = Snapshot>) -> Snapshot {
    let mut merged = Snapshot::new();
    for snapshot in results {
        for (name, record) in snapshot {
            if let Some(previous) = merged.insert(name.clone(), record) {
                warn!(
                    "Character '{}' seen twice; {} replaced by a later page",
                    name, previous.url
                );
            }
        }
    }
    merged
}
