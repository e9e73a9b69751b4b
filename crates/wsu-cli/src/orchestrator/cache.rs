use std::{fs, path::Path};

use wsu_cache::Cache;
use wsu_repository::WorkspaceInfo;

use crate::error::Error;

use super::is_valid_or_uncached;

pub struct StatusReport {
    pub package_count: usize,
    pub valid_count: usize,
    pub stale_count: usize,
    pub size_bytes: u64,
}

/// `wsu cache status`: how many packages have a cache entry, how many of
/// those are still valid, and the cache's total on-disk size.
pub fn status(workspace: &WorkspaceInfo, cache: &mut Cache) -> Result<StatusReport, Error> {
    let stats = cache.stats();
    let mut valid_count = 0;
    for pkg in &workspace.packages {
        if is_valid_or_uncached(cache, workspace, pkg) {
            valid_count += 1;
        }
    }
    Ok(StatusReport {
        package_count: stats.package_count,
        valid_count,
        stale_count: stats.package_count.saturating_sub(valid_count),
        size_bytes: directory_size(cache.cache_dir()),
    })
}

/// `wsu cache clear`: removes every cached entry.
pub fn clear(cache: &mut Cache) -> Result<(), Error> {
    cache.clear().map_err(Error::from)
}

fn directory_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => directory_size(&entry.path()),
            Ok(_) => entry.metadata().map(|meta| meta.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}
