use std::{collections::HashSet, sync::Arc};

use wsu_cache::Cache;
use wsu_process::Supervisor;
use wsu_repository::{package_graph::DependencyGraph, WorkspaceInfo};

use crate::error::Error;

use super::{command_spec_for, is_valid_or_uncached, resolve_names, warn_on_cache_error, Outcome};

const BUILD_SCRIPT: &str = "build";

pub struct BuildOptions<'a> {
    pub filter: Option<&'a str>,
    pub concurrency: usize,
    pub skip_unchanged: bool,
}

/// `wsu build`: selection closed under dependencies, partitioned by cache
/// validity (unless `skip_unchanged` is false), batched by the dependency
/// sub-graph of the packages left to build, and run batch by batch —
/// updating and invalidating the cache only once each batch completes.
pub async fn build(
    workspace: &WorkspaceInfo,
    cache: &mut Cache,
    supervisor: Arc<Supervisor>,
    options: BuildOptions<'_>,
) -> Result<Outcome, Error> {
    let selected = resolve_names(workspace, options.filter)?;
    let graph = DependencyGraph::build(workspace);
    let mut closed: Vec<String> = graph.filter_with_closure(&selected).into_iter().collect();
    closed.sort();

    let (runnable, skipped) = workspace.partition_by_script(closed.iter().map(String::as_str), BUILD_SCRIPT);
    if !skipped.is_empty() {
        tracing::warn!(packages = ?skipped, "skipping packages without a build script");
    }
    if runnable.is_empty() {
        return Err(Error::NoTarget(BUILD_SCRIPT.to_string()));
    }

    let to_build = if options.skip_unchanged {
        // Walk the closed set in dependency order, eagerly invalidating
        // (removing) the entry of every package found stale. Because a
        // package's input hash snapshots each dependency's *current*
        // `input_hash` (not a transitively-deep hash), a change to `core`
        // only makes `lib1` look stale once `core`'s entry has actually
        // disappeared or been rewritten — so invalidating upstream-first,
        // in the same pass, is what makes staleness flow downstream in one
        // `build` invocation instead of trickling out one rebuild at a time.
        let runnable_set: HashSet<&str> = runnable.iter().map(String::as_str).collect();
        let order: Vec<String> = graph
            .topo_sort()?
            .into_iter()
            .filter(|name| closed.contains(name))
            .collect();

        let mut to_build = Vec::new();
        for name in &order {
            let pkg = workspace.get(name).expect("ordered name is in workspace");
            if is_valid_or_uncached(cache, workspace, pkg) {
                tracing::info!(package = %name, "build cache hit, skipping");
                continue;
            }
            warn_on_cache_error("invalidation", name, cache.invalidate(name));
            if runnable_set.contains(name.as_str()) {
                to_build.push(name.clone());
            }
        }
        to_build
    } else {
        runnable.clone()
    };

    if to_build.is_empty() {
        return Ok(Outcome::default());
    }

    let to_build_set: HashSet<String> = to_build.into_iter().collect();
    let batches = graph.subgraph(&to_build_set).batches()?;

    let mut all_results = Vec::new();
    for batch in batches {
        let commands: Vec<_> = batch
            .iter()
            .map(|name| command_spec_for(&supervisor, workspace, name, BUILD_SCRIPT, &[], false))
            .collect();
        let batch_results = supervisor.run_parallel(commands, options.concurrency).await;

        for result in &batch_results {
            if result.success {
                let pkg = workspace.get(&result.package_name).expect("result package exists in workspace");
                warn_on_cache_error(
                    "recording success",
                    &result.package_name,
                    cache.record_success(workspace, pkg, result.duration),
                );
            }
        }

        let batch_failed = batch_results.iter().any(|r| !r.success);
        all_results.push(batch_results);
        if batch_failed {
            break;
        }
    }

    Ok(Outcome::merge(&all_results))
}
