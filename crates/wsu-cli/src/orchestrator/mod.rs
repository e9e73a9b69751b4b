pub mod build;
pub mod cache;
pub mod clean;
pub mod dev;
pub mod run;

use std::time::Duration;

use wsu_cache::Cache;
use wsu_process::{CommandResult, CommandSpec, Supervisor};
use wsu_repository::{PackageInfo, WorkspaceInfo};

use crate::error::Error;

/// `cache-io-error` (§7) is non-fatal: a disk failure while checking
/// validity makes the package look uncached for this invocation rather
/// than aborting it.
pub(crate) fn is_valid_or_uncached(cache: &mut Cache, workspace: &WorkspaceInfo, pkg: &PackageInfo) -> bool {
    match cache.is_valid(workspace, pkg) {
        Ok(valid) => valid,
        Err(error) => {
            tracing::warn!(package = %pkg.name, %error, "cache I/O error checking validity; treating package as uncached");
            false
        }
    }
}

/// As `is_valid_or_uncached`, but for the invalidate/record-success paths:
/// a write failure is logged and swallowed rather than aborting the build.
pub(crate) fn warn_on_cache_error(context: &str, package_name: &str, result: Result<(), wsu_cache::Error>) {
    if let Err(error) = result {
        tracing::warn!(package = %package_name, %error, "cache I/O error during {context}; package treated as uncached");
    }
}

/// Resolves `--filter` against the workspace: every package name if absent,
/// else every name matching the shell glob.
pub(crate) fn resolve_names(workspace: &WorkspaceInfo, filter: Option<&str>) -> Result<Vec<String>, Error> {
    match filter {
        None => Ok(workspace.packages.iter().map(|pkg| pkg.name.clone()).collect()),
        Some(glob) => Ok(workspace.filter_by_name(glob)?),
    }
}

/// Environment forwarded to every child: `FORCE_COLOR` unconditionally so
/// colorized tool output survives non-tty piping, `NODE_ENV` only if the
/// parent process has one set.
pub(crate) fn child_env() -> Vec<(String, String)> {
    let mut env = vec![("FORCE_COLOR".to_string(), "1".to_string())];
    if let Ok(node_env) = std::env::var("NODE_ENV") {
        env.push(("NODE_ENV".to_string(), node_env));
    }
    env
}

pub(crate) fn command_spec_for(
    supervisor: &Supervisor,
    workspace: &WorkspaceInfo,
    package_name: &str,
    script: &str,
    extra_args: &[String],
    timestamps: bool,
) -> CommandSpec {
    let pkg = workspace
        .get(package_name)
        .expect("package_name came from this workspace");
    let (command, args) = workspace.package_manager.run_command_for(script, extra_args);
    CommandSpec::new(package_name, command, args, pkg.path.clone())
        .with_env(child_env())
        .with_color(supervisor.color_for(package_name))
        .with_timestamps(timestamps)
}

/// Aggregate result of a driver run, used by the UI summary line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Outcome {
    pub succeeded: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl Outcome {
    pub fn from_results(results: &[CommandResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        let duration = results.iter().map(|r| r.duration).max().unwrap_or_default();
        Self {
            succeeded,
            failed,
            duration,
        }
    }

    pub fn merge(results: &[Vec<CommandResult>]) -> Self {
        Self::from_results(&results.iter().flatten().cloned().collect::<Vec<_>>())
    }
}
