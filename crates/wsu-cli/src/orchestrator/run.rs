use std::sync::Arc;

use wsu_process::Supervisor;
use wsu_repository::WorkspaceInfo;

use crate::error::Error;

use super::{command_spec_for, resolve_names, Outcome};

pub struct RunOptions<'a> {
    pub script: &'a str,
    pub filter: Option<&'a str>,
    pub concurrency: usize,
    pub sequential: bool,
}

/// `wsu run <script>`: every selected package declaring `script`, dispatched
/// in parallel (bounded by `concurrency`) or sequentially.
pub async fn run(workspace: &WorkspaceInfo, supervisor: Arc<Supervisor>, options: RunOptions<'_>) -> Result<Outcome, Error> {
    let names = resolve_names(workspace, options.filter)?;
    let (runnable, skipped) = workspace.partition_by_script(names.iter().map(String::as_str), options.script);
    if !skipped.is_empty() {
        tracing::warn!(packages = ?skipped, script = options.script, "skipping packages without this script");
    }
    if runnable.is_empty() {
        return Err(Error::NoTarget(options.script.to_string()));
    }

    let commands: Vec<_> = runnable
        .iter()
        .map(|name| command_spec_for(&supervisor, workspace, name, options.script, &[], false))
        .collect();

    let results = if options.sequential {
        supervisor.run_sequential(commands).await
    } else {
        supervisor.run_parallel(commands, options.concurrency).await
    };

    Ok(Outcome::from_results(&results))
}
