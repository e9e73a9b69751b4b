use std::{sync::Arc, time::Duration};

use wsu_process::{ShutdownSignal, Supervisor};
use wsu_repository::WorkspaceInfo;

use crate::error::Error;

use super::{command_spec_for, resolve_names, Outcome};

const DEV_SCRIPT: &str = "dev";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct DevOptions<'a> {
    pub filter: Option<&'a str>,
    pub concurrency: usize,
}

/// `wsu dev`: every selected package declaring `dev`, run in parallel with
/// timestamps off, until SIGINT/SIGTERM triggers a graceful shutdown of the
/// whole process-group tree.
pub async fn dev(workspace: &WorkspaceInfo, supervisor: Arc<Supervisor>, options: DevOptions<'_>) -> Result<Outcome, Error> {
    let names = resolve_names(workspace, options.filter)?;
    let (runnable, skipped) = workspace.partition_by_script(names.iter().map(String::as_str), DEV_SCRIPT);
    if !skipped.is_empty() {
        tracing::warn!(packages = ?skipped, "skipping packages without a dev script");
    }
    if runnable.is_empty() {
        return Err(Error::NoTarget(DEV_SCRIPT.to_string()));
    }

    let commands: Vec<_> = runnable
        .iter()
        .map(|name| command_spec_for(&supervisor, workspace, name, DEV_SCRIPT, &[], false))
        .collect();

    run_until_signal(supervisor, commands, options.concurrency).await
}

#[cfg(unix)]
async fn run_until_signal(
    supervisor: Arc<Supervisor>,
    commands: Vec<wsu_process::CommandSpec>,
    concurrency: usize,
) -> Result<Outcome, Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    let run = supervisor.run_parallel(commands, concurrency);
    tokio::pin!(run);

    tokio::select! {
        results = &mut run => Ok(Outcome::from_results(&results)),
        _ = interrupt.recv() => {
            supervisor.terminate_all(ShutdownSignal::Interrupt, SHUTDOWN_GRACE).await;
            Ok(Outcome::default())
        }
        _ = terminate.recv() => {
            supervisor.terminate_all(ShutdownSignal::Terminate, SHUTDOWN_GRACE).await;
            Ok(Outcome::default())
        }
    }
}

#[cfg(not(unix))]
async fn run_until_signal(
    supervisor: Arc<Supervisor>,
    commands: Vec<wsu_process::CommandSpec>,
    concurrency: usize,
) -> Result<Outcome, Error> {
    let results = supervisor.run_parallel(commands, concurrency).await;
    Ok(Outcome::from_results(&results))
}
