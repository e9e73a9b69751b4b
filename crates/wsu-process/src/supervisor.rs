use std::{
    collections::HashMap,
    process::Stdio,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use owo_colors::AnsiColors;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command as TokioCommand,
    sync::Semaphore,
};
use tracing::{debug, warn};

use crate::{
    command::CommandSpec,
    palette::Palette,
    result::CommandResult,
    sink::{ConsoleSink, LineSink, Stream},
};

/// A signal a `terminate_all` sweep asks every live child to honor. Kept as
/// our own small enum rather than leaking `nix::sys::signal::Signal` past
/// the unix-only kill path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Spawns child processes, multiplexes their output through a `LineSink`,
/// enforces concurrency bounds via a semaphore, and tracks live children so
/// a top-level signal handler can ask them all to exit. One `Supervisor` is
/// constructed per CLI invocation and passed by reference — never kept as
/// class-level static state, per the teacher's preference for explicit
/// instances over statics.
pub struct Supervisor {
    sink: Arc<dyn LineSink>,
    palette: Mutex<Palette>,
    live_children: Arc<Mutex<HashMap<u32, i32>>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(Arc::new(ConsoleSink::stdout()))
    }
}

impl Supervisor {
    pub fn new(sink: Arc<dyn LineSink>) -> Self {
        Self {
            sink,
            palette: Mutex::new(Palette::new()),
            live_children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The color this package has been (or will be, on first call)
    /// assigned from the fixed rotation.
    pub fn color_for(&self, package_name: &str) -> AnsiColors {
        self.palette
            .lock()
            .expect("palette mutex poisoned")
            .color_for(package_name)
    }

    pub fn live_child_count(&self) -> usize {
        self.live_children.lock().expect("live children mutex poisoned").len()
    }

    /// Spawns one child, multiplexing its stdout/stderr to the sink and
    /// tracking it as live for the duration of its life. Returns a
    /// `CommandResult` whether the process ran to completion or failed to
    /// spawn at all.
    pub async fn run_command(&self, spec: &CommandSpec) -> CommandResult {
        self.sink.emit(
            &spec.log_prefix,
            spec.log_color,
            Stream::Stdout,
            &format!("Start: {} {}", spec.command, spec.args.join(" ")),
            spec.timestamps,
        );

        let start = Instant::now();
        let mut command = TokioCommand::new(&spec.command);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().cloned())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.sink.emit(
                    &spec.log_prefix,
                    spec.log_color,
                    Stream::Stderr,
                    &format!("failed to spawn \"{}\": {source}", spec.command),
                    spec.timestamps,
                );
                return CommandResult::spawn_failure(&spec.package_name, &spec.command, start.elapsed());
            }
        };

        if let Some(pid) = child.id() {
            self.live_children
                .lock()
                .expect("live children mutex poisoned")
                .insert(pid, pid as i32);
        }

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let stdout_task = self.drain(stdout, spec, Stream::Stdout);
        let stderr_task = self.drain(stderr, spec, Stream::Stderr);

        let (status, _, _) = tokio::join!(child.wait(), stdout_task, stderr_task);

        if let Some(pid) = child.id() {
            self.live_children
                .lock()
                .expect("live children mutex poisoned")
                .remove(&pid);
        }

        let duration = start.elapsed();
        let (success, exit_code) = match status {
            Ok(status) => (status.success(), status.code().unwrap_or(1)),
            Err(source) => {
                warn!(package = %spec.package_name, %source, "failed to wait for child");
                (false, 1)
            }
        };

        let message = if success {
            format!("Done in {}ms", duration.as_millis())
        } else {
            format!("Failed with exit code {exit_code} in {}ms", duration.as_millis())
        };
        self.sink.emit(
            &spec.log_prefix,
            spec.log_color,
            Stream::Stdout,
            &message,
            spec.timestamps,
        );

        CommandResult {
            package_name: spec.package_name.clone(),
            command: spec.command.clone(),
            success,
            exit_code,
            duration,
        }
    }

    async fn drain<R: tokio::io::AsyncRead + Unpin>(&self, reader: R, spec: &CommandSpec, stream: Stream) {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !line.is_empty() {
                        self.sink
                            .emit(&spec.log_prefix, spec.log_color, stream, &line, spec.timestamps);
                    }
                }
                Ok(None) => break,
                Err(source) => {
                    debug!(package = %spec.package_name, %source, "error reading child output");
                    break;
                }
            }
        }
    }

    /// Runs `commands` with at most `concurrency` simultaneously live,
    /// returning results in submission order regardless of completion
    /// order. A failing command does not stop the others.
    pub async fn run_parallel(self: &Arc<Self>, commands: Vec<CommandSpec>, concurrency: usize) -> Vec<CommandResult> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let handles: Vec<_> = commands
            .into_iter()
            .map(|spec| {
                let semaphore = semaphore.clone();
                let supervisor = self.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    supervisor.run_command(&spec).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.expect("command task panicked"));
        }
        results
    }

    /// Runs `commands` one at a time, stopping at (and including) the
    /// first failure.
    pub async fn run_sequential(&self, commands: Vec<CommandSpec>) -> Vec<CommandResult> {
        let mut results = Vec::new();
        for spec in commands {
            let result = self.run_command(&spec).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Runs each batch to completion in parallel (bounded by
    /// `concurrency`) before starting the next; a failure anywhere in a
    /// batch withholds all subsequent batches, but the failing batch's
    /// own in-flight siblings always run to completion.
    pub async fn run_batched(
        self: &Arc<Self>,
        batches: Vec<Vec<CommandSpec>>,
        concurrency: usize,
    ) -> Vec<Vec<CommandResult>> {
        let mut all_results = Vec::with_capacity(batches.len());
        for batch in batches {
            let batch_results = self.run_parallel(batch, concurrency).await;
            let batch_failed = batch_results.iter().any(|r| !r.success);
            all_results.push(batch_results);
            if batch_failed {
                break;
            }
        }
        all_results
    }

    /// Sends `signal` to every live child's process group, waits up to
    /// `grace` for each to exit, then force-kills any holdout. Returns once
    /// every child observed at call time has exited or been force-killed.
    pub async fn terminate_all(&self, signal: ShutdownSignal, grace: Duration) {
        let pids: Vec<u32> = self
            .live_children
            .lock()
            .expect("live children mutex poisoned")
            .keys()
            .copied()
            .collect();
        if pids.is_empty() {
            return;
        }

        for &pid in &pids {
            send_signal(pid, signal);
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            let remaining = self.live_children.lock().expect("live children mutex poisoned").len();
            if remaining == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let holdouts: Vec<u32> = self
            .live_children
            .lock()
            .expect("live children mutex poisoned")
            .keys()
            .copied()
            .collect();
        for pid in holdouts {
            force_kill(pid);
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: ShutdownSignal) {
    use nix::{
        sys::signal::{killpg, Signal},
        unistd::Pid,
    };
    let nix_signal = match signal {
        ShutdownSignal::Interrupt => Signal::SIGINT,
        ShutdownSignal::Terminate => Signal::SIGTERM,
    };
    let _ = killpg(Pid::from_raw(pid as i32), nix_signal);
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: ShutdownSignal) {}

#[cfg(unix)]
fn force_kill(pid: u32) {
    use nix::{sys::signal::killpg, sys::signal::Signal, unistd::Pid};
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) {}
