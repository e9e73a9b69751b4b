mod cli;
mod error;
mod orchestrator;
mod ui;

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wsu_process::Supervisor;

use cli::{CacheAction, Cli, Commands};
use error::{Error, ExitKind};
use orchestrator::{build, cache, clean, dev, run, Outcome};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    install_tracing(cli.verbose);
    let ascii = cli.ascii;

    match run_command(cli).await {
        Ok(outcome) => {
            print_outcome(ascii, outcome);
            let code = if outcome.failed > 0 {
                ExitKind::Failure.code()
            } else {
                ExitKind::Success.code()
            };
            ExitCode::from(code as u8)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_kind().code() as u8)
        }
    }
}

fn install_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "wsu_cli=info,wsu_cache=info,wsu_process=info,wsu_repository=info",
        1 => "wsu_cli=debug,wsu_cache=debug,wsu_process=debug,wsu_repository=debug",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_command(cli: Cli) -> Result<Outcome, Error> {
    let root = wsu_repository::workspace::find_root(&std::env::current_dir().expect("current dir must be readable"))?;
    let workspace = wsu_repository::workspace::load(&root)?;
    let supervisor = Arc::new(Supervisor::default());

    match cli.command {
        Commands::Run {
            script,
            filter,
            concurrency,
            sequential,
        } => {
            run::run(
                &workspace,
                supervisor,
                run::RunOptions {
                    script: &script,
                    filter: filter.as_deref(),
                    concurrency,
                    sequential,
                },
            )
            .await
        }
        Commands::Build {
            filter,
            concurrency,
            no_skip_unchanged,
        } => {
            let mut wsu_cache = wsu_cache::Cache::open(&root)?;
            build::build(
                &workspace,
                &mut wsu_cache,
                supervisor,
                build::BuildOptions {
                    filter: filter.as_deref(),
                    concurrency,
                    skip_unchanged: !no_skip_unchanged,
                },
            )
            .await
        }
        Commands::Dev { filter, concurrency } => {
            dev::dev(
                &workspace,
                supervisor,
                dev::DevOptions {
                    filter: filter.as_deref(),
                    concurrency,
                },
            )
            .await
        }
        Commands::Clean { filter } => {
            let report = clean::clean(&workspace, clean::CleanOptions { filter: filter.as_deref() })?;
            tracing::info!(cleaned = ?report.cleaned, "clean complete");
            Ok(Outcome::default())
        }
        Commands::Cache { action } => {
            let mut wsu_cache = wsu_cache::Cache::open(&root)?;
            match action.unwrap_or(CacheAction::Status) {
                CacheAction::Status => {
                    let report = cache::status(&workspace, &mut wsu_cache)?;
                    println!(
                        "{} packages cached, {} valid, {} stale, {} bytes on disk",
                        report.package_count, report.valid_count, report.stale_count, report.size_bytes
                    );
                }
                CacheAction::Clear => {
                    cache::clear(&mut wsu_cache)?;
                    println!("cache cleared");
                }
            }
            Ok(Outcome::default())
        }
    }
}

fn print_outcome(ascii: bool, outcome: Outcome) {
    if outcome.succeeded == 0 && outcome.failed == 0 {
        return;
    }
    let symbols = ui::SymbolSet::resolve(ascii);
    println!(
        "{}",
        ui::render_summary(symbols, outcome.succeeded, outcome.failed, outcome.duration)
    );
}
