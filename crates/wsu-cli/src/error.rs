use thiserror::Error;

/// Errors surfaced at the orchestrator boundary. Every component error gets
/// converted here rather than leaking crate-specific variants to `main`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Workspace(#[from] wsu_repository::workspace::Error),
    #[error(transparent)]
    Graph(#[from] wsu_repository::package_graph::Error),
    #[error(transparent)]
    Cache(#[from] wsu_cache::Error),
    #[error(transparent)]
    Glob(#[from] globset::Error),
    #[error("no package in the selected set declares a \"{0}\" script")]
    NoTarget(String),
}

/// Exit-code mapping: `0` success, `1` task/runtime failure, `2` setup
/// failure (argument parsing and workspace detection happen before any
/// package runs, so those land here).
pub enum ExitKind {
    Success,
    Failure,
    SetupFailure,
}

impl Error {
    pub fn exit_kind(&self) -> ExitKind {
        match self {
            Error::Workspace(_) | Error::Glob(_) | Error::NoTarget(_) => ExitKind::SetupFailure,
            // A cycle is only found once packages have been selected and
            // their graph built, not during argument parsing or workspace
            // detection, so it's a fatal run failure rather than a setup one.
            Error::Graph(_) | Error::Cache(_) => ExitKind::Failure,
        }
    }
}

impl ExitKind {
    pub fn code(&self) -> i32 {
        match self {
            ExitKind::Success => 0,
            ExitKind::Failure => 1,
            ExitKind::SetupFailure => 2,
        }
    }
}
