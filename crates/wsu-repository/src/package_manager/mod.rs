mod bun;
mod npm;
mod pnpm;

use std::{fmt, path::Path};

use itertools::Itertools;
use thiserror::Error;
use wax::{Glob, Pattern};

use crate::package_json::PackageJson;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}: no packages found in its workspace declaration")]
    EmptyWorkspace(PackageManager),
    #[error("yaml parsing error in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    PackageJson(#[from] crate::package_json::Error),
    #[error("invalid workspace glob {0}: {1}")]
    Glob(String, #[source] wax::BuildError),
    #[error("no package manager could be detected at {0}; expected a lock file or workspace declaration")]
    NotDetected(String),
}

/// Identity of the JS package manager active for a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Bun,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManager::Npm => write!(f, "npm"),
            PackageManager::Pnpm => write!(f, "pnpm"),
            PackageManager::Bun => write!(f, "bun"),
        }
    }
}

/// A raw (unexpanded) set of workspace glob patterns, split into inclusions
/// and `!`-negated exclusions, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceGlobs {
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
}

impl WorkspaceGlobs {
    pub fn from_patterns<I: IntoIterator<Item = String>>(patterns: I) -> Self {
        let mut inclusions = Vec::new();
        let mut exclusions = Vec::new();
        for pattern in patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => exclusions.push(negated.to_string()),
                None => inclusions.push(pattern),
            }
        }
        Self {
            inclusions,
            exclusions,
        }
    }

    /// Expand these globs against `root`, returning the set of matched
    /// directories (positive matches minus negated matches). A matched
    /// directory missing a manifest is left for the caller to silently skip.
    pub fn expand_directories(&self, root: &Path) -> Result<Vec<std::path::PathBuf>, Error> {
        let include_globs = self
            .inclusions
            .iter()
            .map(|p| Glob::new(p).map_err(|e| Error::Glob(p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_globs = self
            .exclusions
            .iter()
            .map(|p| Glob::new(p).map_err(|e| Error::Glob(p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut matched = Vec::new();
        for glob in &include_globs {
            for entry in glob.walk(root).flatten() {
                if !entry.file_type().is_dir() {
                    continue;
                }
                matched.push(entry.into_path());
            }
        }
        matched.sort();
        matched.dedup();

        matched.retain(|path| {
            let Ok(relative) = path.strip_prefix(root) else {
                return true;
            };
            !exclude_globs.iter().any(|g| g.is_match(relative))
        });
        Ok(matched)
    }
}

/// A confidence score in [0, 3]: one point each for a present lock file, a
/// present native workspace-config file, and a successfully parsed
/// (non-empty) workspace declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Confidence(pub u32);

pub(crate) trait Detector {
    const MANAGER: PackageManager;

    fn lock_file_name() -> &'static str;
    fn workspace_config_name() -> Option<&'static str>;

    /// Read and parse this package manager's workspace declaration,
    /// returning the raw glob patterns (including `!`-negations).
    fn read_workspace_patterns(root: &Path, root_package_json: &PackageJson) -> Option<Vec<String>>;

    fn detect(root: &Path, root_package_json: &PackageJson) -> (PackageManager, Confidence) {
        let mut score = 0u32;
        if root.join(Self::lock_file_name()).is_file() {
            score += 1;
        }
        if let Some(config_name) = Self::workspace_config_name() {
            if root.join(config_name).is_file() {
                score += 1;
            }
        } else {
            // npm/bun declare workspaces inline in package.json, which we
            // already know exists (the loader found it to get this far).
            score += 1;
        }
        match Self::read_workspace_patterns(root, root_package_json) {
            Some(patterns) if !patterns.is_empty() => score += 1,
            _ => {}
        }
        (Self::MANAGER, Confidence(score))
    }
}

impl PackageManager {
    /// Adapters are probed in this fixed preference order; a tie in
    /// confidence score is broken by this order (pnpm first: a
    /// `pnpm-lock.yaml` is the least ambiguous signal of the three).
    pub fn detect(root: &Path, root_package_json: &PackageJson) -> Result<Self, Error> {
        let scored = [
            pnpm::PnpmDetector::detect(root, root_package_json),
            npm::NpmDetector::detect(root, root_package_json),
            bun::BunDetector::detect(root, root_package_json),
        ];

        scored
            .into_iter()
            .max_by_key(|(_, confidence)| *confidence)
            .filter(|(_, confidence)| confidence.0 > 0)
            .map(|(manager, _)| manager)
            .ok_or_else(|| Error::NotDetected(root.display().to_string()))
    }

    pub fn lock_file_name(&self) -> &'static str {
        match self {
            PackageManager::Npm => npm::NpmDetector::lock_file_name(),
            PackageManager::Pnpm => pnpm::PnpmDetector::lock_file_name(),
            PackageManager::Bun => bun::BunDetector::lock_file_name(),
        }
    }

    pub fn workspace_globs(
        &self,
        root: &Path,
        root_package_json: &PackageJson,
    ) -> Result<WorkspaceGlobs, Error> {
        let patterns = match self {
            PackageManager::Npm => npm::NpmDetector::read_workspace_patterns(root, root_package_json),
            PackageManager::Pnpm => {
                pnpm::PnpmDetector::read_workspace_patterns(root, root_package_json)
            }
            PackageManager::Bun => bun::BunDetector::read_workspace_patterns(root, root_package_json),
        }
        .ok_or_else(|| Error::EmptyWorkspace(*self))?;
        if patterns.is_empty() {
            return Err(Error::EmptyWorkspace(*self));
        }
        Ok(WorkspaceGlobs::from_patterns(patterns))
    }

    /// The `(command, args)` pair that invokes a named script through this
    /// package manager.
    pub fn run_command_for(&self, script: &str, extra_args: &[String]) -> (String, Vec<String>) {
        let command = match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
        };
        let mut args = vec!["run".to_string(), script.to_string()];
        if !extra_args.is_empty() {
            args.push("--".to_string());
            args.extend(extra_args.iter().cloned());
        }
        (command.to_string(), args)
    }
}

pub(crate) fn workspaces_from_package_json(root_package_json: &PackageJson) -> Option<Vec<String>> {
    root_package_json
        .workspaces
        .as_ref()
        .map(|w| w.as_ref().iter().cloned().collect_vec())
}
