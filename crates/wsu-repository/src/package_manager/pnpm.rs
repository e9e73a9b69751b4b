use std::path::Path;

use serde::Deserialize;

use super::{Detector, PackageManager};
use crate::package_json::PackageJson;

pub(crate) struct PnpmDetector;

#[derive(Debug, Deserialize, Default)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}

impl Detector for PnpmDetector {
    const MANAGER: PackageManager = PackageManager::Pnpm;

    fn lock_file_name() -> &'static str {
        "pnpm-lock.yaml"
    }

    fn workspace_config_name() -> Option<&'static str> {
        Some("pnpm-workspace.yaml")
    }

    fn read_workspace_patterns(root: &Path, _root_package_json: &PackageJson) -> Option<Vec<String>> {
        let contents = std::fs::read_to_string(root.join("pnpm-workspace.yaml")).ok()?;
        let workspace: PnpmWorkspace = serde_yaml::from_str(&contents).ok()?;
        Some(workspace.packages)
    }
}
