use std::path::Path;

use super::{workspaces_from_package_json, Detector, PackageManager};
use crate::package_json::PackageJson;

pub(crate) struct NpmDetector;

impl Detector for NpmDetector {
    const MANAGER: PackageManager = PackageManager::Npm;

    fn lock_file_name() -> &'static str {
        "package-lock.json"
    }

    fn workspace_config_name() -> Option<&'static str> {
        None
    }

    fn read_workspace_patterns(_root: &Path, root_package_json: &PackageJson) -> Option<Vec<String>> {
        workspaces_from_package_json(root_package_json)
    }
}
