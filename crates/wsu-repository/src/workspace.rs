use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

use crate::{
    package_json::PackageJson,
    package_manager::{self, PackageManager},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no workspace root found above {0}: no package.json declaring workspaces, and no package-manager workspace file")]
    WorkspaceNotDetected(String),
    #[error("manifest at {path} failed to parse: {source}")]
    ManifestMalformed {
        path: String,
        #[source]
        source: crate::package_json::Error,
    },
    #[error("manifest at {0} must have a \"name\" field")]
    ManifestInvalid(String),
    #[error(
        "workspace \"{name}\" at {path} already exists at {existing_path}; package names must be unique"
    )]
    DuplicateWorkspace {
        name: String,
        path: String,
        existing_path: String,
    },
    #[error(transparent)]
    PackageManager(#[from] package_manager::Error),
    #[error(transparent)]
    PackageJson(#[from] crate::package_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single workspace member: its declared name, the directory containing
/// its manifest, its scripts, and its workspace-internal dependency names
/// (external dependency names are not retained here; the dependency graph
/// discards them during construction).
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub name: String,
    pub path: PathBuf,
    pub scripts: std::collections::BTreeMap<String, String>,
    pub dependencies: BTreeSet<String>,
    pub dev_dependencies: BTreeSet<String>,
    pub manifest: PackageJson,
}

impl PackageInfo {
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.get(name).is_some_and(|cmd| !cmd.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    pub root: PathBuf,
    pub packages: Vec<PackageInfo>,
    pub index: HashMap<String, usize>,
    pub package_manager: PackageManager,
}

impl WorkspaceInfo {
    pub fn get(&self, name: &str) -> Option<&PackageInfo> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    /// Packages whose `name` matches `glob` (shell-style `*`, `?`, `[...]`).
    pub fn filter_by_name(&self, glob: &str) -> Result<Vec<String>, globset::Error> {
        let matcher = globset::Glob::new(glob)?.compile_matcher();
        Ok(self
            .packages
            .iter()
            .filter(|pkg| matcher.is_match(&pkg.name))
            .map(|pkg| pkg.name.clone())
            .collect())
    }

    /// Splits `names` into those that declare a non-empty `script`, and
    /// those that don't.
    pub fn partition_by_script<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        script: &str,
    ) -> (Vec<String>, Vec<String>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for name in names {
            match self.get(name) {
                Some(pkg) if pkg.has_script(script) => valid.push(name.to_string()),
                _ => invalid.push(name.to_string()),
            }
        }
        (valid, invalid)
    }
}

/// Walks upward from `start` until a directory containing either a
/// `package.json` that declares `workspaces`, or a package-manager-specific
/// workspace file (currently only `pnpm-workspace.yaml`), is found.
pub fn find_root(start: &Path) -> Result<PathBuf, Error> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };

    for ancestor in start.ancestors() {
        let package_json_path = ancestor.join("package.json");
        if ancestor.join("pnpm-workspace.yaml").is_file() && package_json_path.is_file() {
            return Ok(ancestor.to_path_buf());
        }
        if package_json_path.is_file() {
            let Ok(pkg) = PackageJson::load(&package_json_path) else {
                continue;
            };
            if pkg
                .workspaces
                .as_ref()
                .is_some_and(|w| !w.as_ref().is_empty())
            {
                return Ok(ancestor.to_path_buf());
            }
        }
    }

    Err(Error::WorkspaceNotDetected(start.display().to_string()))
}

/// Loads the full workspace rooted at `root`: detects the active package
/// manager, expands its workspace globs, and parses every member manifest.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub fn load(root: &Path) -> Result<WorkspaceInfo, Error> {
    let root_package_json = PackageJson::load(&root.join("package.json"))?;
    let package_manager = PackageManager::detect(root, &root_package_json)?;
    let globs = package_manager.workspace_globs(root, &root_package_json)?;
    let candidate_dirs = globs.expand_directories(root)?;

    let mut packages = Vec::new();
    let mut index = HashMap::new();

    for dir in candidate_dirs {
        let manifest_path = dir.join("package.json");
        if !manifest_path.is_file() {
            debug!(path = %dir.display(), "glob matched a directory without a manifest; skipping");
            continue;
        }
        let manifest = PackageJson::load(&manifest_path).map_err(|source| Error::ManifestMalformed {
            path: manifest_path.display().to_string(),
            source,
        })?;
        let Some(name) = manifest.name.clone() else {
            return Err(Error::ManifestInvalid(manifest_path.display().to_string()));
        };

        if let Some(&existing_idx) = index.get(&name) {
            let existing: &PackageInfo = &packages[existing_idx];
            return Err(Error::DuplicateWorkspace {
                name,
                path: dir.display().to_string(),
                existing_path: existing.path.display().to_string(),
            });
        }

        let dependencies = manifest.dependencies.keys().cloned().collect();
        let dev_dependencies = manifest.dev_dependencies.keys().cloned().collect();
        let scripts = manifest.scripts.clone();

        index.insert(name.clone(), packages.len());
        packages.push(PackageInfo {
            name,
            path: dir,
            scripts,
            dependencies,
            dev_dependencies,
            manifest,
        });
    }

    Ok(WorkspaceInfo {
        root: root.to_path_buf(),
        packages,
        index,
        package_manager,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn scaffold_basic_workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(
            root.join("package.json"),
            r#"{ "name": "root", "workspaces": ["packages/*"] }"#,
        )
        .unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();

        for (name, deps) in [("core", "{}"), ("lib1", r#"{"core":"*"}"#)] {
            let dir = root.join("packages").join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("package.json"),
                format!(
                    r#"{{ "name": "{name}", "scripts": {{"build": "echo build"}}, "dependencies": {deps} }}"#
                ),
            )
            .unwrap();
        }
        tmp
    }

    #[test]
    fn finds_root_from_nested_directory() {
        let tmp = scaffold_basic_workspace();
        let nested = tmp.path().join("packages").join("core");
        let found = find_root(&nested).unwrap();
        assert_eq!(found, tmp.path());
    }

    #[test]
    fn loads_all_members_and_dependencies() {
        let tmp = scaffold_basic_workspace();
        let workspace = load(tmp.path()).unwrap();
        assert_eq!(workspace.packages.len(), 2);
        let lib1 = workspace.get("lib1").unwrap();
        assert!(lib1.dependencies.contains("core"));
        assert_eq!(workspace.package_manager, PackageManager::Npm);
    }

    #[test]
    fn duplicate_names_are_a_load_error() {
        let tmp = scaffold_basic_workspace();
        fs::create_dir_all(tmp.path().join("packages").join("core-dup")).unwrap();
        fs::write(
            tmp.path()
                .join("packages")
                .join("core-dup")
                .join("package.json"),
            r#"{ "name": "core" }"#,
        )
        .unwrap();
        let err = load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateWorkspace { .. }));
    }

    #[test]
    fn directory_without_manifest_is_silently_skipped() {
        let tmp = scaffold_basic_workspace();
        fs::create_dir_all(tmp.path().join("packages").join("empty-dir")).unwrap();
        let workspace = load(tmp.path()).unwrap();
        assert_eq!(workspace.packages.len(), 2);
    }

    #[test]
    fn script_partitioning_separates_missing_scripts() {
        let tmp = scaffold_basic_workspace();
        let workspace = load(tmp.path()).unwrap();
        let names: Vec<&str> = vec!["core", "lib1"];
        let (valid, invalid) = workspace.partition_by_script(names, "build");
        assert_eq!(valid.len(), 2);
        assert!(invalid.is_empty());

        let (valid, invalid) = workspace.partition_by_script(vec!["core"], "nonexistent");
        assert!(valid.is_empty());
        assert_eq!(invalid, vec!["core".to_string()]);
    }
}
