use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use ignore::gitignore::Gitignore;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;
use wsu_repository::{PackageInfo, WorkspaceInfo};

use crate::{
    entry::{CacheEntry, FileIndex},
    error::Error,
    hash,
    manifest::{CacheManifest, CACHE_VERSION},
    source_set,
};

const CACHE_DIR_NAME: &str = ".wsu";
const GITIGNORE_LINE: &str = ".wsu/";
const BUILT_BY: &str = "wsu";

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub package_count: usize,
    pub entry_count: usize,
}

/// Per-workspace build cache, rooted at `<workspace>/.wsu/`. Owns the
/// in-memory mirror of every package's entry and file index; these maps are
/// meant to be driven from a single orchestrating task after each batch
/// completes, never read or written concurrently from worker tasks.
pub struct Cache {
    root: PathBuf,
    cache_dir: PathBuf,
    manifest: CacheManifest,
    entries: HashMap<String, CacheEntry>,
    file_indexes: HashMap<String, FileIndex>,
    ignore_matcher: Option<Gitignore>,
}

impl Cache {
    /// Opens the cache rooted at `workspace_root`, initializing `.wsu/` and
    /// the workspace `.gitignore` entry on first use, and pre-loading every
    /// per-package entry the manifest references.
    #[tracing::instrument(skip_all, fields(root = %workspace_root.display()))]
    pub fn open(workspace_root: &Path) -> Result<Self, Error> {
        let cache_dir = workspace_root.join(CACHE_DIR_NAME);
        let packages_dir = cache_dir.join("packages");
        fs::create_dir_all(&packages_dir).map_err(|source| Error::Io {
            path: packages_dir.display().to_string(),
            source,
        })?;
        ensure_gitignored(workspace_root)?;

        let manifest = load_manifest(&cache_dir);
        let mut entries = HashMap::new();
        let mut file_indexes = HashMap::new();
        for name in &manifest.packages {
            if let Some(entry) = load_entry(&cache_dir, name) {
                entries.insert(name.clone(), entry);
            }
            if let Some(index) = load_file_index(&cache_dir, name) {
                file_indexes.insert(name.clone(), index);
            }
        }

        Ok(Self {
            ignore_matcher: source_set::build_ignore_matcher(workspace_root),
            root: workspace_root.to_path_buf(),
            cache_dir,
            manifest,
            entries,
            file_indexes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.wsu/` directory this cache is rooted at.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join("packages").join(name)
    }

    /// Recomputes `pkg`'s current input hash: manifest bytes, sorted
    /// `path:hash` source-file list, and a sorted `name:hash` snapshot of
    /// its workspace dependencies (the literal `MISSING` where no entry
    /// exists yet). Does not read or mutate the stored entry for `pkg`
    /// itself, only its `FileIndex` fast-path cache.
    pub fn compute_input_hash(&mut self, workspace: &WorkspaceInfo, pkg: &PackageInfo) -> Result<String, Error> {
        let (input_hash, _) = self.compute_input_hash_and_deps(workspace, pkg)?;
        Ok(input_hash)
    }

    /// As `compute_input_hash`, but also returns the sorted `(name,
    /// input_hash)` snapshot of `pkg`'s workspace dependencies that fed
    /// into the hash, for callers that go on to store a `CacheEntry`.
    fn compute_input_hash_and_deps(
        &mut self,
        workspace: &WorkspaceInfo,
        pkg: &PackageInfo,
    ) -> Result<(String, std::collections::BTreeMap<String, String>), Error> {
        let manifest_path = pkg.path.join("package.json");
        let manifest_bytes = fs::read(&manifest_path).map_err(|source| Error::Io {
            path: manifest_path.display().to_string(),
            source,
        })?;
        let manifest_hash = hash::hash_bytes(&manifest_bytes);

        let sources = source_set::collect_source_set(&pkg.path, self.ignore_matcher.as_ref()).map_err(|source| {
            Error::Io {
                path: pkg.path.display().to_string(),
                source,
            }
        })?;
        let index = self.file_indexes.entry(pkg.name.clone()).or_default();
        let mut file_hashes = Vec::with_capacity(sources.len());
        for path in &sources {
            let Ok(relative) = path.strip_prefix(&pkg.path) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if let Some(hash) = hash::hash_with_fast_path(path, &relative, index) {
                file_hashes.push((relative, hash));
            }
        }

        let dependency_hashes: std::collections::BTreeMap<String, String> = pkg
            .dependencies
            .iter()
            .chain(pkg.dev_dependencies.iter())
            .filter(|name| workspace.get(name).is_some())
            .map(|name| {
                let hash = self
                    .entries
                    .get(name)
                    .map(|entry| entry.input_hash.clone())
                    .unwrap_or_else(|| "MISSING".to_string());
                (name.clone(), hash)
            })
            .collect();
        let dependency_hash_pairs: Vec<(String, String)> = dependency_hashes
            .iter()
            .map(|(name, hash)| (name.clone(), hash.clone()))
            .collect();

        let input_hash = hash::compose_input_hash(&manifest_hash, &file_hashes, &dependency_hash_pairs);
        Ok((input_hash, dependency_hashes))
    }

    /// A package is valid in cache iff it has a stored entry and its
    /// freshly recomputed input hash matches.
    pub fn is_valid(&mut self, workspace: &WorkspaceInfo, pkg: &PackageInfo) -> Result<bool, Error> {
        let Some(stored) = self.entries.get(&pkg.name).map(|entry| entry.input_hash.clone()) else {
            return Ok(false);
        };
        let current = self.compute_input_hash(workspace, pkg)?;
        Ok(current == stored)
    }

    /// Records a successful build of `pkg`: persists its freshly computed
    /// input hash, dependency-hash snapshot, and file index, then
    /// invalidates every package that depends on it (directly or
    /// transitively) so they rebuild next time. `build_duration` is the
    /// wall-clock time the triggering script took to run.
    pub fn record_success(
        &mut self,
        workspace: &WorkspaceInfo,
        pkg: &PackageInfo,
        build_duration: Duration,
    ) -> Result<(), Error> {
        let (input_hash, dependency_hashes) = self.compute_input_hash_and_deps(workspace, pkg)?;
        let last_build = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Iso8601::DEFAULT)
            .unwrap_or_default();
        self.entries.insert(
            pkg.name.clone(),
            CacheEntry {
                input_hash,
                dependency_hashes,
                last_build,
                build_duration_ms: build_duration.as_millis() as u64,
                built_by: BUILT_BY.to_string(),
            },
        );
        self.manifest.packages.insert(pkg.name.clone());

        self.persist_entry(&pkg.name)?;
        self.persist_file_index(&pkg.name)?;
        self.persist_manifest()?;

        self.invalidate_dependents(workspace, &pkg.name)
    }

    /// Removes `name`'s stored entry and manifest reference. Its file index
    /// is left on disk as an advisory speedup for the next hash computation.
    pub fn invalidate(&mut self, name: &str) -> Result<(), Error> {
        if self.entries.remove(name).is_none() {
            return Ok(());
        }
        self.manifest.packages.remove(name);
        let entry_path = self.package_dir(name).join("cache.json");
        if entry_path.is_file() {
            fs::remove_file(&entry_path).map_err(|source| Error::Io {
                path: entry_path.display().to_string(),
                source,
            })?;
        }
        self.persist_manifest()
    }

    /// Recursively invalidates every workspace package that lists `name`
    /// (transitively) as a dependency or devDependency. Assumes the
    /// workspace dependency graph is acyclic, as enforced upstream before a
    /// build is dispatched.
    pub fn invalidate_dependents(&mut self, workspace: &WorkspaceInfo, name: &str) -> Result<(), Error> {
        for dependent in direct_dependents(workspace, name) {
            self.invalidate(&dependent)?;
            self.invalidate_dependents(workspace, &dependent)?;
        }
        Ok(())
    }

    /// Removes every per-package cache directory and empties the manifest.
    pub fn clear(&mut self) -> Result<(), Error> {
        let packages_dir = self.cache_dir.join("packages");
        if packages_dir.is_dir() {
            fs::remove_dir_all(&packages_dir).map_err(|source| Error::Io {
                path: packages_dir.display().to_string(),
                source,
            })?;
        }
        fs::create_dir_all(&packages_dir).map_err(|source| Error::Io {
            path: packages_dir.display().to_string(),
            source,
        })?;
        self.entries.clear();
        self.file_indexes.clear();
        self.manifest = CacheManifest::default();
        self.persist_manifest()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            package_count: self.manifest.packages.len(),
            entry_count: self.entries.len(),
        }
    }

    fn persist_manifest(&self) -> Result<(), Error> {
        write_json_atomic(&self.cache_dir.join("manifest.json"), &self.manifest)
    }

    fn persist_entry(&self, name: &str) -> Result<(), Error> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(());
        };
        let dir = self.package_dir(name);
        fs::create_dir_all(&dir).map_err(|source| Error::Io {
            path: dir.display().to_string(),
            source,
        })?;
        write_json_atomic(&dir.join("cache.json"), entry)
    }

    fn persist_file_index(&self, name: &str) -> Result<(), Error> {
        let Some(index) = self.file_indexes.get(name) else {
            return Ok(());
        };
        let dir = self.package_dir(name);
        fs::create_dir_all(&dir).map_err(|source| Error::Io {
            path: dir.display().to_string(),
            source,
        })?;
        write_json_atomic(&dir.join("files.json"), index)
    }
}

fn direct_dependents(workspace: &WorkspaceInfo, name: &str) -> Vec<String> {
    workspace
        .packages
        .iter()
        .filter(|pkg| pkg.dependencies.contains(name) || pkg.dev_dependencies.contains(name))
        .map(|pkg| pkg.name.clone())
        .collect()
}

fn ensure_gitignored(workspace_root: &Path) -> Result<(), Error> {
    let path = workspace_root.join(".gitignore");
    let existing = fs::read_to_string(&path).unwrap_or_default();
    if existing
        .lines()
        .any(|line| matches!(line.trim(), ".wsu/" | ".wsu" | "/.wsu/" | "/.wsu"))
    {
        return Ok(());
    }
    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(GITIGNORE_LINE);
    updated.push('\n');
    fs::write(&path, updated).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

fn load_manifest(cache_dir: &Path) -> CacheManifest {
    let path = cache_dir.join("manifest.json");
    let Ok(contents) = fs::read_to_string(&path) else {
        return CacheManifest::default();
    };
    match serde_json::from_str::<CacheManifest>(&contents) {
        Ok(manifest) if manifest.version == CACHE_VERSION => manifest,
        Ok(_) => {
            warn!(path = %path.display(), "cache manifest version mismatch; starting fresh");
            CacheManifest::default()
        }
        Err(_) => {
            warn!(path = %path.display(), "cache manifest corrupt; starting fresh");
            CacheManifest::default()
        }
    }
}

fn load_entry(cache_dir: &Path, name: &str) -> Option<CacheEntry> {
    let path = cache_dir.join("packages").join(name).join("cache.json");
    serde_json::from_str(&fs::read_to_string(path).ok()?).ok()
}

fn load_file_index(cache_dir: &Path, name: &str) -> Option<FileIndex> {
    let path = cache_dir.join("packages").join(name).join("files.json");
    serde_json::from_str(&fs::read_to_string(path).ok()?).ok()
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let dir = path.parent().expect("cache file path has a parent");
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().expect("cache file path has a name").to_string_lossy()
    ));
    let json = serde_json::to_vec_pretty(value).map_err(|source| Error::Serde {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(&tmp_path, json).map_err(|source| Error::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use wsu_repository::workspace;

    use super::*;

    fn scaffold(tmp: &TempDir) {
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
                format!(r#"{{ "name": "{name}", "dependencies": {deps} }}"#),
            )
            .unwrap();
            fs::write(dir.join("index.ts"), "export {}").unwrap();
        }
    }

    #[test]
    fn initializing_appends_gitignore_line_once() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        Cache::open(tmp.path()).unwrap();
        Cache::open(tmp.path()).unwrap();
        let contents = fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert_eq!(contents.matches(".wsu/").count(), 1);
    }

    #[test]
    fn input_hash_is_deterministic_with_no_changes() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        let workspace = workspace::load(tmp.path()).unwrap();
        let mut cache = Cache::open(tmp.path()).unwrap();
        let pkg = workspace.get("core").unwrap();
        let first = cache.compute_input_hash(&workspace, pkg).unwrap();
        let second = cache.compute_input_hash(&workspace, pkg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn input_hash_changes_when_a_source_file_changes() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        let workspace = workspace::load(tmp.path()).unwrap();
        let mut cache = Cache::open(tmp.path()).unwrap();
        let pkg = workspace.get("core").unwrap();
        let before = cache.compute_input_hash(&workspace, pkg).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(pkg.path.join("index.ts"), "export const x = 1;").unwrap();
        let after = cache.compute_input_hash(&workspace, pkg).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn record_success_then_is_valid_until_a_change() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        let workspace = workspace::load(tmp.path()).unwrap();
        let mut cache = Cache::open(tmp.path()).unwrap();
        let pkg = workspace.get("core").unwrap();

        cache.record_success(&workspace, pkg, Duration::from_millis(1)).unwrap();
        assert!(cache.is_valid(&workspace, pkg).unwrap());

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(pkg.path.join("index.ts"), "export const x = 2;").unwrap();
        assert!(!cache.is_valid(&workspace, pkg).unwrap());
    }

    #[test]
    fn recording_success_invalidates_dependents() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        let workspace = workspace::load(tmp.path()).unwrap();
        let mut cache = Cache::open(tmp.path()).unwrap();

        let core = workspace.get("core").unwrap();
        let lib1 = workspace.get("lib1").unwrap();
        cache.record_success(&workspace, lib1, Duration::from_millis(1)).unwrap();
        assert!(cache.is_valid(&workspace, lib1).unwrap());

        cache.record_success(&workspace, core, Duration::from_millis(1)).unwrap();
        assert!(!cache.is_valid(&workspace, lib1).unwrap());
    }

    #[test]
    fn record_success_snapshots_dependency_hashes_and_build_metadata() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        let workspace = workspace::load(tmp.path()).unwrap();
        let mut cache = Cache::open(tmp.path()).unwrap();

        let core = workspace.get("core").unwrap();
        cache.record_success(&workspace, core, Duration::from_millis(5)).unwrap();
        let core_hash = cache.entries.get("core").unwrap().input_hash.clone();

        let lib1 = workspace.get("lib1").unwrap();
        cache.record_success(&workspace, lib1, Duration::from_millis(42)).unwrap();

        let lib1_entry = cache.entries.get("lib1").unwrap();
        assert_eq!(lib1_entry.dependency_hashes.get("core"), Some(&core_hash));
        assert_eq!(lib1_entry.build_duration_ms, 42);
        assert_eq!(lib1_entry.built_by, "wsu");
        assert!(!lib1_entry.last_build.is_empty());
    }

    #[test]
    fn clear_empties_every_entry() {
        let tmp = TempDir::new().unwrap();
        scaffold(&tmp);
        let workspace = workspace::load(tmp.path()).unwrap();
        let mut cache = Cache::open(tmp.path()).unwrap();
        let pkg = workspace.get("core").unwrap();
        cache.record_success(&workspace, pkg, Duration::from_millis(1)).unwrap();
        assert_eq!(cache.stats().entry_count, 1);

        cache.clear().unwrap();
        assert_eq!(cache.stats().entry_count, 0);
        assert!(!cache.is_valid(&workspace, pkg).unwrap());
    }
}
