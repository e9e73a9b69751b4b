use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

const EXCLUDED_DIR_NAMES: [&str; 3] = ["node_modules", ".git", ".wsu"];
const BATCH_SIZE: usize = 50;

/// Builds a VCS-ignore matcher rooted at `workspace_root`. Returns `None`
/// when no usable ignore rules can be loaded (e.g. not a VCS checkout), in
/// which case callers should treat every candidate file as included.
pub fn build_ignore_matcher(workspace_root: &Path) -> Option<Gitignore> {
    let mut builder = GitignoreBuilder::new(workspace_root);
    let gitignore_path = workspace_root.join(".gitignore");
    if gitignore_path.is_file() {
        builder.add(gitignore_path);
    }
    builder.build().ok()
}

/// The source set for one package directory: every file under
/// `package_dir` except the conventionally-excluded directories, further
/// filtered through `matcher` in batches of `BATCH_SIZE` paths.
pub fn collect_source_set(package_dir: &Path, matcher: Option<&Gitignore>) -> std::io::Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    walk(package_dir, &mut candidates)?;

    let Some(matcher) = matcher else {
        return Ok(candidates);
    };

    let mut kept = Vec::with_capacity(candidates.len());
    for batch in candidates.chunks(BATCH_SIZE) {
        for path in batch {
            if !matcher.matched_path_or_any_parents(path, false).is_ignore() {
                kept.push(path.clone());
            }
        }
    }
    Ok(kept)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if EXCLUDED_DIR_NAMES.contains(&file_name.to_string_lossy().as_ref()) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn excludes_conventional_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        fs::write(tmp.path().join("node_modules").join("x.js"), "x").unwrap();
        fs::write(tmp.path().join("index.ts"), "export {}").unwrap();

        let found = collect_source_set(tmp.path(), None).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("index.ts"));
    }

    #[test]
    fn gitignored_files_are_excluded_when_matcher_present() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "ignored.txt\n").unwrap();
        fs::write(tmp.path().join("ignored.txt"), "x").unwrap();
        fs::write(tmp.path().join("kept.txt"), "y").unwrap();

        let matcher = build_ignore_matcher(tmp.path()).unwrap();
        let found = collect_source_set(tmp.path(), Some(&matcher)).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"kept.txt".to_string()));
        assert!(!names.contains(&"ignored.txt".to_string()));
    }

    #[test]
    fn files_under_an_ignored_directory_are_excluded() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "ignored/\n").unwrap();
        fs::create_dir_all(tmp.path().join("ignored")).unwrap();
        fs::write(tmp.path().join("ignored").join("scratch.txt"), "x").unwrap();
        fs::write(tmp.path().join("kept.txt"), "y").unwrap();

        let matcher = build_ignore_matcher(tmp.path()).unwrap();
        let found = collect_source_set(tmp.path(), Some(&matcher)).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"kept.txt".to_string()));
        assert!(!names.contains(&"scratch.txt".to_string()));
    }
}
