use std::{fs, path::Path, time::UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::entry::{FileIndex, FileRecord};

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    fs::read(path).map(|bytes| hash_bytes(&bytes))
}

/// Hashes `path` (recorded in `index` under `relative`), reusing the stored
/// hash when `(mtime, size)` still matches. Returns `None` if the file can
/// no longer be stat'd — such files silently contribute no hash.
pub fn hash_with_fast_path(path: &Path, relative: &str, index: &mut FileIndex) -> Option<String> {
    let metadata = fs::metadata(path).ok()?;
    let size = metadata.len();
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
    let mtime_secs = since_epoch.as_secs();
    let mtime_nanos = since_epoch.subsec_nanos();

    if let Some(existing) = index.files.get(relative) {
        if existing.size == size && existing.mtime_secs == mtime_secs && existing.mtime_nanos == mtime_nanos {
            return Some(existing.hash.clone());
        }
    }

    let hash = hash_file(path).ok()?;
    index.files.insert(
        relative.to_string(),
        FileRecord {
            mtime_secs,
            mtime_nanos,
            size,
            hash: hash.clone(),
        },
    );
    Some(hash)
}

/// Canonical input-hash composition: the package manifest's byte hash, the
/// sorted `path:hash` list of its source set, and the sorted `name:hash`
/// snapshot of its workspace dependencies (`MISSING` where no entry exists).
pub fn compose_input_hash(
    manifest_hash: &str,
    file_hashes: &[(String, String)],
    dependency_hashes: &[(String, String)],
) -> String {
    let mut files = file_hashes.to_vec();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    let mut deps = dependency_hashes.to_vec();
    deps.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buf = String::new();
    buf.push_str(manifest_hash);
    buf.push('\n');
    buf.push_str(
        &files
            .iter()
            .map(|(path, hash)| format!("{path}:{hash}"))
            .collect::<Vec<_>>()
            .join(","),
    );
    buf.push('\n');
    buf.push_str(
        &deps
            .iter()
            .map(|(name, hash)| format!("{name}:{hash}"))
            .collect::<Vec<_>>()
            .join(","),
    );
    hash_bytes(buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_hash_the_same() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn composition_is_order_independent_in_inputs() {
        let a = compose_input_hash(
            "m",
            &[("b.ts".into(), "2".into()), ("a.ts".into(), "1".into())],
            &[],
        );
        let b = compose_input_hash(
            "m",
            &[("a.ts".into(), "1".into()), ("b.ts".into(), "2".into())],
            &[],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn composition_is_sensitive_to_file_hash_changes() {
        let a = compose_input_hash("m", &[("a.ts".into(), "1".into())], &[]);
        let b = compose_input_hash("m", &[("a.ts".into(), "2".into())], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn composition_is_sensitive_to_dependency_hash_changes() {
        let a = compose_input_hash("m", &[], &[("core".into(), "1".into())]);
        let b = compose_input_hash("m", &[], &[("core".into(), "MISSING".into())]);
        assert_ne!(a, b);
    }
}
