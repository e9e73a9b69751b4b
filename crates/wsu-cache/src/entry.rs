use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A package's stored cache result: the input hash its last successful build
/// was computed against, a snapshot of the dependency hashes that hash was
/// composed from, and bookkeeping about that build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub input_hash: String,
    pub dependency_hashes: BTreeMap<String, String>,
    pub last_build: String,
    pub build_duration_ms: u64,
    pub built_by: String,
}

/// One tracked file's stat snapshot and content hash, used to skip rehashing
/// unchanged files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub mtime_secs: u64,
    pub mtime_nanos: u32,
    pub size: u64,
    pub hash: String,
}

/// A package's per-file hash cache, keyed by path relative to the package
/// directory with `/` separators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileIndex {
    pub files: BTreeMap<String, FileRecord>,
}
