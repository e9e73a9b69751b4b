use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const CACHE_VERSION: u32 = 1;

/// The set of package names the on-disk cache currently has entries for,
/// plus a version tag so an incompatible on-disk layout is discarded rather
/// than misread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub packages: BTreeSet<String>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            packages: BTreeSet::new(),
        }
    }
}
