use std::fs;

use wsu_repository::WorkspaceInfo;

use crate::error::Error;

use super::resolve_names;

const OUTPUT_DIR_NAMES: [&str; 2] = ["dist", "build"];

pub struct CleanOptions<'a> {
    pub filter: Option<&'a str>,
}

pub struct CleanReport {
    pub cleaned: Vec<String>,
}

/// `wsu clean`: for each selected package, recursively delete
/// `node_modules/` and any `dist/`/`build/` output directories present.
/// Orthogonal to the build cache — `.wsu/` is never touched here.
pub fn clean(workspace: &WorkspaceInfo, options: CleanOptions<'_>) -> Result<CleanReport, Error> {
    let names = resolve_names(workspace, options.filter)?;
    let mut cleaned = Vec::new();
    for name in names {
        let Some(pkg) = workspace.get(&name) else {
            continue;
        };
        let mut removed_any = false;

        let node_modules = pkg.path.join("node_modules");
        if node_modules.is_dir() && fs::remove_dir_all(&node_modules).is_ok() {
            removed_any = true;
        }
        for output_dir in OUTPUT_DIR_NAMES {
            let dir = pkg.path.join(output_dir);
            if dir.is_dir() && fs::remove_dir_all(&dir).is_ok() {
                removed_any = true;
            }
        }

        if removed_any {
            cleaned.push(name);
        }
    }
    Ok(CleanReport { cleaned })
}
