use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A parsed `package.json`. Unknown fields are preserved in `raw` for
/// diagnostic use, matching the "opaque preserved parse" the workspace model
/// calls for.
#[derive(Debug, Clone, Default)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub scripts: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub package_manager: Option<String>,
    pub workspaces: Option<Workspaces>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(untagged)]
pub enum Workspaces {
    TopLevel(Vec<String>),
    Nested { packages: Vec<String> },
}

impl AsRef<[String]> for Workspaces {
    fn as_ref(&self) -> &[String] {
        match self {
            Workspaces::TopLevel(packages) => packages.as_slice(),
            Workspaces::Nested { packages } => packages.as_slice(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawPackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(rename = "packageManager")]
    package_manager: Option<String>,
    workspaces: Option<Workspaces>,
}

impl PackageJson {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Self, Error> {
        let raw: serde_json::Value =
            serde_json::from_str(contents).map_err(|source| Error::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let parsed: RawPackageJson =
            serde_json::from_str(contents).map_err(|source| Error::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            name: parsed.name,
            version: parsed.version,
            scripts: parsed.scripts,
            dependencies: parsed.dependencies,
            dev_dependencies: parsed.dev_dependencies,
            package_manager: parsed.package_manager,
            workspaces: parsed.workspaces,
            raw,
        })
    }
}
