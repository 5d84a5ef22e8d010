//! Reads the user's cargo manifest: pinned dependency versions and the
//! dependency table the generated crate inherits.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::{Table, Value};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: Table,
}

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(default, rename = "package")]
    packages: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

/// Nearest `Cargo.toml` at or above `start`; `start/Cargo.toml` when there
/// is none, so the caller reports it as missing.
pub fn find_manifest(start: &Path) -> PathBuf {
    let start = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join("Cargo.toml"))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| start.join("Cargo.toml"))
}

/// Version of `dependency` the project builds against.
///
/// The `Cargo.lock` next to the manifest is authoritative; without one the
/// requirement from `Cargo.toml` is used, minus a leading `=` or `^`.
pub fn resolve_version(manifest_path: &Path, dependency: &str) -> Result<String> {
    let manifest = read_manifest(manifest_path)?;

    let lock_path = manifest_path.with_file_name("Cargo.lock");
    if let Ok(text) = fs::read_to_string(&lock_path) {
        let lock: Lockfile = toml::from_str(&text).map_err(|e| Error::ManifestInvalid {
            path: lock_path.clone(),
            reason: e.to_string(),
        })?;
        if let Some(pkg) = lock.packages.iter().find(|p| p.name == dependency) {
            return Ok(pkg.version.clone());
        }
    }

    let requirement = match manifest.dependencies.get(dependency) {
        Some(Value::String(v)) => Some(v.as_str()),
        Some(Value::Table(t)) => t.get("version").and_then(Value::as_str),
        _ => None,
    };
    requirement
        .map(|v| v.trim().trim_start_matches(['=', '^']).trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::DependencyMissing {
            path: manifest_path.to_path_buf(),
            dependency: dependency.to_string(),
        })
}

/// `[dependencies]` of the manifest without `exclude`; relative `path`
/// dependencies are made absolute so they still resolve from the build dir.
pub fn dependencies(manifest_path: &Path, exclude: &str) -> Result<Table> {
    let manifest = read_manifest(manifest_path)?;
    let base = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let base = std::path::absolute(&base).map_err(|e| Error::io(&base, e))?;

    let mut deps = manifest.dependencies;
    deps.remove(exclude);
    for (_, dep) in deps.iter_mut() {
        let Value::Table(t) = dep else { continue };
        if let Some(Value::String(p)) = t.get_mut("path") {
            let path = PathBuf::from(p.as_str());
            if path.is_relative() {
                *p = base.join(path).to_string_lossy().into_owned();
            }
        }
    }
    Ok(deps)
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ManifestMissing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    toml::from_str(&text).map_err(|e| Error::ManifestInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
