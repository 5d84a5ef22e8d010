//! Locates and reads the glue-layer template shipped with the `plrs` crate.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::manifest;
use crate::error::{Error, Result};

/// Crate whose source tree carries the template.
pub const RUNTIME_CRATE: &str = "plrs";

/// Template location inside a `plrs` checkout or registry unpack.
const TEMPLATE_PATH: &str = "templates/pl.rs";

/// Where to look for the template, in order.
#[derive(Debug, Clone, Default)]
pub struct TemplateConfig {
    /// Development checkouts; each is probed as `<dir>/plrs/templates/pl.rs`.
    pub search_paths: Vec<PathBuf>,
    /// The user's `Cargo.toml`, used to pin the version in the module cache.
    pub manifest_path: PathBuf,
    /// Cargo home (`$CARGO_HOME`); its `registry/src/*` is the module cache.
    pub module_cache_path: Option<PathBuf>,
}

/// Raw template text.
pub fn read_template(config: &TemplateConfig) -> Result<String> {
    let path = locate_template(config)?;
    debug!("glue template: {}", path.display());
    fs::read_to_string(&path).map_err(|e| Error::io(&path, e))
}

pub fn locate_template(config: &TemplateConfig) -> Result<PathBuf> {
    for dir in &config.search_paths {
        let candidate = dir.join(RUNTIME_CRATE).join(TEMPLATE_PATH);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let version = manifest::resolve_version(&config.manifest_path, RUNTIME_CRATE)?;
    if let Some(cache) = &config.module_cache_path {
        if let Some(found) = find_in_registry(cache, &version) {
            return Ok(found);
        }
    }

    Err(Error::TemplateNotFound {
        crate_name: RUNTIME_CRATE.to_string(),
    })
}

/// `<cache>/registry/src/<index>/plrs-<version>/templates/pl.rs`, for any index.
fn find_in_registry(cache: &Path, version: &str) -> Option<PathBuf> {
    let src = cache.join("registry").join("src");
    let mut indexes: Vec<PathBuf> = fs::read_dir(&src)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    indexes.sort();
    indexes
        .into_iter()
        .map(|index| {
            index
                .join(format!("{RUNTIME_CRATE}-{version}"))
                .join(TEMPLATE_PATH)
        })
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_search_path_first() {
        let root = tempfile::tempdir().unwrap();
        let checkout = root.path().join("src");
        write(&checkout.join("plrs/templates/pl.rs"), "// dev template");

        let config = TemplateConfig {
            search_paths: vec![root.path().join("missing"), checkout],
            // never consulted when a search path hits
            manifest_path: root.path().join("Cargo.toml"),
            module_cache_path: None,
        };
        assert_eq!(read_template(&config).unwrap(), "// dev template");
    }

    #[test]
    fn test_registry_cache_by_pinned_version() {
        let root = tempfile::tempdir().unwrap();
        write(
            &root.path().join("project/Cargo.toml"),
            "[dependencies]\nplrs = \"0.3.0\"\n",
        );
        let cache = root.path().join("cargo");
        write(
            &cache.join("registry/src/index.crates.io-1949cf8c6b5b557f/plrs-0.3.0/templates/pl.rs"),
            "// registry template",
        );

        let config = TemplateConfig {
            search_paths: vec![],
            manifest_path: root.path().join("project/Cargo.toml"),
            module_cache_path: Some(cache),
        };
        assert_eq!(read_template(&config).unwrap(), "// registry template");
    }

    #[test]
    fn test_not_installed() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("Cargo.toml"), "[dependencies]\nplrs = \"0.3.0\"\n");
        let config = TemplateConfig {
            search_paths: vec![],
            manifest_path: root.path().join("Cargo.toml"),
            module_cache_path: Some(root.path().join("no-cache")),
        };
        let err = read_template(&config).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { .. }));
        assert!(err.to_string().contains("cargo add plrs"));
    }
}
