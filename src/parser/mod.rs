//! Source analyzer: reads the user's package directory, checks that it is a
//! single `cdylib` package, merges its files into one tree and lists the
//! exported functions.

mod functions;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use syn::{AttrStyle, Attribute, Expr, Item, Lit, Meta, Visibility};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{FunctionDescriptor, SourcePackage};

pub use functions::describe_function;

/// The crate type a package must declare to build into a loadable module.
pub const ENTRY_CRATE_TYPE: &str = "cdylib";

/// Top-level functions the generated glue supplies itself.
pub const ENTRY_POINT_FUNCTIONS: &[&str] = &["main", "Pg_magic_func"];

const TEST_SUFFIX: &str = "_test.rs";

/// Files that only hold tests never reach the generated module.
pub fn is_test_file(name: &str) -> bool {
    name.ends_with(TEST_SUFFIX) || name == "tests.rs"
}

/// Parses `dir` and extracts one descriptor per exported function, in
/// declaration order.
pub fn analyze(dir: &Path) -> Result<(SourcePackage, Vec<FunctionDescriptor>)> {
    let package = load_package(dir)?;
    let functions = collect_functions(&package.tree)?;
    info!(
        "{} exported function(s) in {}",
        functions.len(),
        package.dir.display()
    );
    Ok((package, functions))
}

/// Parses every non-test `*.rs` file of `dir` and merges them.
pub fn load_package(dir: &Path) -> Result<SourcePackage> {
    let files = source_files(dir)?;
    if files.is_empty() {
        return Err(Error::EmptyPackage {
            dir: dir.to_path_buf(),
        });
    }

    let mut parsed = Vec::with_capacity(files.len());
    for path in &files {
        let src = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let file = syn::parse_file(&src).map_err(|source| Error::Parse {
            path: path.clone(),
            source,
        })?;
        debug!("parsed {} ({} items)", path.display(), file.items.len());
        parsed.push(file);
    }

    check_package(dir, &parsed)?;

    for (path, file) in files.iter().zip(&parsed) {
        for item in &file.items {
            if let Item::Mod(m) = item {
                if m.content.is_none() {
                    return Err(Error::UnsupportedItem {
                        path: path.clone(),
                        what: format!("out-of-line module `mod {};`", m.ident),
                    });
                }
            }
        }
    }

    let doc = parsed
        .iter()
        .map(|f| functions::doc_text(&f.attrs))
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(SourcePackage {
        dir: dir.to_path_buf(),
        files,
        tree: merge(parsed),
        doc,
    })
}

/// Sorted `*.rs` files directly inside `dir`, test files excluded.
fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".rs") || is_test_file(name) || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Exactly one `#![crate_type]` value across all files, and it must be `cdylib`.
fn check_package(dir: &Path, parsed: &[syn::File]) -> Result<()> {
    let found: BTreeSet<String> = parsed
        .iter()
        .flat_map(|f| f.attrs.iter().filter_map(crate_type))
        .collect();

    if found.len() > 1 {
        return Err(Error::MultiplePackages {
            dir: dir.to_path_buf(),
            found: found.into_iter().collect(),
        });
    }
    match found.into_iter().next() {
        Some(kind) if kind == ENTRY_CRATE_TYPE => Ok(()),
        other => Err(Error::NotEntryPackage {
            dir: dir.to_path_buf(),
            found: other,
        }),
    }
}

/// Value of an inner `#![crate_type = "..."]` attribute.
pub(crate) fn crate_type(attr: &Attribute) -> Option<String> {
    if !matches!(attr.style, AttrStyle::Inner(_)) || !attr.path().is_ident("crate_type") {
        return None;
    }
    let Meta::NameValue(nv) = &attr.meta else {
        return None;
    };
    match &nv.value {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        _ => None,
    }
}

/// Concatenates items in file order. Inner attributes and identical `use`
/// items are kept once each; doc lines belong to their file's text.
fn merge(parsed: Vec<syn::File>) -> syn::File {
    let mut attrs: Vec<Attribute> = Vec::new();
    let mut items = Vec::new();
    for file in parsed {
        for attr in file.attrs {
            if attr.path().is_ident("doc") || !attrs.contains(&attr) {
                attrs.push(attr);
            }
        }
        for item in file.items {
            // files of one package routinely import the same names
            if matches!(item, Item::Use(_)) && items.contains(&item) {
                continue;
            }
            items.push(item);
        }
    }
    syn::File {
        shebang: None,
        attrs,
        items,
    }
}

/// Walks the top level of the merged tree once. The first unsupported
/// function aborts the walk.
pub fn collect_functions(tree: &syn::File) -> Result<Vec<FunctionDescriptor>> {
    let mut out = Vec::new();
    for item in &tree.items {
        let Item::Fn(f) = item else { continue };
        if !matches!(f.vis, Visibility::Public(_)) {
            continue;
        }
        if ENTRY_POINT_FUNCTIONS.iter().any(|e| f.sig.ident == e) {
            continue;
        }
        let descriptor = describe_function(f)?;
        debug!("exported function `{}`", descriptor.name);
        out.push(descriptor);
    }
    Ok(out)
}
