//! Packaging artifacts: registration script, extension control file,
//! PGXS makefile and the manifest cargo builds the module from.
//!
//! Each renderer depends only on the module name and the descriptors.

use std::fs;
use std::path::Path;

use toml::{Table, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::FunctionDescriptor;
use crate::processor::{CodeWriter, ModuleWriter, lib_name};

/// Version of the first (and only) install script.
pub const EXTENSION_VERSION: &str = "0.1";

pub fn sql_file_name(module: &str) -> String {
    format!("{module}--{EXTENSION_VERSION}.sql")
}

pub fn control_file_name(module: &str) -> String {
    format!("{module}.control")
}

pub const MAKEFILE: &str = "Makefile";
pub const CRATE_MANIFEST: &str = "Cargo.toml";

/// Writes all four artifacts into `dir`.
pub fn emit(mw: &ModuleWriter, dir: &Path, dependencies: &Table) -> Result<()> {
    write(dir, &sql_file_name(&mw.name), &render_sql(&mw.name, mw.functions()))?;
    write(dir, &control_file_name(&mw.name), &render_control(&mw.name))?;
    write(dir, MAKEFILE, &render_makefile(&mw.name))?;
    write(
        dir,
        CRATE_MANIFEST,
        &render_crate_manifest(&mw.name, &mw.doc, dependencies),
    )?;
    Ok(())
}

/// Install script: refuses to run outside `CREATE EXTENSION`, then one
/// statement per function in declaration order.
pub fn render_sql(module: &str, functions: &[FunctionDescriptor]) -> String {
    let mut out = format!(
        "-- complain if script is sourced in psql, rather than via CREATE EXTENSION\n\
         \\echo Use \"CREATE EXTENSION {module}\" to load this file. \\quit\n"
    );
    for f in functions {
        out.push('\n');
        out.push_str(&CodeWriter::new(f).registration_statement(module));
    }
    out
}

pub fn render_control(module: &str) -> String {
    format!(
        "# {module} extension\n\
         comment = '{module} extension'\n\
         default_version = '{EXTENSION_VERSION}'\n\
         relocatable = true\n"
    )
}

/// PGXS does the installing; the shared object itself comes from cargo.
pub fn render_makefile(module: &str) -> String {
    let lib = lib_name(module);
    let sql = sql_file_name(module);
    format!(
        "EXTENSION = {module}
DATA = {sql}  # script files to install
# REGRESS = {module}_test     # our test script file (without extension)
MODULES = {module}          # our module, built by cargo below
override with_llvm = no

# postgres build stuff
PG_CONFIG = pg_config
PGXS := $(shell $(PG_CONFIG) --pgxs)
include $(PGXS)

CARGO ?= cargo

{module}$(DLSUFFIX): lib.rs package.rs methods.rs Cargo.toml
\t$(CARGO) build --release --manifest-path Cargo.toml
\tcp target/release/lib{lib}$(DLSUFFIX) $@

clean: cargo-clean
cargo-clean:
\t$(CARGO) clean --manifest-path Cargo.toml
"
    )
}

/// Manifest for the generated crate: a standalone `cdylib` rooted at the
/// glue file, carrying the user's dependencies.
pub fn render_crate_manifest(module: &str, doc: &str, dependencies: &Table) -> String {
    let mut package = Table::new();
    package.insert("name".into(), Value::String(module.to_string()));
    package.insert("version".into(), Value::String(format!("{EXTENSION_VERSION}.0")));
    package.insert("edition".into(), Value::String("2021".into()));
    package.insert("publish".into(), Value::Boolean(false));
    if let Some(summary) = doc.lines().map(str::trim).find(|l| !l.is_empty()) {
        package.insert("description".into(), Value::String(summary.to_string()));
    }

    let mut lib = Table::new();
    lib.insert("name".into(), Value::String(lib_name(module)));
    lib.insert("path".into(), Value::String(super::module::GLUE_FILE.into()));
    lib.insert(
        "crate-type".into(),
        Value::Array(vec![Value::String("cdylib".into())]),
    );

    // wrappers rely on catch_unwind
    let mut release = Table::new();
    release.insert("panic".into(), Value::String("unwind".into()));
    let mut profile = Table::new();
    profile.insert("release".into(), Value::Table(release));

    let mut manifest = Table::new();
    manifest.insert("package".into(), Value::Table(package));
    manifest.insert("lib".into(), Value::Table(lib));
    manifest.insert("dependencies".into(), Value::Table(dependencies.clone()));
    manifest.insert("profile".into(), Value::Table(profile));
    // keep the build dir out of any enclosing workspace
    manifest.insert("workspace".into(), Value::Table(Table::new()));
    manifest.to_string()
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
    info!("wrote {}", path.display());
    Ok(())
}
