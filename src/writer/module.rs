//! Emits the generated crate's sources: the sanitized user package, the glue
//! layer and the wrapper implementations.

use std::fs;
use std::path::Path;

use tracing::info;

use super::format::{format_source, format_tree};
use crate::error::{Error, Result};
use crate::parser::ENTRY_CRATE_TYPE;
use crate::processor::ModuleWriter;
use crate::toolchain::ServerBuild;

pub const PACKAGE_FILE: &str = "package.rs";
pub const GLUE_FILE: &str = "lib.rs";
pub const METHODS_FILE: &str = "methods.rs";

/// Replaced by the concatenated declarations.
pub const DECLARATION_MARKER: &str = "//{funcdec}";

/// Include path the template ships with; swapped for the discovered one.
pub const DEFAULT_INCLUDE_DIR: &str = "/usr/include/postgresql/server";

/// Server major version the template's magic block claims; swapped for the
/// discovered one.
pub const MAJOR_VERSION_MARKER: &str = "/*{pgmajor}*/16";

const METHODS_HEADER: &str = r#"//! Generated by plrs. Do not edit.

use crate::pl;
use std::ffi::c_char;

extern "C" {
    fn elog_error(message: *const c_char) -> !;
}
"#;

/// Writes `package.rs`, `lib.rs` and `methods.rs` into `dir`, stopping at
/// the first failure.
pub fn emit(mw: &ModuleWriter, dir: &Path, template: &str, server: &ServerBuild) -> Result<()> {
    write(dir, PACKAGE_FILE, &render_package(mw))?;
    write(dir, GLUE_FILE, &render_glue(mw, template, server)?)?;
    write(dir, METHODS_FILE, &render_methods(mw)?)?;
    Ok(())
}

pub fn render_package(mw: &ModuleWriter) -> String {
    format_tree(mw.tree())
}

/// Template with its header pointed at the entry crate type, the server's
/// include path and major version filled in and the declarations spliced in
/// at the marker.
pub fn render_glue(mw: &ModuleWriter, template: &str, server: &ServerBuild) -> Result<String> {
    for marker in [DECLARATION_MARKER, MAJOR_VERSION_MARKER] {
        if !template.contains(marker) {
            return Err(Error::TemplateMarkerMissing {
                marker: marker.to_string(),
            });
        }
    }
    let declarations: String = mw.code_writers().map(|w| w.declaration()).collect();
    Ok(rewrite_header(template)
        .replacen(DEFAULT_INCLUDE_DIR, &server.include_dir, 1)
        .replacen(MAJOR_VERSION_MARKER, &server.major_version.to_string(), 1)
        .replacen(DECLARATION_MARKER, &declarations, 1))
}

/// Fixed header plus every wrapper, verified and formatted.
pub fn render_methods(mw: &ModuleWriter) -> Result<String> {
    let mut source = String::from(METHODS_HEADER);
    for writer in mw.code_writers() {
        source.push('\n');
        source.push_str(&writer.wrapper_implementation());
    }
    format_source(METHODS_FILE, &source)
}

/// The template is a library in its own right; its leading
/// `#![crate_type]` line is replaced (or added) so the glue builds as the
/// module's root.
pub fn rewrite_header(template: &str) -> String {
    let header = format!("#![crate_type = \"{ENTRY_CRATE_TYPE}\"]");
    let (first, rest) = match template.split_once('\n') {
        Some((first, rest)) => (first, Some(rest)),
        None => (template, None),
    };
    if first.trim_start().starts_with("#![crate_type") {
        match rest {
            Some(rest) => format!("{header}\n{rest}"),
            None => header,
        }
    } else {
        format!("{header}\n\n{template}")
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
    info!("wrote {}", path.display());
    Ok(())
}
