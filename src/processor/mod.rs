//! The run context shared by every emission step.
pub mod codewriter;
pub mod sanitize;

pub use codewriter::CodeWriter;
pub use sanitize::sanitize;

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{FunctionDescriptor, SourcePackage};
use crate::parser;
use crate::toolchain::ServerBuild;

/// Everything one pipeline run needs: built once, then only read.
#[derive(Debug)]
pub struct ModuleWriter {
    /// Module (and extension) name: the package directory's base name.
    pub name: String,
    pub doc: String,
    tree: syn::File,
    functions: Vec<FunctionDescriptor>,
}

impl ModuleWriter {
    /// Analyzes the package at `package_path` and sanitizes its tree.
    pub fn new(package_path: &Path) -> Result<Self> {
        let (package, functions) = parser::analyze(package_path)?;
        let absolute =
            std::path::absolute(package_path).map_err(|e| Error::io(package_path, e))?;
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".into());
        Ok(Self::from_parts(name, package, functions))
    }

    pub fn from_parts(
        name: String,
        package: SourcePackage,
        functions: Vec<FunctionDescriptor>,
    ) -> Self {
        debug!("sanitizing {} merged item(s)", package.tree.items.len());
        Self {
            name,
            doc: package.doc,
            tree: sanitize(package.tree),
            functions,
        }
    }

    /// Overrides the name taken from the directory.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The sanitized, merged user tree.
    pub fn tree(&self) -> &syn::File {
        &self.tree
    }

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// One writer per exported function, in declaration order.
    pub fn code_writers(&self) -> impl Iterator<Item = CodeWriter<'_>> {
        self.functions.iter().map(CodeWriter::new)
    }

    pub fn lib_name(&self) -> String {
        lib_name(&self.name)
    }

    /// Writes `package.rs`, `lib.rs` and `methods.rs` into `dir`.
    pub fn write_module(&self, dir: &Path, template: &str, server: &ServerBuild) -> Result<()> {
        crate::writer::module::emit(self, dir, template, server)
    }
}

/// Name usable as a Rust library target (`my-ext` → `my_ext`).
pub fn lib_name(module: &str) -> String {
    module
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_names_module_after_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("my-ext");
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join("lib.rs"),
            "#![crate_type = \"cdylib\"]\nfn main() {}\npub fn one() -> i32 { 1 }\npub fn two() -> i32 { 2 }",
        )
        .unwrap();

        let mw = ModuleWriter::new(&dir).unwrap();
        assert_eq!(mw.name, "my-ext");
        assert_eq!(mw.lib_name(), "my_ext");
        let names: Vec<_> = mw.code_writers().map(|w| w.descriptor().name.clone()).collect();
        assert_eq!(names, ["one", "two"]);
        // sanitized at construction
        assert_eq!(mw.tree().items.len(), 2);
        assert!(mw.tree().attrs.is_empty());
    }
}
