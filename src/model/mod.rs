pub mod types;

use std::path::PathBuf;

pub use types::{SqlType, ValueType};

/// One function parameter as the database sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ValueType,
}

/// Summary of one exported function, extracted once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` for functions returning `()` (or `Result<(), E>`).
    pub result: Option<ValueType>,
    /// Returns `Result<_, E>`; the error is reported through the engine.
    pub fallible: bool,
    pub doc: String,
}

impl FunctionDescriptor {
    /// A function with no nullable parameter can be declared `STRICT`:
    /// the engine then never calls it with a `NULL` argument.
    pub fn is_strict(&self) -> bool {
        self.params.iter().all(|p| !p.ty.nullable)
    }
}

/// The user's directory, parsed and merged into one tree.
#[derive(Debug, Clone)]
pub struct SourcePackage {
    pub dir: PathBuf,
    /// Files that went into `tree`, in merge order.
    pub files: Vec<PathBuf>,
    pub tree: syn::File,
    /// Leading `//!` text of every file, newline-joined.
    pub doc: String,
}
