//! Error taxonomy shared by every pipeline stage.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every stage returns this; there is no partial-success path.
#[derive(Error, Debug)]
pub enum Error {
    // ── structural ──────────────────────────────────────────────
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("more than one package in {}: {}", dir.display(), found.join(", "))]
    MultiplePackages { dir: PathBuf, found: Vec<String> },

    #[error("no `#![crate_type = \"cdylib\"]` package in {}{}", dir.display(), found.as_deref().map(|f| format!(" (found `{f}`)")).unwrap_or_default())]
    NotEntryPackage { dir: PathBuf, found: Option<String> },

    #[error("no source files in {}", dir.display())]
    EmptyPackage { dir: PathBuf },

    #[error("{}: unsupported item: {what}", path.display())]
    UnsupportedItem { path: PathBuf, what: String },

    #[error("function `{function}`: {reason}")]
    UnsupportedSignature { function: String, reason: String },

    #[error("function `{function}`: type `{ty}` has no database mapping")]
    UnmappedType { function: String, ty: String },

    // ── environment ─────────────────────────────────────────────
    #[error("{} is missing. Please run `cargo init`", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("cannot read manifest {}: {reason}", path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("cannot find {dependency} in {}", path.display())]
    DependencyMissing { path: PathBuf, dependency: String },

    #[error("crate {crate_name} not installed\nplease add it with: cargo add {crate_name}")]
    TemplateNotFound { crate_name: String },

    #[error("cannot find `{tool}` on PATH; install the PostgreSQL server development package")]
    ToolNotFound { tool: String },

    #[error("`{tool}` failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("cannot determine the server version from {origin}: {reason}")]
    ServerVersion { origin: String, reason: String },

    #[error("PostgreSQL {version} is not supported; {min} or later is required")]
    UnsupportedServer { version: u32, min: u32 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // ── generation invariants ───────────────────────────────────
    #[error("glue template has no `{marker}` marker")]
    TemplateMarkerMissing { marker: String },

    #[error("generated {file} is not valid Rust: {source}")]
    Format {
        file: String,
        #[source]
        source: syn::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
