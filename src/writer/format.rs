//! Verification and pretty-printing of generated Rust.

use crate::error::{Error, Result};

/// Parses `source` and prints it back in canonical layout. A parse failure
/// means the generator produced bad code.
pub fn format_source(file: &str, source: &str) -> Result<String> {
    let tree = syn::parse_file(source).map_err(|source| Error::Format {
        file: file.to_string(),
        source,
    })?;
    Ok(prettyplease::unparse(&tree))
}

pub fn format_tree(tree: &syn::File) -> String {
    prettyplease::unparse(tree)
}
