//! Tree sanitizer: strips what cannot be relocated into the generated crate.
//!
//! The tree is taken by value, so nothing else can observe it half-rewritten.
//! Only deletions happen here; the remaining items keep their meaning.

use syn::{AttrStyle, Attribute, Item};

use crate::parser::ENTRY_POINT_FUNCTIONS;

/// Inner attributes that only make sense at a crate root.
const CRATE_LEVEL_ATTRS: &[&str] = &["crate_type", "crate_name", "no_std", "no_main"];

/// Attributes that claim a native symbol the generated wrapper owns.
const SYMBOL_ATTRS: &[&str] = &["no_mangle", "export_name"];

pub fn sanitize(mut tree: syn::File) -> syn::File {
    tree.attrs.retain(|a| !is_crate_level(a));
    tree.items.retain(|item| !is_entry_point(item));
    for item in &mut tree.items {
        if let Item::Fn(f) = item {
            f.attrs.retain(|a| !claims_symbol(a));
        }
    }
    tree
}

fn is_entry_point(item: &Item) -> bool {
    match item {
        Item::Fn(f) => ENTRY_POINT_FUNCTIONS.iter().any(|e| f.sig.ident == e),
        _ => false,
    }
}

fn is_crate_level(attr: &Attribute) -> bool {
    matches!(attr.style, AttrStyle::Inner(_))
        && CRATE_LEVEL_ATTRS.iter().any(|n| attr.path().is_ident(n))
}

/// `#[no_mangle]`, `#[export_name = ".."]` and their `#[unsafe(..)]` spellings.
fn claims_symbol(attr: &Attribute) -> bool {
    if SYMBOL_ATTRS.iter().any(|n| attr.path().is_ident(n)) {
        return true;
    }
    if !attr.path().is_ident("unsafe") {
        return false;
    }
    let mut claims = false;
    let _ = attr.parse_nested_meta(|meta| {
        if SYMBOL_ATTRS.iter().any(|n| meta.path.is_ident(n)) {
            claims = true;
        }
        if meta.input.peek(syn::Token![=]) {
            let _: syn::Expr = meta.value()?.parse()?;
        }
        Ok(())
    });
    claims
}
