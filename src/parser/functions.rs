//! Turns one exported `fn` item into a [`FunctionDescriptor`].

use syn::ext::IdentExt;
use syn::{Attribute, Expr, FnArg, ItemFn, Lit, Meta, Pat, ReturnType, Type};

use crate::error::{Error, Result};
use crate::model::types::{self, Unmapped, generic_args};
use crate::model::{FunctionDescriptor, Param, ValueType};

/// Names the glue layer already uses in the generated crate.
const RESERVED_NAMES: &[&str] = &["pl", "elog_error"];
const RESERVED_PREFIX: &str = "pg_finfo_";

pub fn describe_function(item: &ItemFn) -> Result<FunctionDescriptor> {
    let sig = &item.sig;
    let name = sig.ident.unraw().to_string();
    let unsupported = |reason: String| Error::UnsupportedSignature {
        function: name.clone(),
        reason,
    };
    let unmapped = |Unmapped(ty)| Error::UnmappedType {
        function: name.clone(),
        ty,
    };

    if name != sig.ident.to_string() {
        return Err(unsupported("raw identifiers cannot be exported".into()));
    }
    if RESERVED_NAMES.contains(&name.as_str()) || name.starts_with(RESERVED_PREFIX) {
        return Err(unsupported("the name is reserved by the glue layer".into()));
    }
    if !sig.generics.params.is_empty() {
        return Err(unsupported("generic functions cannot be exported".into()));
    }
    if sig.asyncness.is_some() {
        return Err(unsupported("async functions cannot be exported".into()));
    }
    if sig.constness.is_some() {
        return Err(unsupported("const functions cannot be exported".into()));
    }
    if sig.unsafety.is_some() {
        return Err(unsupported("unsafe functions cannot be exported".into()));
    }
    if sig.variadic.is_some() {
        return Err(unsupported("variadic functions cannot be exported".into()));
    }
    if let Some(abi) = sig.abi.as_ref().and_then(|a| a.name.as_ref()) {
        let abi = abi.value();
        if abi != "C" && abi != "Rust" {
            return Err(unsupported(format!("`extern \"{abi}\"` functions cannot be exported")));
        }
    }

    let mut params = Vec::with_capacity(sig.inputs.len());
    for (idx, input) in sig.inputs.iter().enumerate() {
        let FnArg::Typed(arg) = input else {
            return Err(unsupported("methods cannot be exported".into()));
        };
        let param_name = match &*arg.pat {
            Pat::Ident(id) if id.by_ref.is_none() && id.subpat.is_none() => {
                id.ident.unraw().to_string()
            }
            Pat::Wild(_) => format!("arg{idx}"),
            _ => {
                return Err(unsupported(format!(
                    "parameter {} must be a plain identifier",
                    idx + 1
                )));
            }
        };
        if matches!(&*arg.ty, Type::ImplTrait(_)) {
            return Err(unsupported("`impl Trait` parameters cannot be exported".into()));
        }
        let ty = types::map_param_type(&arg.ty).map_err(unmapped)?;
        params.push(Param {
            name: param_name,
            ty,
        });
    }

    let (result, fallible) = describe_return(&sig.output).map_err(unmapped)?;

    Ok(FunctionDescriptor {
        name,
        params,
        result,
        fallible,
        doc: doc_text(&item.attrs),
    })
}

/// `Result<T, E>` (or a single-argument `Result<T>` alias) marks the function
/// fallible; `T` is then the value that crosses the boundary.
fn describe_return(output: &ReturnType) -> std::result::Result<(Option<ValueType>, bool), Unmapped> {
    let ReturnType::Type(_, ty) = output else {
        return Ok((None, false));
    };
    if is_unit(ty) {
        return Ok((None, false));
    }
    if let Some(args) = generic_args(ty, "Result") {
        if let [value, ..] = args.as_slice() {
            if args.len() <= 2 {
                let value = if is_unit(value) {
                    None
                } else {
                    Some(types::map_result_type(value)?)
                };
                return Ok((value, true));
            }
        }
    }
    Ok((Some(types::map_result_type(ty)?), false))
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(t) if t.elems.is_empty())
}

/// Joins `///` (or `//!`, when given inner attributes) lines, dropping the
/// single space rustdoc leaves after the comment marker.
pub(crate) fn doc_text(attrs: &[Attribute]) -> String {
    let mut lines = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("doc")) {
        let Meta::NameValue(nv) = &attr.meta else { continue };
        let Expr::Lit(lit) = &nv.value else { continue };
        let Lit::Str(text) = &lit.lit else { continue };
        for line in text.value().lines() {
            lines.push(line.strip_prefix(' ').unwrap_or(line).trim_end().to_string());
        }
    }
    lines.join("\n").trim().to_string()
}
