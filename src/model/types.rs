//! The fixed mapping between Rust types and PostgreSQL types.
//!
//! The table is closed: a type that is not listed here is rejected with
//! [`Unmapped`], never coerced. Adding a row means teaching both the
//! wrapper generator and the glue template about it.

use quote::ToTokens;
use syn::{GenericArgument, PathArguments, Type};

/// Database-facing type of a value crossing the native boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Boolean,
    Text,
    Bytea,
    /// One-dimensional array; the element is never `Bytea` or another array.
    Array(Box<SqlType>),
}

impl SqlType {
    /// Name used in `CREATE FUNCTION` statements.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::SmallInt => "smallint".into(),
            SqlType::Integer => "integer".into(),
            SqlType::BigInt => "bigint".into(),
            SqlType::Real => "real".into(),
            SqlType::Double => "double precision".into(),
            SqlType::Boolean => "boolean".into(),
            SqlType::Text => "text".into(),
            SqlType::Bytea => "bytea".into(),
            SqlType::Array(elem) => format!("{}[]", elem.sql_name()),
        }
    }

    /// Owned Rust type the wrapper unmarshals into.
    pub fn rust_owned(&self) -> String {
        match self {
            SqlType::SmallInt => "i16".into(),
            SqlType::Integer => "i32".into(),
            SqlType::BigInt => "i64".into(),
            SqlType::Real => "f32".into(),
            SqlType::Double => "f64".into(),
            SqlType::Boolean => "bool".into(),
            SqlType::Text => "String".into(),
            SqlType::Bytea => "Vec<u8>".into(),
            SqlType::Array(elem) => format!("Vec<{}>", elem.rust_owned()),
        }
    }

    /// Element type when this is an array; arrays marshal through their own glue entry points.
    pub fn array_element(&self) -> Option<&SqlType> {
        match self {
            SqlType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    fn from_ident(ident: &str) -> Option<SqlType> {
        Some(match ident {
            "i16" => SqlType::SmallInt,
            "i32" => SqlType::Integer,
            "i64" => SqlType::BigInt,
            "f32" => SqlType::Real,
            "f64" => SqlType::Double,
            "bool" => SqlType::Boolean,
            "String" => SqlType::Text,
            _ => return None,
        })
    }
}

/// A mapped parameter or result type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueType {
    pub sql: SqlType,
    /// Declared as `Option<T>`: SQL `NULL` maps to `None`.
    pub nullable: bool,
    /// Declared as a borrow (`&str`, `&[T]`); the wrapper owns the value and lends it.
    pub borrowed: bool,
}

/// The offending type, rendered the way it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmapped(pub String);

/// Maps a parameter type. Borrowed slices and `&str` are accepted here only.
pub fn map_param_type(ty: &Type) -> Result<ValueType, Unmapped> {
    map_type(ty, true)
}

/// Maps the value part of a return type.
pub fn map_result_type(ty: &Type) -> Result<ValueType, Unmapped> {
    map_type(ty, false)
}

fn map_type(ty: &Type, allow_borrow: bool) -> Result<ValueType, Unmapped> {
    let unmapped = || Unmapped(render_type(ty));

    if let Some(inner) = generic_arg(ty, "Option") {
        let inner = map_type(inner, allow_borrow)?;
        if inner.nullable {
            return Err(unmapped());
        }
        return Ok(ValueType {
            nullable: true,
            ..inner
        });
    }

    let (sql, borrowed) = match ty {
        Type::Reference(r) if allow_borrow && r.mutability.is_none() => {
            let sql = match &*r.elem {
                Type::Path(p) if p.qself.is_none() && p.path.is_ident("str") => SqlType::Text,
                Type::Slice(s) => slice_type(&s.elem).ok_or_else(unmapped)?,
                _ => return Err(unmapped()),
            };
            (sql, true)
        }
        Type::Paren(p) => return map_type(&p.elem, allow_borrow),
        _ => {
            if let Some(elem) = generic_arg(ty, "Vec") {
                (slice_type(elem).ok_or_else(unmapped)?, false)
            } else {
                (plain_type(ty).ok_or_else(unmapped)?, false)
            }
        }
    };

    Ok(ValueType {
        sql,
        nullable: false,
        borrowed,
    })
}

/// `[u8]` is bytea; any other mapped scalar or `String` becomes an array.
fn slice_type(elem: &Type) -> Option<SqlType> {
    if last_ident(elem).as_deref() == Some("u8") && path_args(elem).is_none() {
        return Some(SqlType::Bytea);
    }
    plain_type(elem).map(|e| SqlType::Array(Box::new(e)))
}

fn plain_type(ty: &Type) -> Option<SqlType> {
    if path_args(ty).is_some() {
        return None;
    }
    SqlType::from_ident(&last_ident(ty)?)
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) if p.qself.is_none() => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn path_args(ty: &Type) -> Option<&PathArguments> {
    match ty {
        Type::Path(p) => p
            .path
            .segments
            .last()
            .map(|s| &s.arguments)
            .filter(|a| !a.is_none()),
        _ => None,
    }
}

/// `Wrapper<T>` → `T`, for a single type argument.
pub(crate) fn generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    generic_args(ty, wrapper).and_then(|args| match args.as_slice() {
        [only] => Some(*only),
        _ => None,
    })
}

/// All type arguments of `Wrapper<..>` when the last path segment is `wrapper`.
pub(crate) fn generic_args<'a>(ty: &'a Type, wrapper: &str) -> Option<Vec<&'a Type>> {
    let Type::Path(p) = ty else { return None };
    let seg = p.path.segments.last()?;
    if seg.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    args.args
        .iter()
        .map(|a| match a {
            GenericArgument::Type(t) => Some(t),
            _ => None,
        })
        .collect()
}

/// Renders a type roughly the way a person writes it (`Vec<u8>`, not `Vec < u8 >`).
pub fn render_type(ty: &Type) -> String {
    ty.to_token_stream()
        .to_string()
        .replace(" < ", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace("& ", "&")
        .replace(" :: ", "::")
        .replace(":: ", "::")
}
