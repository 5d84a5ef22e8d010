//! Per-function code generation.
//!
//! A [`CodeWriter`] adapts one [`FunctionDescriptor`] and renders the three
//! fragments the module needs from it. The variant is picked from the
//! signature shape; argument marshaling is shared, result marshaling is
//! shape-specific.

use std::fmt::Write as _;

use crate::model::{FunctionDescriptor, Param, ValueType};

/// Entry point the wrappers report failures through; declared in the
/// `methods.rs` header and defined by the glue layer.
pub const ERROR_ENTRY_POINT: &str = "elog_error";

/// Keywords that cannot appear as a bare parameter or function name: the
/// reserved, type/function-name and column-name categories of the server's
/// keyword list. Unreserved keywords are plain identifiers there.
const SQL_KEYWORDS: &[&str] = &[
    // reserved
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "system_user", "table",
    "then", "to", "trailing", "true", "union", "unique", "user", "using", "variadic", "when",
    "where", "window", "with",
    // type or function name only
    "authorization", "binary", "collation", "concurrently", "cross", "current_schema",
    "freeze", "full", "ilike", "inner", "is", "isnull", "join", "left", "like", "natural",
    "notnull", "outer", "overlaps", "right", "similar", "tablesample", "verbose",
    // column name only
    "between", "bigint", "bit", "boolean", "char", "character", "coalesce", "dec", "decimal",
    "exists", "extract", "float", "greatest", "grouping", "inout", "int", "integer",
    "interval", "json", "json_array", "json_arrayagg", "json_exists", "json_object",
    "json_objectagg", "json_query", "json_scalar", "json_serialize", "json_table",
    "json_value", "least", "merge_action", "national", "nchar", "none", "normalize",
    "nullif", "numeric", "out", "overlay", "position", "precision", "real", "row", "setof",
    "smallint", "substring", "time", "timestamp", "treat", "trim", "values", "varchar",
    "xmlattributes", "xmlconcat", "xmlelement", "xmlexists", "xmlforest", "xmlnamespaces",
    "xmlparse", "xmlpi", "xmlroot", "xmlserialize", "xmltable",
];

#[derive(Debug, Clone, Copy)]
pub enum CodeWriter<'a> {
    /// Returns nothing; registered as `RETURNS void`.
    Procedure(&'a FunctionDescriptor),
    /// Returns a value that is never `NULL`.
    Function(&'a FunctionDescriptor),
    /// Returns `Option<T>`; `None` becomes SQL `NULL`.
    NullableFunction(&'a FunctionDescriptor),
}

impl<'a> CodeWriter<'a> {
    pub fn new(f: &'a FunctionDescriptor) -> Self {
        match &f.result {
            None => CodeWriter::Procedure(f),
            Some(r) if r.nullable => CodeWriter::NullableFunction(f),
            Some(_) => CodeWriter::Function(f),
        }
    }

    pub fn descriptor(&self) -> &'a FunctionDescriptor {
        match *self {
            CodeWriter::Procedure(f) | CodeWriter::Function(f) | CodeWriter::NullableFunction(f) => f,
        }
    }

    /// The V1 info record the engine looks up before calling the symbol.
    pub fn declaration(&self) -> String {
        let name = &self.descriptor().name;
        format!(
            "#[no_mangle]\npub extern \"C\" fn pg_finfo_{name}() -> &'static pl::FinfoRecord {{\n    &pl::FINFO_V1\n}}\n"
        )
    }

    /// `extern "C"` wrapper: unmarshal, call, marshal, and turn any error or
    /// panic into an engine error instead of letting it cross the boundary.
    pub fn wrapper_implementation(&self) -> String {
        let f = self.descriptor();
        let name = &f.name;
        let mut out = String::new();

        let _ = writeln!(out, "#[no_mangle]");
        let _ = writeln!(
            out,
            "pub unsafe extern \"C\" fn {name}(fcinfo: pl::FunctionCallInfo) -> pl::Datum {{"
        );
        let _ = writeln!(
            out,
            "    let outcome = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| -> ::std::result::Result<pl::Datum, String> {{"
        );
        for (idx, param) in f.params.iter().enumerate() {
            let _ = writeln!(out, "        let arg{idx} = {}?;", unmarshal(param, idx));
        }

        let args = f
            .params
            .iter()
            .enumerate()
            .map(|(idx, p)| pass_argument(&p.ty, idx))
            .collect::<Vec<_>>()
            .join(", ");
        let mut call = format!("crate::package::{name}({args})");
        if f.fallible {
            call.push_str(".map_err(|err| format!(\"{err:#}\"))?");
        }

        match self {
            CodeWriter::Procedure(_) => {
                let _ = writeln!(out, "        {call};");
                let _ = writeln!(out, "        Ok(pl::ret_void(fcinfo))");
            }
            CodeWriter::Function(_) | CodeWriter::NullableFunction(_) => {
                let _ = writeln!(out, "        let value = {call};");
                let _ = writeln!(out, "        Ok({}(fcinfo, value))", self.marshal_result());
            }
        }

        let _ = writeln!(out, "    }}));");
        let _ = writeln!(out, "    let message = match outcome {{");
        let _ = writeln!(out, "        Ok(Ok(datum)) => return datum,");
        let _ = writeln!(out, "        Ok(Err(message)) => message,");
        let _ = writeln!(
            out,
            "        Err(payload) => pl::panic_message(\"{name}\", payload),"
        );
        let _ = writeln!(out, "    }};");
        let _ = writeln!(out, "    {ERROR_ENTRY_POINT}(pl::palloc_cstring(message))");
        let _ = writeln!(out, "}}");
        out
    }

    /// `CREATE FUNCTION` binding the SQL name to the module's symbol.
    pub fn registration_statement(&self, module: &str) -> String {
        let f = self.descriptor();
        let params = f
            .params
            .iter()
            .map(|p| format!("{} {}", sql_ident(&p.name), p.ty.sql.sql_name()))
            .collect::<Vec<_>>()
            .join(", ");
        let returns = f
            .result
            .as_ref()
            .map(|r| r.sql.sql_name())
            .unwrap_or_else(|| "void".into());
        let strict = if f.is_strict() { " STRICT" } else { "" };

        let mut out = format!(
            "CREATE OR REPLACE FUNCTION {fname}({params})\nRETURNS {returns} AS\n'$libdir/{module}', '{symbol}'\nLANGUAGE c VOLATILE{strict};\n",
            fname = sql_ident(&f.name),
            module = sql_literal(module),
            symbol = f.name,
        );
        if !f.doc.is_empty() {
            let types = f
                .params
                .iter()
                .map(|p| p.ty.sql.sql_name())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "COMMENT ON FUNCTION {}({types}) IS '{}';",
                sql_ident(&f.name),
                sql_literal(&f.doc)
            );
        }
        out
    }

    fn marshal_result(&self) -> &'static str {
        let f = self.descriptor();
        let is_array = f
            .result
            .as_ref()
            .is_some_and(|r| r.sql.array_element().is_some());
        match (self, is_array) {
            (CodeWriter::NullableFunction(_), true) => "pl::ret_array_opt",
            (CodeWriter::NullableFunction(_), false) => "pl::ret_opt",
            (_, true) => "pl::ret_array",
            (_, false) => "pl::ret",
        }
    }
}

/// Expression fetching argument `idx` as its owned Rust type.
fn unmarshal(param: &Param, idx: usize) -> String {
    let ty = &param.ty;
    let suffix = if ty.nullable { "_opt" } else { "" };
    match ty.sql.array_element() {
        Some(elem) => format!(
            "pl::arg_array{suffix}::<{}>(fcinfo, {idx})",
            elem.rust_owned()
        ),
        None => format!("pl::arg{suffix}::<{}>(fcinfo, {idx})", ty.sql.rust_owned()),
    }
}

/// Borrowed parameters receive a reference to the wrapper's owned value.
fn pass_argument(ty: &ValueType, idx: usize) -> String {
    match (ty.borrowed, ty.nullable) {
        (true, true) => format!("arg{idx}.as_deref()"),
        (true, false) => format!("&arg{idx}"),
        _ => format!("arg{idx}"),
    }
}

fn sql_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain && !SQL_KEYWORDS.contains(&name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn sql_literal(text: &str) -> String {
    text.replace('\'', "''")
}
