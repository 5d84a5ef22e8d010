use std::fs;
use std::path::{Path, PathBuf};

use plrs::toolchain::ServerBuild;
use plrs::writer::artifacts::{control_file_name, sql_file_name};
use plrs::writer::module::{
    DECLARATION_MARKER, DEFAULT_INCLUDE_DIR, MAJOR_VERSION_MARKER, render_glue,
};
use plrs::{Error, ModuleWriter, generate};
use pretty_assertions::assert_eq;

const TEMPLATE: &str = "#![crate_type = \"rlib\"]\n\
mod methods;\n\
mod package;\n\
pub const PG_INCLUDE_DIR: &str = \"/usr/include/postgresql/server\";\n\
const PG_MAJOR: i32 = /*{pgmajor}*/16;\n\
//{funcdec}\n\
pub mod pl {}\n";

const INCLUDE_DIR: &str = "/opt/pg/include/server";

fn server() -> ServerBuild {
    ServerBuild {
        include_dir: INCLUDE_DIR.into(),
        major_version: 15,
    }
}

/// `<tmp>/<name>/` holding the given files.
fn package(name: &str, files: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join(name);
    fs::create_dir(&dir).unwrap();
    for (file, src) in files {
        fs::write(dir.join(file), src).unwrap();
    }
    (root, dir)
}

fn run(dir: &Path, out: &Path) -> plrs::Result<()> {
    let mw = ModuleWriter::new(dir)?;
    generate(&mw, out, TEMPLATE, &server(), &toml::Table::new())
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

const DEMO: &str = r#"#![crate_type = "cdylib"]

fn main() {}

pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

pub fn greet(name: &str) -> String {
    format!("hello {name}")
}
"#;

#[test]
fn demo_module_end_to_end() {
    let (_root, dir) = package("demo", &[("lib.rs", DEMO)]);
    let out = tempfile::tempdir().unwrap();
    run(&dir, out.path()).unwrap();

    for file in [
        "package.rs",
        "lib.rs",
        "methods.rs",
        "demo--0.1.sql",
        "demo.control",
        "Makefile",
        "Cargo.toml",
    ] {
        assert!(out.path().join(file).is_file(), "{file} missing");
    }

    let sql = read(out.path(), &sql_file_name("demo"));
    assert!(sql.contains(
        "CREATE OR REPLACE FUNCTION add(a integer, b integer)\nRETURNS integer AS\n'$libdir/demo', 'add'\nLANGUAGE c VOLATILE STRICT;\n"
    ));
    assert!(sql.contains("CREATE OR REPLACE FUNCTION greet(name text)\nRETURNS text AS"));
    assert!(sql.find("add(").unwrap() < sql.find("greet(").unwrap());

    let control = read(out.path(), &control_file_name("demo"));
    assert!(control.contains("comment = 'demo extension'"));
    assert!(control.contains("default_version = '0.1'"));

    let makefile = read(out.path(), "Makefile");
    assert!(makefile.starts_with("EXTENSION = demo\nDATA = demo--0.1.sql"));
    assert!(makefile.contains("MODULES = demo "));
    assert!(makefile.contains("\tcp target/release/libdemo$(DLSUFFIX) $@\n"));

    let package_rs = read(out.path(), "package.rs");
    assert!(!package_rs.contains("crate_type"));
    assert!(!package_rs.contains("fn main"));
    assert!(package_rs.contains("pub fn greet(name: &str) -> String"));

    let glue = read(out.path(), "lib.rs");
    assert!(glue.starts_with("#![crate_type = \"cdylib\"]\n"));
    assert!(glue.contains(INCLUDE_DIR));
    assert!(!glue.contains(DEFAULT_INCLUDE_DIR));
    assert!(!glue.contains(DECLARATION_MARKER));
    assert!(glue.contains("const PG_MAJOR: i32 = 15;"));
    assert!(glue.contains("fn pg_finfo_add()"));
    assert!(glue.contains("fn pg_finfo_greet()"));

    let methods = read(out.path(), "methods.rs");
    assert!(methods.contains("crate::package::add(arg0, arg1)"));
    assert!(methods.contains("crate::package::greet(&arg0)"));
}

#[test]
fn one_fragment_per_function_in_order() {
    let src = r#"#![crate_type = "cdylib"]
pub fn zeta() {}
fn hidden(x: i32) -> i32 { x }
pub fn alpha(x: Option<i64>) -> Option<i64> { x }
pub fn mid(xs: &[f64]) -> Vec<f64> { xs.to_vec() }
"#;
    let (_root, dir) = package("ordered", &[("a.rs", src)]);
    let out = tempfile::tempdir().unwrap();
    run(&dir, out.path()).unwrap();

    let glue = read(out.path(), "lib.rs");
    let methods = read(out.path(), "methods.rs");
    let sql = read(out.path(), &sql_file_name("ordered"));

    let names = ["zeta", "alpha", "mid"];
    for text in [&glue, &methods, &sql] {
        let positions: Vec<usize> = names
            .iter()
            .map(|n| text.find(&format!("{n}(")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }
    assert_eq!(glue.matches("pg_finfo_").count(), 3);
    assert_eq!(methods.matches("catch_unwind").count(), 3);
    assert_eq!(sql.matches("CREATE OR REPLACE FUNCTION").count(), 3);
    assert!(!sql.contains("hidden"));

    // a nullable parameter drops STRICT
    assert!(sql.contains("alpha(x bigint)\nRETURNS bigint AS\n'$libdir/ordered', 'alpha'\nLANGUAGE c VOLATILE;\n"));
    assert!(sql.contains("mid(xs double precision[])\nRETURNS double precision[]"));
    assert!(sql.contains("zeta()\nRETURNS void"));
}

#[test]
fn files_merge_and_tests_are_skipped() {
    let (_root, dir) = package(
        "merged",
        &[
            ("b.rs", "pub fn second() -> bool { true }\n"),
            ("a.rs", "#![crate_type = \"cdylib\"]\npub fn first() -> i16 { 1 }\n"),
            ("a_test.rs", "pub fn only_in_tests() -> i32 { 0 }\n"),
            ("notes.txt", "not rust"),
        ],
    );
    let mw = ModuleWriter::new(&dir).unwrap();
    assert_eq!(mw.name, "merged");
    let names: Vec<&str> = mw.functions().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn shared_imports_appear_once_in_package() {
    let (_root, dir) = package(
        "fmt",
        &[
            (
                "a.rs",
                "#![crate_type = \"cdylib\"]\nuse std::fmt::Write;\npub fn a() -> String { let mut s = String::new(); let _ = write!(s, \"a\"); s }\n",
            ),
            (
                "b.rs",
                "use std::fmt::Write;\npub fn b() -> String { let mut s = String::new(); let _ = write!(s, \"b\"); s }\n",
            ),
        ],
    );
    let out = tempfile::tempdir().unwrap();
    run(&dir, out.path()).unwrap();

    let package_rs = read(out.path(), "package.rs");
    assert_eq!(package_rs.matches("use std::fmt::Write;").count(), 1, "{package_rs}");
    let parsed = syn::parse_file(&package_rs).unwrap();
    assert_eq!(
        parsed.items.iter().filter(|i| matches!(i, syn::Item::Fn(_))).count(),
        2
    );
}

#[test]
fn output_is_deterministic() {
    let (_root, dir) = package("demo", &[("lib.rs", DEMO)]);
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    run(&dir, first.path()).unwrap();
    run(&dir, second.path()).unwrap();

    let mut names: Vec<_> = fs::read_dir(first.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    assert_eq!(names.len(), 7);
    for name in names {
        let name = name.to_string_lossy();
        assert_eq!(read(first.path(), &name), read(second.path(), &name), "{name} differs");
    }
}

#[test]
fn multiple_packages_write_nothing() {
    let (_root, dir) = package(
        "mixed",
        &[
            ("a.rs", "#![crate_type = \"cdylib\"]\npub fn a() {}\n"),
            ("b.rs", "#![crate_type = \"rlib\"]\npub fn b() {}\n"),
        ],
    );
    let out = tempfile::tempdir().unwrap();
    let err = run(&dir, out.path()).unwrap_err();
    match err {
        Error::MultiplePackages { found, .. } => assert_eq!(found, ["cdylib", "rlib"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn library_package_is_rejected() {
    let (_root, dir) = package("lib", &[("lib.rs", "#![crate_type = \"rlib\"]\npub fn f() {}\n")]);
    let err = ModuleWriter::new(&dir).unwrap_err();
    assert!(
        matches!(err, Error::NotEntryPackage { found: Some(ref f), .. } if f == "rlib"),
        "{err}"
    );

    let (_root, dir) = package("bare", &[("lib.rs", "pub fn f() {}\n")]);
    let err = ModuleWriter::new(&dir).unwrap_err();
    assert!(matches!(err, Error::NotEntryPackage { found: None, .. }));
}

#[test]
fn unmapped_type_names_function_and_type() {
    let src = "#![crate_type = \"cdylib\"]\npub fn ok() {}\npub fn bad(m: std::collections::HashMap<String, i32>) {}\n";
    let (_root, dir) = package("bad", &[("lib.rs", src)]);
    let out = tempfile::tempdir().unwrap();
    let err = run(&dir, out.path()).unwrap_err();
    match &err {
        Error::UnmappedType { function, ty } => {
            assert_eq!(function, "bad");
            assert!(ty.contains("HashMap"), "{ty}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn missing_marker_differs_from_missing_template() {
    let (_root, dir) = package("demo", &[("lib.rs", DEMO)]);
    let mw = ModuleWriter::new(&dir).unwrap();
    let err = render_glue(&mw, "#![crate_type = \"rlib\"]\npub mod pl {}\n", &server()).unwrap_err();
    assert!(matches!(err, Error::TemplateMarkerMissing { .. }));

    let config = plrs::toolchain::TemplateConfig {
        search_paths: vec![],
        manifest_path: dir.join("Cargo.toml"),
        module_cache_path: None,
    };
    let err = plrs::toolchain::read_template(&config).unwrap_err();
    assert!(matches!(err, Error::ManifestMissing { .. }));
}

#[test]
fn symbol_claims_are_dropped_from_the_package() {
    let src = r#"#![crate_type = "cdylib"]
#![allow(dead_code)]

#[no_mangle]
pub extern "C" fn Pg_magic_func() {}

#[no_mangle]
pub fn exported() -> i32 { 1 }

#[export_name = "other"]
fn helper() {}
"#;
    let (_root, dir) = package("claims", &[("lib.rs", src)]);
    let mw = ModuleWriter::new(&dir).unwrap();
    let package_rs = plrs::writer::module::render_package(&mw);
    assert!(package_rs.starts_with("#![allow(dead_code)]\n"), "{package_rs}");
    assert!(package_rs.contains("pub fn exported() -> i32 {"));
    assert!(package_rs.contains("fn helper()"));
    for gone in ["crate_type", "no_mangle", "export_name", "Pg_magic_func"] {
        assert!(!package_rs.contains(gone), "{gone} survived:\n{package_rs}");
    }
    assert_eq!(mw.functions().len(), 1);
}

#[test]
fn shipped_template_splices_into_valid_rust() {
    let template = include_str!("../templates/pl.rs");
    assert!(template.contains(DECLARATION_MARKER));
    assert!(template.contains(DEFAULT_INCLUDE_DIR));
    assert!(template.contains(MAJOR_VERSION_MARKER));

    let (_root, dir) = package("demo", &[("lib.rs", DEMO)]);
    let mw = ModuleWriter::new(&dir).unwrap();
    let glue = render_glue(&mw, template, &server()).unwrap();
    let parsed = syn::parse_file(&glue).unwrap();
    assert!(glue.starts_with("#![crate_type = \"cdylib\"]\n"));
    assert!(glue.contains("const PG_MAJOR: c_int = 15;"));
    assert!(glue.contains(&format!("pub const PG_INCLUDE_DIR: &str = \"{INCLUDE_DIR}\";")));
    assert!(parsed.items.iter().any(|item| matches!(
        item,
        syn::Item::Fn(f) if f.sig.ident == "pg_finfo_greet"
    )));
}
