use clap::Parser;
use std::path::PathBuf;

use crate::toolchain::manifest::find_manifest;
use crate::toolchain::{FixedBuildConfig, NativeBuildConfig, PgConfig, TemplateConfig};

/// Build a PostgreSQL extension from the `pub fn`s of a Rust package.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Package directory holding the `#![crate_type = "cdylib"]` sources
    #[arg(default_value = ".")]
    pub package: PathBuf,
    /// Build directory (a fresh temporary directory by default)
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Extension name (defaults to the package directory's name)
    #[arg(long)]
    pub name: Option<String>,
    /// Project manifest (the nearest Cargo.toml above the package by default)
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    /// Directory containing a `plrs` checkout; may be repeated
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,
    /// Cargo home whose registry cache holds released `plrs` sources
    #[arg(long, env = "CARGO_HOME")]
    pub cargo_home: Option<PathBuf>,
    /// Server include directory; skips running pg_config
    #[arg(long, value_name = "DIR")]
    pub pg_include: Option<String>,
    /// Server major version; read from `<pg-include>/pg_config.h` when omitted
    #[arg(long, value_name = "N", requires = "pg_include")]
    pub pg_major: Option<u32>,
    /// pg_config binary to query
    #[arg(long, value_name = "PATH", conflicts_with = "pg_include")]
    pub pg_config: Option<PathBuf>,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| find_manifest(&self.package))
    }

    pub fn template_config(&self) -> TemplateConfig {
        let module_cache_path = self.cargo_home.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cargo"))
        });
        TemplateConfig {
            search_paths: self.search_paths.clone(),
            manifest_path: self.manifest_path(),
            module_cache_path,
        }
    }

    pub fn build_config(&self) -> Box<dyn NativeBuildConfig> {
        match &self.pg_include {
            Some(dir) => Box::new(FixedBuildConfig {
                include_dir: dir.clone(),
                major_version: self.pg_major,
            }),
            None => Box::new(PgConfig {
                program: self.pg_config.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["plrs"]);
        assert_eq!(cli.package, PathBuf::from("."));
        assert!(cli.out.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_pg_include_skips_pg_config() {
        let cli = Cli::parse_from([
            "plrs",
            "ext",
            "--pg-include",
            "/pg/server/",
            "--pg-major",
            "14",
            "-vv",
        ]);
        let server = cli.build_config().server().unwrap();
        assert_eq!(server.include_dir, "/pg/server");
        assert_eq!(server.major_version, 14);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_search_paths_repeat() {
        let cli = Cli::parse_from([
            "plrs",
            "--search-path",
            "/a",
            "--search-path",
            "/b",
            "--manifest",
            "/p/Cargo.toml",
        ]);
        let config = cli.template_config();
        assert_eq!(config.search_paths, [PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(config.manifest_path, PathBuf::from("/p/Cargo.toml"));
    }

    #[test]
    fn test_pg_options_conflict() {
        let parsed = Cli::try_parse_from(["plrs", "--pg-include", "/x", "--pg-config", "/y"]);
        assert!(parsed.is_err());
        let parsed = Cli::try_parse_from(["plrs", "--pg-major", "16"]);
        assert!(parsed.is_err());
    }
}
