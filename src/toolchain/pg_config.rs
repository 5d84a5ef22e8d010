//! Discovers the PostgreSQL server the module is built for: its include
//! directory and its major version.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};

const PG_CONFIG: &str = "pg_config";

/// Header carrying `PG_VERSION_NUM`, directly under the server include dir.
const VERSION_HEADER: &str = "pg_config.h";

/// Oldest server whose call interface (`FunctionCallInfoBaseData`) the glue speaks.
pub const MIN_MAJOR_VERSION: u32 = 12;

/// The target server as the glue layer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBuild {
    pub include_dir: String,
    pub major_version: u32,
}

/// Native build configuration the glue layer needs.
pub trait NativeBuildConfig {
    /// Server header search path, already normalized for the host.
    fn include_dir(&self) -> Result<String>;

    /// Major version of the server those headers belong to.
    fn major_version(&self) -> Result<u32> {
        header_major_version(Path::new(&self.include_dir()?))
    }

    /// Both of the above, with the version checked against what the glue supports.
    fn server(&self) -> Result<ServerBuild> {
        let include_dir = self.include_dir()?;
        let major_version = self.major_version()?;
        if major_version < MIN_MAJOR_VERSION {
            return Err(Error::UnsupportedServer {
                version: major_version,
                min: MIN_MAJOR_VERSION,
            });
        }
        debug!("target server: PostgreSQL {major_version}, headers in {include_dir}");
        Ok(ServerBuild {
            include_dir,
            major_version,
        })
    }
}

/// Asks `pg_config --includedir-server` and `pg_config --version`.
#[derive(Debug, Clone, Default)]
pub struct PgConfig {
    /// Explicit `pg_config` binary; looked up on `PATH` otherwise.
    pub program: Option<PathBuf>,
}

impl PgConfig {
    fn query(&self, flag: &str) -> Result<String> {
        let program = match &self.program {
            Some(p) => p.clone(),
            None => which::which(PG_CONFIG).map_err(|_| Error::ToolNotFound {
                tool: PG_CONFIG.to_string(),
            })?,
        };
        debug!("running {} {flag}", program.display());

        let output = Command::new(&program)
            .arg(flag)
            .output()
            .map_err(|e| Error::ToolFailed {
                tool: PG_CONFIG.to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: PG_CONFIG.to_string(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl NativeBuildConfig for PgConfig {
    fn include_dir(&self) -> Result<String> {
        let raw = self.query("--includedir-server")?;
        Ok(normalize_host_path(&expand_short_names(&raw)))
    }

    fn major_version(&self) -> Result<u32> {
        let raw = self.query("--version")?;
        parse_version_output(&raw).ok_or_else(|| Error::ServerVersion {
            origin: format!("{PG_CONFIG} --version"),
            reason: format!("unexpected output `{raw}`"),
        })
    }
}

/// A known include directory, e.g. from `--pg-include`. Without an explicit
/// major version it is read from the headers.
#[derive(Debug, Clone)]
pub struct FixedBuildConfig {
    pub include_dir: String,
    pub major_version: Option<u32>,
}

impl NativeBuildConfig for FixedBuildConfig {
    fn include_dir(&self) -> Result<String> {
        Ok(normalize_host_path(&self.include_dir))
    }

    fn major_version(&self) -> Result<u32> {
        match self.major_version {
            Some(v) => Ok(v),
            None => header_major_version(Path::new(&self.include_dir()?)),
        }
    }
}

/// `PostgreSQL 16.2 (Debian 16.2-1)` → 16, `PostgreSQL 17beta1` → 17.
pub fn parse_version_output(text: &str) -> Option<u32> {
    let rest = text.trim().strip_prefix("PostgreSQL")?.trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Major version from the `#define PG_VERSION_NUM 160002` line of `pg_config.h`.
pub fn parse_version_header(header: &str) -> Option<u32> {
    header.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("#define"), Some("PG_VERSION_NUM"), Some(num)) => {
                num.parse::<u32>().ok().map(|n| n / 10000)
            }
            _ => None,
        }
    })
}

fn header_major_version(include_dir: &Path) -> Result<u32> {
    let path = include_dir.join(VERSION_HEADER);
    let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    parse_version_header(&text).ok_or_else(|| Error::ServerVersion {
        origin: path.display().to_string(),
        reason: "no `PG_VERSION_NUM` definition".into(),
    })
}

/// Brings a path reported by a host tool into the form the generated
/// sources embed: trimmed, no `\\?\` prefix, forward slashes, no trailing
/// separator.
pub fn normalize_host_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(r"\\?\").unwrap_or(trimmed);
    let mut path = trimmed.replace('\\', "/");
    while path.len() > 1 && path.ends_with('/') && !path.ends_with(":/") {
        path.pop();
    }
    path
}

/// `pg_config` on Windows may report 8.3 short names (`C:\PROGRA~1\...`).
#[cfg(windows)]
fn expand_short_names(path: &str) -> String {
    std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(not(windows))]
fn expand_short_names(path: &str) -> String {
    path.to_string()
}
