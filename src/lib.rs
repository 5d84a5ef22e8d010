pub mod cli;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod toolchain;
pub mod writer;

pub use error::{Error, Result};
pub use processor::ModuleWriter;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Writes the module sources, then the packaging artifacts, into `dir`.
pub fn generate(
    mw: &ModuleWriter,
    dir: &Path,
    template: &str,
    server: &toolchain::ServerBuild,
    dependencies: &toml::Table,
) -> Result<()> {
    mw.write_module(dir, template, server)?;
    writer::artifacts::emit(mw, dir, dependencies)?;
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing(args.verbose);

    // 1. ── Analyze ────────────────────────────────────────────────────
    let mut mw = ModuleWriter::new(&args.package)
        .with_context(|| format!("Analyzing {}", args.package.display()))?;
    if let Some(name) = &args.name {
        mw = mw.with_name(name.clone());
    }

    // 2. ── Collaborators ──────────────────────────────────────────────
    let template_config = args.template_config();
    let template =
        toolchain::read_template(&template_config).with_context(|| "Locating the glue template")?;
    let server = args
        .build_config()
        .server()
        .with_context(|| "Querying the PostgreSQL server configuration")?;
    let dependencies =
        match toolchain::manifest::dependencies(&template_config.manifest_path, toolchain::RUNTIME_CRATE) {
            Ok(deps) => deps,
            Err(Error::ManifestMissing { path }) => {
                debug!("no manifest at {}, generated crate has no dependencies", path.display());
                toml::Table::new()
            }
            Err(e) => return Err(e).with_context(|| "Reading project dependencies"),
        };

    // 3. ── Write outputs ──────────────────────────────────────────────
    let dir = writer::build_dir(args.out.as_deref()).with_context(|| "Creating the build directory")?;
    generate(&mw, &dir, &template, &server, &dependencies)
        .with_context(|| format!("Writing module {} to {}", mw.name, dir.display()))?;

    info!(
        "module {} ready; run `make install` in {}",
        mw.name,
        dir.display()
    );
    println!("{}", dir.display());
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
