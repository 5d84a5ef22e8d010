//! Collaborators outside the generator core: the user's manifest, the glue
//! template, and the PostgreSQL server being built for.
pub mod manifest;
pub mod pg_config;
pub mod template;

pub use pg_config::{
    FixedBuildConfig, MIN_MAJOR_VERSION, NativeBuildConfig, PgConfig, ServerBuild,
    normalize_host_path,
};
pub use template::{RUNTIME_CRATE, TemplateConfig, read_template};
