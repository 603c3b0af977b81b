//! aft core - types shared by the render pipeline
//!
//! - [`LoadedPackage`]: a package directory and its `aft.yaml`
//! - [`Values`] / [`ValueBuilder`]: the render context and its cascade
//! - [`SecretSlot`], [`SecretGenerator`], [`SecretMasker`]: secret declarations
//! - [`SourceFiles`]: override directory resolution
//! - [`PackageCache`]: where each service was rendered from and to
//! - [`AftConfig`]: user configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod overrides;
pub mod package;
pub mod paths;
pub mod secrets;
pub mod values;

pub use cache::{PackageCache, PackageCacheEntry, UpsertKind};
pub use config::AftConfig;
pub use error::{CoreError, Result};
pub use overrides::{SourceFiles, resolve_override};
pub use package::{LoadedPackage, PackageSpec};
pub use secrets::{
    CharClasses, EnvFile, GeneratedSecret, SecretGenerator, SecretMasker, SecretSlot,
    format_env_line, load_declarations,
};
pub use values::{ValueBuilder, Values, VolumePaths, parse_set_values};
