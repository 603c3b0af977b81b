//! aft compose - the package render pipeline and its collaborators
//!
//! - [`unpack`]: render a package into its compose directory
//! - [`up`] / [`down`] / [`apply`]: drive `docker compose` with sops-encrypted env files
//! - [`SecretStore`]: where secret values live
//! - [`ToolRunner`]: how external programs are run
//! - [`setup`]: age key, certificates and docker network for a new host

pub mod context;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod materialize;
pub mod packages;
pub mod setup;
pub mod store;
pub mod tools;
pub mod unpack;

pub use context::{Encryption, ExecutionContext};
pub use error::{ComposeError, Result};
pub use lifecycle::{ComposeTarget, apply, down, up};
pub use manifest::{ComposeManifest, ComposeService, VolumeMount};
pub use materialize::{
    MaterializeOutcome, MaterializeReport, SlotReport, SlotSource, materialize_secrets,
};
pub use packages::{
    ImportedPackage, import_package, resolve_package, resolve_package_dir, resolve_service,
};
pub use setup::{CertificateFiles, SetupReport, ToolStatus, check_tools, setup};
pub use store::{
    FileSecretStore, ImportReport, MemorySecretStore, SecretRecord, SecretStore, import_secrets,
};
pub use tools::{MockToolRunner, SystemToolRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use unpack::{UnpackOptions, UnpackReport, unpack};
