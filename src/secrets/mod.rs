//! # Registry Pull Secret
//!
//! Naming and construction of the image pull secret a run creates when
//! registry credentials are configured.

pub mod docker;
pub mod name;

pub use docker::{build_dockercfg, pull_secret, RegistryCredential};
pub use name::{derive_name, derive_name_with, validate_name};
