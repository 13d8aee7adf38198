//! # kube-deployer
//!
//! Applies Kubernetes manifests on behalf of a deployment pipeline.
//!
//! A run discovers manifest files in a workspace, optionally substitutes
//! `$VAR` placeholders, and pushes every resource to the cluster with
//! create-or-replace semantics (or deletes them). When the run carries
//! governance metadata (app code, tenant code, project name) each resource
//! must target a namespace the app-manager allows, and workloads, services,
//! secrets, ingresses and autoscalers are labeled with the platform's
//! ownership vocabulary on the way through.
//!
//! ## Modules
//!
//! - [`manifest`]: file discovery, variable substitution, multi-document loading
//! - [`registry`]: `(apiVersion, kind)` to typed updater table
//! - [`authz`]: namespace allow-set, gate and app-manager client
//! - [`governance`]: label vocabulary and per-kind injection
//! - [`updater`]: fetch/create/replace/delete state machine and cluster backends
//! - [`secrets`]: registry pull secret naming and construction
//! - [`deploy`]: orchestrator and the end-to-end deployment task

pub mod authz;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod error;
pub mod governance;
pub mod manifest;
pub mod observability;
pub mod registry;
pub mod secrets;
pub mod updater;

pub use deploy::{CommandState, DeploymentTask, ManifestApplier, TaskResult};
pub use error::{DeployError, DeployErrorKind};
