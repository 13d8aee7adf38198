//! # Application Orchestrator
//!
//! Drives manifest files through the pipeline
//!
//! ```text
//! load -> Namespace documents first -> gate -> governance -> updater
//! ```
//!
//! Files are processed in the order given and resources one at a time; each
//! cluster call completes before the next resource starts. The first fatal
//! error aborts the run. Resources applied before it are left in place.
//!
//! Cancellation is cooperative: the applier checks the cancellation flag
//! before each resource and races every updater call against it.

pub mod task;

pub use task::{CommandState, DeploymentTask, RunFailure, TaskResult};

use crate::authz::NamespaceGate;
use crate::error::DeployError;
use crate::governance::GovernanceContext;
use crate::manifest::{load_documents, EnvVars, ManifestDocument, VariableResolver};
use crate::observability::metrics;
use crate::registry::{ManagedResource, ResourceRegistry};
use crate::updater::{
    AppliedResource, ApplyContext, ApplyMode, NoopMonitor, ResourceManager, ResourceUpdateMonitor,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Applies manifest files for one run
pub struct ManifestApplier<M> {
    registry: Arc<ResourceRegistry<M>>,
    manager: Arc<M>,
    mode: ApplyMode,
    governance: Option<GovernanceContext>,
    gate: NamespaceGate,
    monitor: Arc<dyn ResourceUpdateMonitor>,
    resolver: Option<EnvVars>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<M> std::fmt::Debug for ManifestApplier<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestApplier")
            .field("mode", &self.mode)
            .field("governance", &self.governance)
            .field("gate_enforced", &self.gate.is_enforced())
            .field("substitution", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: ResourceManager + 'static> ManifestApplier<M> {
    /// Applier with no governance, no gate and no substitution
    #[must_use]
    pub fn new(registry: Arc<ResourceRegistry<M>>, manager: Arc<M>) -> Self {
        Self {
            registry,
            manager,
            mode: ApplyMode::Apply,
            governance: None,
            gate: NamespaceGate::Bypass,
            monitor: Arc::new(NoopMonitor),
            resolver: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Label governed resources and enforce `gate` on them
    #[must_use]
    pub fn with_governance(mut self, governance: GovernanceContext, gate: NamespaceGate) -> Self {
        self.governance = Some(governance);
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn ResourceUpdateMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Variables for `$NAME` substitution; `None` disables substitution
    pub fn set_resolver(&mut self, resolver: Option<EnvVars>) {
        self.resolver = resolver;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested; never resolves without a
    /// cancellation source
    async fn cancelled(&self) {
        match self.cancel.clone() {
            Some(mut rx) => {
                let sender_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if sender_dropped {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Apply every file in order
    pub async fn apply_files(&self, files: &[PathBuf]) -> Result<Vec<AppliedResource>, DeployError> {
        let mut applied = Vec::new();
        self.apply_files_into(files, &mut applied).await?;
        Ok(applied)
    }

    /// Apply every file in order, appending each result to `applied` as soon
    /// as its cluster call completes
    ///
    /// On error `applied` still holds everything that reached the cluster
    /// before the failure.
    pub async fn apply_files_into(
        &self,
        files: &[PathBuf],
        applied: &mut Vec<AppliedResource>,
    ) -> Result<(), DeployError> {
        for path in files {
            if self.is_cancelled() {
                return Err(DeployError::Interrupted);
            }
            let resolver = self.resolver.as_ref().map(|r| r as &dyn VariableResolver);
            let documents = load_documents(path, resolver).await?;
            if documents.is_empty() {
                warn!(path = %path.display(), "No resources found in configuration file, skipped");
                continue;
            }
            self.apply_documents_into(documents, applied).await?;
        }
        Ok(())
    }

    /// Apply one file's documents: Namespaces first, then the rest in order
    pub async fn apply_documents(
        &self,
        documents: Vec<ManifestDocument>,
    ) -> Result<Vec<AppliedResource>, DeployError> {
        let mut applied = Vec::with_capacity(documents.len());
        self.apply_documents_into(documents, &mut applied).await?;
        Ok(applied)
    }

    async fn apply_documents_into(
        &self,
        documents: Vec<ManifestDocument>,
        applied: &mut Vec<AppliedResource>,
    ) -> Result<(), DeployError> {
        let (namespaces, others): (Vec<_>, Vec<_>) =
            documents.into_iter().partition(ManifestDocument::is_namespace);

        for document in &namespaces {
            applied.extend(self.apply_document(document, false).await?);
        }
        for document in &others {
            applied.extend(self.apply_document(document, true).await?);
        }
        Ok(())
    }

    /// Apply an object built in code, outside governance and the gate
    pub async fn apply_resource<K: ManagedResource>(
        &self,
        resource: &K,
        source: &str,
    ) -> Result<Option<AppliedResource>, DeployError> {
        let document = ManifestDocument::from_resource(resource, source)?;
        self.apply_document(&document, false).await
    }

    /// `Ok(None)` when the kind has no binding and the document was skipped
    async fn apply_document(
        &self,
        document: &ManifestDocument,
        governed: bool,
    ) -> Result<Option<AppliedResource>, DeployError> {
        if self.is_cancelled() {
            return Err(DeployError::Interrupted);
        }

        let binding = match self.registry.lookup(&document.api_version, &document.kind) {
            Ok(binding) => binding,
            Err(e) if !e.is_fatal() => {
                warn!(source = %document.source, name = %document.name(), "{e}");
                metrics::record_resource("skipped");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if governed {
            self.gate.check(document)?;
        }

        let ctx = ApplyContext {
            mode: self.mode,
            governance: if governed { self.governance.as_ref() } else { None },
            monitor: self.monitor.as_ref(),
        };

        info!(
            kind = %document.kind,
            name = %document.name(),
            namespace = document.namespace().unwrap_or_default(),
            "Applying resource"
        );
        let applied = tokio::select! {
            biased;
            () = self.cancelled() => {
                warn!(kind = %document.kind, name = %document.name(), "Interrupted while applying resource");
                return Err(DeployError::Interrupted);
            }
            result = binding.updater.apply(self.manager.as_ref(), document, &ctx) => result?,
        };

        metrics::record_resource(applied.action.as_str());
        info!(
            action = %applied.action,
            kind = %applied.kind,
            name = %applied.name,
            "Resource applied"
        );
        Ok(Some(applied))
    }
}
