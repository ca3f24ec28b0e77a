//! Create and delete sagas

mod compensation;
mod create_cluster;
mod delete_cluster;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{ClusterError, Phase, PhaseError};
use crate::provider::Provider;

pub use compensation::{CreatedResource, CreatedResources};
pub use create_cluster::create_cluster;
pub use delete_cluster::delete_cluster;

/// Per-run state shared by the phases of one saga
struct Saga<'a> {
    action: &'static str,
    provider: &'a Provider,
    cancel: &'a CancellationToken,
    /// Set once the cluster object exists
    cluster_id: Option<String>,
}

impl<'a> Saga<'a> {
    fn new(action: &'static str, provider: &'a Provider, cancel: &'a CancellationToken) -> Self {
        Self {
            action,
            provider,
            cancel,
            cluster_id: None,
        }
    }

    fn fail(&self, phase: Phase, source: impl Into<PhaseError>) -> ClusterError {
        ClusterError {
            action: self.action,
            phase,
            cluster_id: self.cluster_id.clone(),
            source: source.into(),
        }
    }

    /// Run one phase. Cancellation drops the phase's future and wins over its
    /// result.
    async fn phase<T, E, F>(&self, phase: Phase, work: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<PhaseError>,
    {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PhaseError::Cancelled),
            outcome = work => outcome.map_err(Into::into),
        };
        outcome.map_err(|source| self.fail(phase, source))
    }
}
