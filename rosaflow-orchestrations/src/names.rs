//! Name constants for rosaflow orchestrations
//!
//! Used as the `action` of a [`crate::error::ClusterError`] and as the span name
//! of a saga run.

/// Orchestration names
pub mod orchestrations {
    /// Provision a ROSA cluster and every dependency it needs
    ///
    /// **Input:** [`rosaflow_models::DefaultedCreateOptions`]
    /// **Output:** the new cluster id
    /// **Phases:** nightly version, region, account roles, OIDC config,
    /// network stack, validation, create call, install wait, health check
    /// **Duration:** ~15 minutes (hosted) to ~1 hour (classic)
    pub const CREATE_CLUSTER: &str = "create cluster";

    /// Delete a ROSA cluster and the dependencies created for it
    ///
    /// **Input:** [`rosaflow_models::DefaultedDeleteOptions`]
    /// **Phases:** lookup, delete call, uninstall wait, operator roles,
    /// OIDC provider, OIDC config, network stack, account roles
    /// **Duration:** ~10-30 minutes
    pub const DELETE_CLUSTER: &str = "delete cluster";
}
