//! Data model shared by the rosaflow orchestrations and CLI.
//!
//! Options records describe what the caller asks for, records describe what the
//! cluster manager reports back, and resources are the value objects produced by
//! the individual provisioning steps.

mod environment;
mod options;
mod records;
mod resources;

pub use environment::{OcmEnvironment, Partition, UnknownEnvironment};
pub use options::{
    CreateClusterOptions, DefaultedCreateOptions, DefaultedDeleteOptions, DeleteClusterOptions,
};
pub use records::{ClusterRecord, ClusterState, OidcConfig, Region, Version};
pub use resources::{AccountRoleKind, AccountRoles, NetworkStack};

/// Prefix shared by account roles that are not owned by a single cluster.
pub const DEFAULT_ACCOUNT_ROLES_PREFIX: &str = "ManagedOpenShift";
