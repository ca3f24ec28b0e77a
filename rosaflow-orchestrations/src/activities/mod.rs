//! Provisioning steps the sagas are composed of
//!
//! Each step is an async function over the collaborator traits and returns its
//! own error type.

pub mod account_roles;
pub mod cluster;
pub mod network_stack;
pub mod oidc_config;
pub mod operator_roles;
pub mod regions;
pub mod versions;

/// A dependency that was either found or created by the step
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    /// Only created dependencies are torn down on failure
    pub created: bool,
}

impl<T> Resolved<T> {
    pub fn existing(value: T) -> Self {
        Self { value, created: false }
    }

    pub fn created(value: T) -> Self {
        Self { value, created: true }
    }
}
