// src/identity.rs

//! Host identity lookups used to decorate the child environment.
//!
//! The executor never reaches for global metadata; callers inject an
//! [`IdentityProvider`] instead. Lookup failures are non-fatal: the matching
//! environment variable is simply left out.

use std::fmt::Debug;

use anyhow::{Result, anyhow};

/// Source of the agent's instance id and region.
pub trait IdentityProvider: Send + Sync + Debug {
    fn instance_id(&self) -> Result<String>;
    fn region(&self) -> Result<String>;
}

/// Identity with fixed values, typically taken from the `[identity]` config
/// section. Missing values behave like failed lookups.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    instance_id: Option<String>,
    region: Option<String>,
}

impl StaticIdentity {
    pub fn new(instance_id: Option<String>, region: Option<String>) -> Self {
        Self {
            instance_id,
            region,
        }
    }

    /// An identity that knows nothing.
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn instance_id(&self) -> Result<String> {
        self.instance_id
            .clone()
            .ok_or_else(|| anyhow!("instance id is not configured"))
    }

    fn region(&self) -> Result<String> {
        self.region
            .clone()
            .ok_or_else(|| anyhow!("region is not configured"))
    }
}
