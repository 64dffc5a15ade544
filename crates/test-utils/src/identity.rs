use anyhow::{anyhow, Result};
use cmdexec::identity::IdentityProvider;

/// Identity provider whose lookups always fail, like a host without
/// reachable metadata.
#[derive(Debug, Clone, Default)]
pub struct FailingIdentity;

impl IdentityProvider for FailingIdentity {
    fn instance_id(&self) -> Result<String> {
        Err(anyhow!("instance metadata unreachable"))
    }

    fn region(&self) -> Result<String> {
        Err(anyhow!("instance metadata unreachable"))
    }
}
