//! Directory driver contract.

use super::entry::SearchResult;
use crate::config::DriverConfig;
use crate::error::Result;

/// Low-level directory client used by the
/// [`LdapManager`](super::LdapManager).
///
/// The manager awaits every call before issuing the next one, timeouts
/// and retries belong to the implementation.
#[allow(async_fn_in_trait)]
pub trait Driver {
    /// Point the driver at a domain. Drops any open connection.
    fn init(&mut self, config: &DriverConfig);

    /// Check credentials. Invalid credentials are `Ok(false)`, transport
    /// and server failures are errors.
    async fn bind(&mut self, identity: &str, password: &str) -> Result<bool>;

    /// Subtree search under `base_dn`, returning only `attributes`.
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<SearchResult>;
}
