use std::collections::HashMap;

use ldap3::LdapError;

use super::driver::Driver;
use super::entry::{LdapEntry, SearchResult};
use crate::config::DriverConfig;
use crate::error::{LdapManagerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Init {
        host: String,
    },
    Bind {
        host: String,
        identity: String,
    },
    Search {
        host: String,
        base_dn: String,
        filter: String,
        attributes: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct TestDirectory {
    // identity: password
    accounts: HashMap<String, String>,
    // filter: entries
    results: HashMap<String, Vec<LdapEntry>>,
    unreachable: bool,
}

/// A driver simulating one directory per configured host.
///
/// Every call is recorded and may be verified with `events`. Searches
/// answer with the entries registered for the exact filter string, so
/// tests also pin down the filters the manager builds.
#[derive(Debug, Default)]
pub struct TestDriver {
    host: Option<String>,
    directories: HashMap<String, TestDirectory>,
    events: Vec<DriverEvent>,
}

impl TestDriver {
    pub fn with_account(mut self, host: &str, identity: &str, password: &str) -> Self {
        self.directories
            .entry(host.to_owned())
            .or_default()
            .accounts
            .insert(identity.to_owned(), password.to_owned());
        self
    }

    pub fn with_search_result(
        mut self,
        host: &str,
        filter: &str,
        entries: Vec<LdapEntry>,
    ) -> Self {
        self.directories
            .entry(host.to_owned())
            .or_default()
            .results
            .insert(filter.to_owned(), entries);
        self
    }

    pub fn with_unreachable(mut self, host: &str) -> Self {
        self.directories.entry(host.to_owned()).or_default().unreachable = true;
        self
    }

    pub fn events(&self) -> &[DriverEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn current(&self) -> Result<(String, Option<&TestDirectory>)> {
        let host = self
            .host
            .clone()
            .ok_or(LdapManagerError::DriverNotInitialized)?;
        let directory = self.directories.get(&host);
        if directory.is_some_and(|d| d.unreachable) {
            return Err(LdapError::EndOfStream.into());
        }
        Ok((host, directory))
    }
}

impl Driver for TestDriver {
    fn init(&mut self, config: &DriverConfig) {
        self.host = Some(config.host.clone());
        self.events.push(DriverEvent::Init {
            host: config.host.clone(),
        });
    }

    async fn bind(&mut self, identity: &str, password: &str) -> Result<bool> {
        let (host, directory) = self.current()?;
        let success = directory
            .and_then(|d| d.accounts.get(identity))
            .is_some_and(|expected| expected == password);

        self.events.push(DriverEvent::Bind {
            host,
            identity: identity.to_owned(),
        });
        Ok(success)
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<SearchResult> {
        let (host, directory) = self.current()?;
        let entries = directory
            .and_then(|d| d.results.get(filter))
            .cloned()
            .unwrap_or_default();

        self.events.push(DriverEvent::Search {
            host,
            base_dn: base_dn.to_owned(),
            filter: filter.to_owned(),
            attributes: attributes.to_vec(),
        });
        Ok(SearchResult::new(entries))
    }
}
