//! Multi-domain LDAP manager.
//!
//! Domains are tried in declaration order. The first domain that accepts a
//! bind, or that knows a looked-up user, is pinned for the rest of the
//! session and every later call goes straight to it.

use std::fmt;
use std::sync::Arc;

use validator::Validate;

use super::driver::Driver;
use super::filter::{Condition, build_filter};
use super::hydrator::{AttributeMapping, hydrate};
use crate::config::{DomainConfig, DriverConfig, UserConfig};
use crate::error::{LdapManagerError, Result};
use crate::user::{LocalUser, UserRepository};

/// User search parameters of a domain, with setters resolved.
struct UserParams<U> {
    base_dn: String,
    filter: String,
    mappings: Vec<AttributeMapping<U>>,
}

impl<U: LocalUser> UserParams<U> {
    fn resolve(config: &UserConfig) -> Result<Self> {
        let mappings = config
            .attributes
            .iter()
            .map(AttributeMapping::resolve)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base_dn: config.base_dn.clone(),
            filter: config.filter.clone(),
            mappings,
        })
    }
}

struct Domain<U> {
    id: String,
    driver: DriverConfig,
    user: Arc<UserParams<U>>,
}

/// Parameters of the pinned domain.
///
/// Obtained from [`LdapManager::session`] once a domain succeeded, and
/// handed back to another manager with [`LdapManager::resume`].
pub struct DomainSession<U> {
    domain_id: String,
    params: Arc<UserParams<U>>,
    attributes: Vec<String>,
}

impl<U> DomainSession<U> {
    fn new(domain: &Domain<U>) -> Self {
        let attributes = domain
            .user
            .mappings
            .iter()
            .map(|mapping| mapping.ldap_attr().to_owned())
            .collect();

        Self {
            domain_id: domain.id.clone(),
            params: Arc::clone(&domain.user),
            attributes,
        }
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    pub fn base_dn(&self) -> &str {
        &self.params.base_dn
    }

    pub fn filter(&self) -> &str {
        &self.params.filter
    }

    /// Attributes requested on every search, in attribute map order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Attribute matched against usernames: the first mapped one.
    pub fn username_attribute(&self) -> &str {
        self.attributes.first().map(String::as_str).unwrap_or_default()
    }

    fn mappings(&self) -> &[AttributeMapping<U>] {
        &self.params.mappings
    }
}

impl<U> Clone for DomainSession<U> {
    fn clone(&self) -> Self {
        Self {
            domain_id: self.domain_id.clone(),
            params: Arc::clone(&self.params),
            attributes: self.attributes.clone(),
        }
    }
}

impl<U> fmt::Debug for DomainSession<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainSession")
            .field("domain_id", &self.domain_id)
            .field("base_dn", &self.params.base_dn)
            .field("filter", &self.params.filter)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// LDAP manager for multiple domains.
///
/// A manager holds the state of one authentication session: share it
/// between sessions and a user could be looked up in the domain another
/// user was pinned to.
pub struct LdapManager<D, R: UserRepository> {
    driver: D,
    users: R,
    domains: Vec<Domain<R::User>>,
    session: Option<DomainSession<R::User>>,
}

impl<D, R> LdapManager<D, R>
where
    D: Driver,
    R: UserRepository,
{
    /// Create a new [`LdapManager`].
    ///
    /// Every domain is validated and its setter names resolved here, so
    /// a typo in the attribute map fails at startup.
    pub fn new(driver: D, users: R, domains: Vec<DomainConfig>) -> Result<Self> {
        let domains = domains
            .into_iter()
            .map(|domain| -> Result<Domain<R::User>> {
                domain.validate()?;
                Ok(Domain {
                    user: Arc::new(UserParams::resolve(&domain.user)?),
                    id: domain.id,
                    driver: domain.driver,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            driver,
            users,
            domains,
            session: None,
        })
    }

    /// Pinned domain, if any.
    pub fn session(&self) -> Option<&DomainSession<R::User>> {
        self.session.as_ref()
    }

    /// Pin a domain found by an earlier session.
    pub fn resume(&mut self, session: DomainSession<R::User>) -> Result<()> {
        let domain = self
            .domains
            .iter()
            .find(|domain| domain.id == session.domain_id)
            .ok_or_else(|| LdapManagerError::UnknownDomain(session.domain_id.clone()))?;

        self.driver.init(&domain.driver);
        tracing::debug!(domain = %session.domain_id, "LDAP domain session resumed");
        self.session = Some(session);

        Ok(())
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Check the password of `user`.
    ///
    /// Once a domain is pinned only that domain is asked. A wrong password
    /// is `Ok(false)`, whichever domains were tried.
    pub async fn bind(&mut self, user: &R::User, password: &str) -> Result<bool> {
        let identity = user.bind_identity();

        if self.session.is_some() {
            return self.driver.bind(identity, password).await;
        }

        for domain in &self.domains {
            self.driver.init(&domain.driver);

            if self.driver.bind(identity, password).await? {
                tracing::info!(domain = %domain.id, "LDAP domain pinned after bind");
                self.session = Some(DomainSession::new(domain));
                return Ok(true);
            }
            tracing::debug!(domain = %domain.id, "LDAP bind refused");
        }

        Ok(false)
    }

    /// Find a user by the username attribute of the domain.
    ///
    /// Without a pinned domain, every domain is probed in order and the
    /// first one knowing the user is pinned. `Ok(None)` when no domain
    /// does.
    pub async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<R::User>> {
        if let Some(session) = &self.session {
            let criteria = [(session.username_attribute(), username)];
            return search_user(&mut self.driver, &self.users, session, &criteria)
                .await;
        }

        for domain in &self.domains {
            self.driver.init(&domain.driver);

            // Only pinned once the user is found.
            let candidate = DomainSession::new(domain);
            let criteria = [(candidate.username_attribute(), username)];
            let user =
                search_user(&mut self.driver, &self.users, &candidate, &criteria)
                    .await?;

            if let Some(user) = user {
                tracing::info!(domain = %domain.id, "LDAP domain pinned after lookup");
                self.session = Some(candidate);
                return Ok(Some(user));
            }
            tracing::debug!(domain = %domain.id, "user not found in LDAP domain");
        }

        Ok(None)
    }

    /// Find the single user matching every criterion in the pinned domain.
    pub async fn find_user_by<K, V>(
        &mut self,
        criteria: &[(K, V)],
    ) -> Result<Option<R::User>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let session = self
            .session
            .as_ref()
            .ok_or(LdapManagerError::NoActiveDomain)?;

        search_user(&mut self.driver, &self.users, session, criteria).await
    }

    /// Filter for `criteria` in the pinned domain.
    pub fn build_filter<K, V>(
        &self,
        criteria: &[(K, V)],
        condition: Condition,
    ) -> Result<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let session = self
            .session
            .as_ref()
            .ok_or(LdapManagerError::NoActiveDomain)?;

        Ok(build_filter(session.filter(), criteria, condition))
    }
}

async fn search_user<D, R, K, V>(
    driver: &mut D,
    users: &R,
    session: &DomainSession<R::User>,
    criteria: &[(K, V)],
) -> Result<Option<R::User>>
where
    D: Driver,
    R: UserRepository,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let filter = build_filter(session.filter(), criteria, Condition::And);
    tracing::debug!(domain = %session.domain_id, %filter, "searching LDAP user");

    let mut result = driver
        .search(session.base_dn(), &filter, session.attributes())
        .await?;

    if result.count() > 1 {
        tracing::warn!(
            domain = %session.domain_id,
            %filter,
            count = result.count(),
            "LDAP search matched several users"
        );
        return Err(LdapManagerError::TooManyObjects);
    }

    let Some(entry) = result.entries.pop() else {
        return Ok(None);
    };

    let user = hydrate(users.create_user(), &entry, session.mappings())?;
    Ok(Some(user))
}
