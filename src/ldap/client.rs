//! LDAP support.

use std::time::Duration;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};

use super::driver::Driver;
use super::entry::{LdapEntry, SearchResult};
use super::escape::escape_value;
use crate::config::{AccountCanonicalForm, DriverConfig};
use crate::error::{LdapManagerError, Result};

const LDAPS_PORT: u16 = 636;
const DEFAULT_PORT: u16 = 389;
/// `invalidCredentials` result code.
const INVALID_CREDENTIALS: u32 = 49;
const DEFAULT_ACCOUNT_FILTER: &str = "(&(objectClass=posixAccount)(uid=%s))";
/// Requests no attribute at all.
const NO_ATTRIBUTES: &str = "1.1";

/// [`Driver`] talking to a real directory through [`ldap3`].
///
/// Connections are opened lazily. After a successful bind the connection
/// stays bound as the user and later searches run with its rights; without
/// one, searches use the service account of the domain.
#[derive(Default)]
pub struct Ldap3Driver {
    config: Option<DriverConfig>,
    conn: Option<Ldap>,
}

impl Ldap3Driver {
    /// Create a new [`Ldap3Driver`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection, without binding.
    async fn connect(config: &DriverConfig) -> Result<Ldap> {
        let url = server_url(config);
        let mut settings =
            LdapConnSettings::new().set_starttls(config.use_start_tls);
        if let Some(timeout) = config.network_timeout {
            settings = settings.set_conn_timeout(Duration::from_secs(timeout));
        }

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                tracing::warn!(error = %err, "LDAP connection driver error");
            }
        });
        tracing::debug!(%url, "connected to LDAP");

        Ok(ldap)
    }

    /// Bind with the service account, or stay anonymous without one.
    async fn bind_service_account(
        ldap: &mut Ldap,
        config: &DriverConfig,
    ) -> Result<()> {
        if let Some(username) = &config.username {
            let password = config.password.as_deref().unwrap_or_default();
            ldap.simple_bind(username, password).await?.success()?;
            tracing::debug!(%username, "bound LDAP service account");
        }
        Ok(())
    }

    /// Find the DN of an account with the domain account filter.
    async fn lookup_dn(
        ldap: &mut Ldap,
        config: &DriverConfig,
        name: &str,
    ) -> Result<Option<String>> {
        Self::bind_service_account(ldap, config).await?;

        let filter = account_filter(config, name);
        let base_dn = config.base_dn.as_deref().unwrap_or_default();
        let (mut entries, _res) = ldap
            .search(base_dn, Scope::Subtree, &filter, vec![NO_ATTRIBUTES])
            .await?
            .success()?;
        tracing::debug!(%filter, count = entries.len(), "performed LDAP account DN lookup");

        if entries.len() > 1 {
            return Err(LdapManagerError::TooManyObjects);
        }
        Ok(entries.pop().map(|entry| SearchEntry::construct(entry).dn))
    }

    /// Bind `ldap` as the account. The connection stays bound on success.
    async fn authenticate(
        ldap: &mut Ldap,
        config: &DriverConfig,
        identity: &str,
        account: &Account<'_>,
        password: &str,
    ) -> Result<bool> {
        let bind_dn = if is_dn(identity) {
            identity.to_owned()
        } else if config.bind_requires_dn
            || canonical_form(config) == AccountCanonicalForm::Dn
        {
            match Self::lookup_dn(ldap, config, account.name).await? {
                Some(dn) => dn,
                None => {
                    tracing::debug!(host = %config.host, "account not found");
                    return Ok(false);
                },
            }
        } else {
            canonical_name(config, account)
        };

        let result = ldap.simple_bind(&bind_dn, password).await?;
        if result.rc == INVALID_CREDENTIALS {
            tracing::debug!(host = %config.host, "invalid LDAP credentials");
            return Ok(false);
        }
        result.success()?;

        Ok(true)
    }

    /// Connection for searches, opened on first use.
    async fn connection(&mut self) -> Result<&mut Ldap> {
        if self.conn.is_none() {
            let config = self
                .config
                .as_ref()
                .ok_or(LdapManagerError::DriverNotInitialized)?;
            let mut ldap = Self::connect(config).await?;
            Self::bind_service_account(&mut ldap, config).await?;
            self.conn = Some(ldap);
        }

        self.conn
            .as_mut()
            .ok_or(LdapManagerError::DriverNotInitialized)
    }
}

impl Driver for Ldap3Driver {
    fn init(&mut self, config: &DriverConfig) {
        if config.opt_referrals {
            tracing::debug!(
                host = %config.host,
                "referral chasing requested but not supported, ignoring"
            );
        }

        self.config = Some(config.clone());
        if let Some(ldap) = self.conn.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(release(ldap));
                },
                Err(_) => tracing::debug!(
                    "no async runtime, LDAP connection dropped without unbind"
                ),
            }
        }
    }

    async fn bind(&mut self, identity: &str, password: &str) -> Result<bool> {
        let config = self
            .config
            .as_ref()
            .ok_or(LdapManagerError::DriverNotInitialized)?;

        // An empty password would turn into an unauthenticated bind, which
        // servers accept for any DN.
        if password.is_empty() && !config.allow_empty_password {
            tracing::debug!("empty password refused");
            return Ok(false);
        }

        let account = Account::parse(identity, config.try_username_split);
        if !account.is_authority(config) {
            tracing::debug!(
                host = %config.host,
                "domain is not an authority for the account"
            );
            return Ok(false);
        }

        let mut ldap = Self::connect(config).await?;
        let authenticated =
            Self::authenticate(&mut ldap, config, identity, &account, password)
                .await;

        if matches!(authenticated, Ok(true)) {
            if let Some(previous) = self.conn.replace(ldap) {
                release(previous).await;
            }
        } else {
            release(ldap).await;
        }

        authenticated
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<SearchResult> {
        let ldap = self.connection().await?;
        let (entries, _res) = ldap
            .search(base_dn, Scope::Subtree, filter, attributes.to_vec())
            .await?
            .success()?;
        tracing::debug!(%base_dn, %filter, count = entries.len(), "performed LDAP search");

        Ok(SearchResult::new(
            entries
                .into_iter()
                .map(|entry| LdapEntry::from(SearchEntry::construct(entry)))
                .collect(),
        ))
    }
}

/// Unbind a connection the driver is done with.
async fn release(mut ldap: Ldap) {
    if let Err(err) = ldap.unbind().await {
        tracing::debug!(error = %err, "LDAP unbind failed");
    }
}

/// Account name, split from its domain qualifier.
#[derive(Debug, PartialEq, Eq)]
struct Account<'a> {
    name: &'a str,
    domain: Option<&'a str>,
}

impl<'a> Account<'a> {
    /// Accepts `user`, `DOMAIN\user` and `user@domain`. DNs, and every
    /// identity when `split` is off, are kept whole.
    fn parse(identity: &'a str, split: bool) -> Self {
        if !split || is_dn(identity) {
            return Self {
                name: identity,
                domain: None,
            };
        }

        if let Some((domain, name)) = identity.split_once('\\') {
            Self {
                name,
                domain: Some(domain),
            }
        } else if let Some((name, domain)) = identity.rsplit_once('@') {
            Self {
                name,
                domain: Some(domain),
            }
        } else {
            Self {
                name: identity,
                domain: None,
            }
        }
    }

    /// Whether the configured domain may authenticate this account.
    fn is_authority(&self, config: &DriverConfig) -> bool {
        let Some(domain) = self.domain else {
            return true;
        };

        let names = [
            config.account_domain_name.as_deref(),
            config.account_domain_name_short.as_deref(),
        ];
        if names.iter().all(Option::is_none) {
            return true;
        }

        names
            .into_iter()
            .flatten()
            .any(|name| name.eq_ignore_ascii_case(domain))
    }
}

fn is_dn(identity: &str) -> bool {
    identity.contains('=')
}

fn is_qualified(name: &str) -> bool {
    name.contains('\\') || name.contains('@')
}

/// `ldap://host:port`, or `ldaps://` with SSL. A host carrying its own
/// scheme is used as is.
fn server_url(config: &DriverConfig) -> String {
    if config.host.contains("://") {
        return config.host.clone();
    }

    if config.use_ssl {
        let port = if config.port == DEFAULT_PORT {
            LDAPS_PORT
        } else {
            config.port
        };
        format!("ldaps://{}:{port}", config.host)
    } else {
        format!("ldap://{}:{}", config.host, config.port)
    }
}

fn canonical_form(config: &DriverConfig) -> AccountCanonicalForm {
    if let Some(form) = config.account_canonical_form {
        form
    } else if config.account_domain_name_short.is_some() {
        AccountCanonicalForm::Backslash
    } else if config.account_domain_name.is_some() {
        AccountCanonicalForm::Principal
    } else {
        AccountCanonicalForm::Username
    }
}

/// Account name in the canonical form of the domain. A name that was not
/// split but is already qualified is kept as entered.
fn canonical_name(config: &DriverConfig, account: &Account) -> String {
    if account.domain.is_none() && is_qualified(account.name) {
        return account.name.to_owned();
    }

    match canonical_form(config) {
        AccountCanonicalForm::Backslash => {
            match config.account_domain_name_short.as_deref().or(account.domain) {
                Some(short) => format!("{short}\\{}", account.name),
                None => account.name.to_owned(),
            }
        },
        AccountCanonicalForm::Principal => {
            match config.account_domain_name.as_deref().or(account.domain) {
                Some(domain) => format!("{}@{domain}", account.name),
                None => account.name.to_owned(),
            }
        },
        AccountCanonicalForm::Username | AccountCanonicalForm::Dn => {
            account.name.to_owned()
        },
    }
}

fn account_filter(config: &DriverConfig, name: &str) -> String {
    config
        .account_filter_format
        .as_deref()
        .unwrap_or(DEFAULT_ACCOUNT_FILTER)
        .replace("%s", &escape_value(name))
}
