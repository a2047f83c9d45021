//! Configuration manager for dirauth.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_PORT: u16 = 389;

/// Root of the `config.yaml` file.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct Configuration {
    /// Default `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory domains, in declaration order.
    #[serde(default, deserialize_with = "ordered_domains")]
    #[validate(nested)]
    pub domains: Vec<DomainConfig>,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            domains: Vec::new(),
            path: PathBuf::new(),
        }
    }
}

/// One directory domain: how to reach it and how to map its users.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct DomainConfig {
    /// Key the domain is declared under.
    #[serde(skip)]
    pub id: String,
    #[validate(nested)]
    pub driver: DriverConfig,
    #[validate(nested)]
    pub user: UserConfig,
}

/// Connection parameters handed to the directory driver.
#[derive(Clone, PartialEq, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "validate_tls"))]
pub struct DriverConfig {
    /// Hostname or `ldap[s]://` URL of the server.
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,
    pub port: u16,
    pub use_start_tls: bool,
    pub use_ssl: bool,
    /// Service account used for searches and DN lookups.
    pub username: Option<String>,
    pub password: Option<String>,
    pub bind_requires_dn: bool,
    pub base_dn: Option<String>,
    pub account_canonical_form: Option<AccountCanonicalForm>,
    pub account_domain_name: Option<String>,
    pub account_domain_name_short: Option<String>,
    /// Search filter used to find an account DN, `%s` is the username.
    pub account_filter_format: Option<String>,
    pub allow_empty_password: bool,
    pub opt_referrals: bool,
    pub try_username_split: bool,
    /// Connection timeout, in seconds.
    pub network_timeout: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: String::default(),
            port: DEFAULT_PORT,
            use_start_tls: false,
            use_ssl: false,
            username: None,
            password: None,
            bind_requires_dn: false,
            base_dn: None,
            account_canonical_form: None,
            account_domain_name: None,
            account_domain_name_short: None,
            account_filter_format: None,
            allow_empty_password: false,
            opt_referrals: false,
            try_username_split: true,
            network_timeout: None,
        }
    }
}

// Keeps service passwords out of logs.
impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_start_tls", &self.use_start_tls)
            .field("use_ssl", &self.use_ssl)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("bind_requires_dn", &self.bind_requires_dn)
            .field("base_dn", &self.base_dn)
            .field("account_canonical_form", &self.account_canonical_form)
            .field("account_domain_name", &self.account_domain_name)
            .field("account_domain_name_short", &self.account_domain_name_short)
            .field("account_filter_format", &self.account_filter_format)
            .field("allow_empty_password", &self.allow_empty_password)
            .field("opt_referrals", &self.opt_referrals)
            .field("try_username_split", &self.try_username_split)
            .field("network_timeout", &self.network_timeout)
            .finish()
    }
}

/// Form an account name is rewritten to before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum AccountCanonicalForm {
    /// `uid=jdoe,ou=people,dc=example,dc=com`
    Dn,
    /// `jdoe`
    Username,
    /// `EXAMPLE\jdoe`
    Backslash,
    /// `jdoe@example.com`
    Principal,
}

impl TryFrom<u8> for AccountCanonicalForm {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Dn),
            2 => Ok(Self::Username),
            3 => Ok(Self::Backslash),
            4 => Ok(Self::Principal),
            n => Err(format!("invalid account canonical form {n}, expected 1 to 4")),
        }
    }
}

/// How users of a domain are searched and mapped.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[validate(length(min = 1, message = "user base DN cannot be empty"))]
    pub base_dn: String,
    #[serde(default)]
    pub filter: String,
    /// First entry is the username attribute.
    #[serde(default = "default_attributes")]
    #[validate(length(min = 1), nested)]
    pub attributes: Vec<AttributeConfig>,
}

/// Pairs a directory attribute with the user setter it feeds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
pub struct AttributeConfig {
    #[validate(length(min = 1))]
    pub ldap_attr: String,
    #[validate(length(min = 1))]
    pub user_method: String,
}

impl AttributeConfig {
    /// Create a new [`AttributeConfig`].
    pub fn new(
        ldap_attr: impl Into<String>,
        user_method: impl Into<String>,
    ) -> Self {
        Self {
            ldap_attr: ldap_attr.into(),
            user_method: user_method.into(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_owned()
}

fn default_attributes() -> Vec<AttributeConfig> {
    vec![AttributeConfig::new("uid", "setUsername")]
}

fn validate_tls(config: &DriverConfig) -> std::result::Result<(), ValidationError> {
    if config.use_ssl && config.use_start_tls {
        return Err(ValidationError::new("tls").with_message(Cow::Borrowed(
            "the useSsl and useStartTls options are mutually exclusive",
        )));
    }

    Ok(())
}

/// Domains are declared as a map keyed by id; keep document order.
fn ordered_domains<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<DomainConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DomainsVisitor;

    impl<'de> Visitor<'de> for DomainsVisitor {
        type Value = Vec<DomainConfig>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of domain id to domain configuration")
        }

        fn visit_map<M>(
            self,
            mut map: M,
        ) -> std::result::Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut domains = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, mut domain)) =
                map.next_entry::<String, DomainConfig>()?
            {
                domain.id = id;
                domains.push(domain);
            }
            Ok(domains)
        }
    }

    deserializer.deserialize_map(DomainsVisitor)
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Self> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let file = File::open(&file_path).inspect_err(|err| {
            tracing::error!(
                error = %err,
                path = %file_path.display(),
                "configuration file not found"
            )
        })?;

        let mut config = Self::from_reader(file)?;
        config.path = file_path;

        tracing::debug!(
            path = %config.path.display(),
            domains = config.domains.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate a configuration from YAML.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let config: Configuration = serde_yaml::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse and validate a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_reader(yaml.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LdapManagerError;

    const CONFIG: &str = r#"
log_level: debug
domains:
  corp:
    driver:
      host: ldap.corp.example.com
      port: 636
      useSsl: true
      username: cn=svc,dc=corp,dc=example,dc=com
      password: secret
      accountCanonicalForm: 4
      accountDomainName: corp.example.com
      networkTimeout: 5
    user:
      baseDn: ou=people,dc=corp,dc=example,dc=com
      filter: (objectClass=inetOrgPerson)
      attributes:
        - { ldap_attr: uid, user_method: setUsername }
        - { ldap_attr: mail, user_method: setEmail }
  legacy:
    driver:
      host: ldap.legacy.example.com
    user:
      baseDn: ou=users,dc=legacy,dc=example,dc=com
"#;

    #[test]
    fn test_domains_keep_declaration_order() {
        let config = Configuration::from_yaml(CONFIG).unwrap();

        let ids: Vec<_> = config.domains.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["corp", "legacy"]);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        let legacy = &config.domains[1];

        assert_eq!(legacy.driver.port, 389);
        assert!(!legacy.driver.use_ssl);
        assert!(!legacy.driver.use_start_tls);
        assert!(!legacy.driver.bind_requires_dn);
        assert!(legacy.driver.try_username_split);
        assert_eq!(legacy.user.filter, "");
        assert_eq!(
            legacy.user.attributes,
            vec![AttributeConfig::new("uid", "setUsername")]
        );
    }

    #[test]
    fn test_driver_options() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        let corp = &config.domains[0].driver;

        assert_eq!(corp.port, 636);
        assert!(corp.use_ssl);
        assert_eq!(
            corp.account_canonical_form,
            Some(AccountCanonicalForm::Principal)
        );
        assert_eq!(corp.network_timeout, Some(5));
        assert!(!format!("{corp:?}").contains("secret"));
    }

    #[test]
    fn test_tls_modes_are_exclusive() {
        let yaml = r#"
domains:
  corp:
    driver:
      host: ldap.example.com
      useSsl: true
      useStartTls: true
    user:
      baseDn: dc=example,dc=com
"#;
        assert!(matches!(
            Configuration::from_yaml(yaml),
            Err(LdapManagerError::Validation(_))
        ));
    }

    #[test]
    fn test_required_fields() {
        let empty_host = r#"
domains:
  corp:
    driver:
      host: ""
    user:
      baseDn: dc=example,dc=com
"#;
        assert!(matches!(
            Configuration::from_yaml(empty_host),
            Err(LdapManagerError::Validation(_))
        ));

        let missing_base_dn = r#"
domains:
  corp:
    driver:
      host: ldap.example.com
    user:
      filter: (objectClass=person)
"#;
        assert!(matches!(
            Configuration::from_yaml(missing_base_dn),
            Err(LdapManagerError::ParsingConfig(_))
        ));

        let empty_attributes = r#"
domains:
  corp:
    driver:
      host: ldap.example.com
    user:
      baseDn: dc=example,dc=com
      attributes: []
"#;
        assert!(matches!(
            Configuration::from_yaml(empty_attributes),
            Err(LdapManagerError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_canonical_form() {
        let yaml = r#"
domains:
  corp:
    driver:
      host: ldap.example.com
      accountCanonicalForm: 7
    user:
      baseDn: dc=example,dc=com
"#;
        assert!(matches!(
            Configuration::from_yaml(yaml),
            Err(LdapManagerError::ParsingConfig(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let config = Configuration::default()
            .path(PathBuf::from("/nonexistent/dirauth.yaml"))
            .read();
        assert!(matches!(config, Err(LdapManagerError::Io(_))));
    }
}
