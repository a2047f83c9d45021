//! Error handler for dirauth.

use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, LdapManagerError>;

/// Enum representing every failure the LDAP manager can surface.
///
/// Negative authentication (wrong password, unknown user) is never an
/// error: it is returned as `false` or `None` by the manager.
#[derive(Debug, Error)]
pub enum LdapManagerError {
    #[error("configuration validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing configuration: {0}")]
    ParsingConfig(#[from] serde_yaml::Error),

    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    #[error("this search can only return a single user")]
    TooManyObjects,

    #[error("no LDAP domain is active, bind or look up a user first")]
    NoActiveDomain,

    #[error("unknown LDAP domain `{0}`")]
    UnknownDomain(String),

    #[error("driver used before being initialized with a domain")]
    DriverNotInitialized,

    #[error("unknown user setter `{0}`")]
    UnknownSetter(String),

    #[error("hydration failed: {0}")]
    Hydration(#[from] HydrationError),

    #[error("escaped value is not valid UTF-8")]
    Unescape(#[from] std::string::FromUtf8Error),
}

/// Mismatch between a configured attribute map and a directory entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HydrationError {
    #[error("missing attribute `{attribute}` on entry `{dn}`")]
    MissingAttribute { attribute: String, dn: String },

    #[error("setter expects a single value, got {0} values")]
    ExpectedSingleValue(usize),
}
