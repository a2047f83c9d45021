//! Mapping of directory entries onto local users.

use std::fmt;

use super::entry::{AttributeValue, LdapEntry};
use crate::config::AttributeConfig;
use crate::error::{HydrationError, LdapManagerError, Result};
use crate::user::LocalUser;

/// Typed user setter, resolved from its configured name.
pub type Setter<U> = fn(&mut U, AttributeValue) -> std::result::Result<(), HydrationError>;

/// A directory attribute and the setter it feeds.
pub struct AttributeMapping<U> {
    ldap_attr: String,
    user_method: String,
    setter: Setter<U>,
}

impl<U: LocalUser> AttributeMapping<U> {
    /// Resolve the setter named by the configuration.
    pub fn resolve(config: &AttributeConfig) -> Result<Self> {
        let setter = U::setter(&config.user_method).ok_or_else(|| {
            LdapManagerError::UnknownSetter(config.user_method.clone())
        })?;

        Ok(Self {
            ldap_attr: config.ldap_attr.clone(),
            user_method: config.user_method.clone(),
            setter,
        })
    }
}

impl<U> AttributeMapping<U> {
    pub fn ldap_attr(&self) -> &str {
        &self.ldap_attr
    }
}

impl<U> Clone for AttributeMapping<U> {
    fn clone(&self) -> Self {
        Self {
            ldap_attr: self.ldap_attr.clone(),
            user_method: self.user_method.clone(),
            setter: self.setter,
        }
    }
}

impl<U> fmt::Debug for AttributeMapping<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMapping")
            .field("ldap_attr", &self.ldap_attr)
            .field("user_method", &self.user_method)
            .finish()
    }
}

/// Fill `user` from `entry`.
///
/// Directory users never carry a local password, so it is cleared first.
/// Activatable users are enabled and directory-backed users receive the
/// entry DN once every mapped attribute has been set.
pub fn hydrate<U: LocalUser>(
    mut user: U,
    entry: &LdapEntry,
    mappings: &[AttributeMapping<U>],
) -> std::result::Result<U, HydrationError> {
    user.set_password("");

    if let Some(user) = user.as_activatable() {
        user.set_enabled(true);
    }

    for mapping in mappings {
        let value = entry.value(&mapping.ldap_attr).ok_or_else(|| {
            HydrationError::MissingAttribute {
                attribute: mapping.ldap_attr.clone(),
                dn: entry.dn.clone(),
            }
        })?;
        (mapping.setter)(&mut user, value)?;
    }

    if let Some(user) = user.as_directory_backed() {
        user.set_dn(&entry.dn);
    }

    Ok(user)
}
