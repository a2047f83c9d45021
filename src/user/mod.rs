mod repository;

pub use repository::*;

use serde::Serialize;

use crate::error::HydrationError;
use crate::ldap::{AttributeValue, Setter};

/// Local user record that can be filled from a directory entry.
pub trait LocalUser: Sized {
    fn username(&self) -> &str;

    /// Name handed to the directory when binding.
    fn bind_identity(&self) -> &str {
        self.username()
    }

    fn set_password(&mut self, password: &str);

    /// Users that can be enabled or disabled.
    fn as_activatable(&mut self) -> Option<&mut dyn Activatable> {
        None
    }

    /// Users that remember the DN of their directory entry.
    fn as_directory_backed(&mut self) -> Option<&mut dyn DirectoryBacked> {
        None
    }

    /// Resolve a configured setter name, such as `setUsername`.
    fn setter(name: &str) -> Option<Setter<Self>>;
}

/// Capability of users carrying an enabled flag.
pub trait Activatable {
    fn set_enabled(&mut self, enabled: bool);
}

/// Capability of users linked to a directory entry.
pub trait DirectoryBacked {
    fn dn(&self) -> Option<&str>;
    fn set_dn(&mut self, dn: &str);
}

/// User built from a directory entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct User {
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub dn: Option<String>,
    pub enabled: bool,
    #[serde(skip)]
    pub password: String,
}

impl User {
    /// Create a new [`User`] ready to be bound.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Update `dn` of [`User`].
    pub fn with_dn(mut self, dn: impl Into<String>) -> Self {
        self.dn = Some(dn.into());
        self
    }
}

impl LocalUser for User {
    fn username(&self) -> &str {
        &self.username
    }

    fn bind_identity(&self) -> &str {
        DirectoryBacked::dn(self).unwrap_or(&self.username)
    }

    fn set_password(&mut self, password: &str) {
        self.password = password.to_owned();
    }

    fn as_activatable(&mut self) -> Option<&mut dyn Activatable> {
        Some(self)
    }

    fn as_directory_backed(&mut self) -> Option<&mut dyn DirectoryBacked> {
        Some(self)
    }

    fn setter(name: &str) -> Option<Setter<Self>> {
        let setter: Setter<Self> = match name {
            "setUsername" => set_username,
            "setEmail" => set_email,
            "setDisplayName" => set_display_name,
            "setFirstName" => set_first_name,
            "setLastName" => set_last_name,
            "setRoles" => set_roles,
            _ => return None,
        };
        Some(setter)
    }
}

impl Activatable for User {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl DirectoryBacked for User {
    fn dn(&self) -> Option<&str> {
        self.dn.as_deref()
    }

    fn set_dn(&mut self, dn: &str) {
        self.dn = Some(dn.to_owned());
    }
}

fn set_username(
    user: &mut User,
    value: AttributeValue,
) -> Result<(), HydrationError> {
    user.username = value.into_single()?;
    Ok(())
}

fn set_email(user: &mut User, value: AttributeValue) -> Result<(), HydrationError> {
    user.email = Some(value.into_single()?);
    Ok(())
}

fn set_display_name(
    user: &mut User,
    value: AttributeValue,
) -> Result<(), HydrationError> {
    user.display_name = Some(value.into_single()?);
    Ok(())
}

fn set_first_name(
    user: &mut User,
    value: AttributeValue,
) -> Result<(), HydrationError> {
    user.first_name = Some(value.into_single()?);
    Ok(())
}

fn set_last_name(
    user: &mut User,
    value: AttributeValue,
) -> Result<(), HydrationError> {
    user.last_name = Some(value.into_single()?);
    Ok(())
}

fn set_roles(user: &mut User, value: AttributeValue) -> Result<(), HydrationError> {
    user.roles = value.into_vec();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_identity_prefers_dn() {
        let user = User::new("jdoe");
        assert_eq!(user.bind_identity(), "jdoe");

        let user = user.with_dn("uid=jdoe,dc=example,dc=com");
        assert_eq!(user.bind_identity(), "uid=jdoe,dc=example,dc=com");
    }

    #[test]
    fn test_setters() {
        assert!(User::setter("setUsername").is_some());
        assert!(User::setter("setRoles").is_some());
        assert!(User::setter("setFavoriteColor").is_none());
        assert!(User::setter("username").is_none());

        let mut user = User::default();
        let set_roles = User::setter("setRoles").unwrap();
        set_roles(&mut user, AttributeValue::Single("admin".into())).unwrap();
        assert_eq!(user.roles, vec!["admin"]);

        let set_email = User::setter("setEmail").unwrap();
        assert_eq!(
            set_email(
                &mut user,
                AttributeValue::Multi(vec!["a@x.com".into(), "b@x.com".into()])
            ),
            Err(HydrationError::ExpectedSingleValue(2))
        );
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut user = User::new("jdoe");
        user.set_password("hunter2");

        let yaml = serde_yaml::to_string(&user).unwrap();
        assert!(yaml.contains("jdoe"));
        assert!(!yaml.contains("hunter2"));
    }
}
