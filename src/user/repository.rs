//! Factories for blank users.

use crate::user::{LocalUser, User};

/// Source of fresh, unhydrated users.
pub trait UserRepository {
    type User: LocalUser;

    /// Create a blank user to be filled from a directory entry.
    fn create_user(&self) -> Self::User;
}

/// Repository producing [`User`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultUserRepository;

impl UserRepository for DefaultUserRepository {
    type User = User;

    fn create_user(&self) -> User {
        User::default()
    }
}
