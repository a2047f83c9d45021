//! dirauth authenticates and looks up users across several LDAP
//! directories.
//!
//! Domains are declared in `config.yaml` and tried in order. The first one
//! that accepts a bind, or knows a looked-up user, is pinned and serves
//! every later request of the session.
//!
//! ```no_run
//! use dirauth::config::Configuration;
//! use dirauth::ldap::{Ldap3Driver, LdapManager};
//! use dirauth::user::{DefaultUserRepository, LocalUser};
//!
//! # async fn run() -> dirauth::error::Result<()> {
//! let config = Configuration::default().read()?;
//! let mut manager = LdapManager::new(
//!     Ldap3Driver::new(),
//!     DefaultUserRepository,
//!     config.domains,
//! )?;
//!
//! if let Some(user) = manager.find_user_by_username("jdoe").await? {
//!     let authenticated = manager.bind(&user, "secret").await?;
//!     println!("{}: {authenticated}", user.username());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod ldap;
pub mod telemetry;
pub mod user;

pub use error::{LdapManagerError, Result};
