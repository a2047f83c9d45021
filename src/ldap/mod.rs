//! Directory access: filter escaping, entry hydration and multi-domain
//! resolution.

mod client;
mod driver;
mod entry;
mod escape;
mod filter;
mod hydrator;
mod manager;
#[cfg(test)]
pub mod test_driver;

pub use client::Ldap3Driver;
pub use driver::Driver;
pub use entry::{AttributeValue, LdapEntry, SearchResult};
pub use escape::{
    EMPTY_VALUE, escape_value, escape_values, unescape_value, unescape_values,
};
pub use filter::{Condition, build_filter};
pub use hydrator::{AttributeMapping, Setter, hydrate};
pub use manager::{DomainSession, LdapManager};
