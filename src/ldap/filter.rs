//! LDAP search filter construction.

use std::fmt;

use super::escape::escape_value;

/// Operator joining the clauses of a filter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    #[default]
    And,
    Or,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Condition::And => write!(f, "&"),
            Condition::Or => write!(f, "|"),
        }
    }
}

/// Build `(<op><base>(name=value)...)` from a domain base filter and
/// search criteria.
///
/// Values are escaped, names are trusted. An empty base filter is skipped
/// and a bare one (`objectClass=person`) is parenthesized.
pub fn build_filter<K, V>(
    base_filter: &str,
    criteria: &[(K, V)],
    condition: Condition,
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut filter = format!("({condition}");

    let base_filter = base_filter.trim();
    if !base_filter.is_empty() {
        if base_filter.starts_with('(') {
            filter.push_str(base_filter);
        } else {
            filter.push('(');
            filter.push_str(base_filter);
            filter.push(')');
        }
    }

    for (name, value) in criteria {
        filter.push('(');
        filter.push_str(name.as_ref());
        filter.push('=');
        filter.push_str(&escape_value(value.as_ref()));
        filter.push(')');
    }

    filter.push(')');
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_filter() {
        assert_eq!(
            build_filter("", &[("uid", "john")], Condition::And),
            "(&(uid=john))"
        );
    }

    #[test]
    fn test_values_are_escaped() {
        assert_eq!(
            build_filter("", &[("uid", "a*b")], Condition::default()),
            r"(&(uid=a\2ab))"
        );
        assert_eq!(
            build_filter("", &[("cn", "")], Condition::And),
            r"(&(cn=\0))"
        );
    }

    #[test]
    fn test_base_filter_comes_first() {
        assert_eq!(
            build_filter(
                "(objectClass=person)",
                &[("uid", "john"), ("mail", "john@example.com")],
                Condition::And,
            ),
            "(&(objectClass=person)(uid=john)(mail=john@example.com))"
        );
        assert_eq!(
            build_filter("objectClass=person", &[("uid", "john")], Condition::And),
            "(&(objectClass=person)(uid=john))"
        );
        assert_eq!(
            build_filter("   ", &[("uid", "john")], Condition::And),
            "(&(uid=john))"
        );
    }

    #[test]
    fn test_or_condition() {
        assert_eq!(
            build_filter(
                "",
                &[("uid", "john"), ("uid", "jane")],
                Condition::Or
            ),
            "(|(uid=john)(uid=jane))"
        );
    }
}
