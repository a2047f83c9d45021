//! RFC 2254 escaping of LDAP filter values.

use crate::error::Result;

/// Escaped representation of an empty value.
///
/// Not the RFC `\00` NUL escape: filters stored by older deployments rely
/// on this exact form.
pub const EMPTY_VALUE: &str = r"\0";

/// Escape a value so it can be embedded in an LDAP filter.
///
/// `*`, `(`, `)` and `\` as well as every control character (code < 32)
/// become a backslash followed by two lowercase hex digits.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str(r"\5c"),
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            c if (c as u32) < 0x20 => {
                out.push('\\');
                out.push_str(&hex::encode([c as u8]));
            },
            c => out.push(c),
        }
    }

    if out.is_empty() {
        return EMPTY_VALUE.to_owned();
    }
    out
}

/// Escape every value, keeping order and length.
pub fn escape_values<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| escape_value(value.as_ref()))
        .collect()
}

/// Undo [`escape_value`]: every `\XX` hex pair turns back into its byte.
///
/// A backslash not followed by two hex digits is kept as is.
pub fn unescape_value(value: &str) -> Result<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(pair) = bytes.get(i + 1..i + 3) {
                let mut decoded = [0u8; 1];
                if hex::decode_to_slice(pair, &mut decoded).is_ok() {
                    out.push(decoded[0]);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    Ok(String::from_utf8(out)?)
}

/// Undo [`escape_values`].
pub fn unescape_values<I, S>(values: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| unescape_value(value.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_metacharacters() {
        assert_eq!(escape_value("john"), "john");
        assert_eq!(escape_value("a*b"), r"a\2ab");
        assert_eq!(escape_value("(admin)"), r"\28admin\29");
        assert_eq!(escape_value(r"dom\user"), r"dom\5cuser");
        // Backslash is escaped before the others: no double escaping.
        assert_eq!(escape_value(r"\*"), r"\5c\2a");
    }

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape_value("\0"), r"\00");
        assert_eq!(escape_value("a\nb"), r"a\0ab");
        assert_eq!(escape_value("\u{1f}"), r"\1f");
        // Space and DEL are left alone.
        assert_eq!(escape_value(" \u{7f}"), " \u{7f}");
        assert_eq!(escape_value("héllo"), "héllo");
    }

    #[test]
    fn test_escape_empty() {
        assert_eq!(escape_value(""), r"\0");
        assert_eq!(escape_value("").len(), 2);
    }

    #[test]
    fn test_escape_values_keeps_shape() {
        assert_eq!(escape_values(["a", "*"]), vec!["a", r"\2a"]);
        assert_eq!(escape_values(["", "x", "(y)"]), vec![r"\0", "x", r"\28y\29"]);
        assert!(escape_values(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_value(r"a\2ab").unwrap(), "a*b");
        assert_eq!(unescape_value(r"\5C\2A").unwrap(), r"\*");
        assert_eq!(unescape_value(r"caf\c3\a9").unwrap(), "café");
        // Not a hex pair: left untouched.
        assert_eq!(unescape_value(r"\0").unwrap(), r"\0");
        assert_eq!(unescape_value(r"a\zz").unwrap(), r"a\zz");
        assert_eq!(unescape_value("trailing\\").unwrap(), "trailing\\");
        assert!(unescape_value(r"\ff").is_err());
        assert_eq!(
            unescape_values([r"\28x\29", "y"]).unwrap(),
            vec!["(x)", "y"]
        );
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            r"\",
            "*",
            "(&(uid=*))",
            "back\\slash",
            "tab\there",
            "multi\r\nline",
            "nul\0byte",
            "ünïcödé (ok)",
        ];
        for sample in samples {
            assert_eq!(unescape_value(&escape_value(sample)).unwrap(), sample);
        }

        for code in 1u8..0x80 {
            let sample = format!("x{}y", code as char);
            assert_eq!(unescape_value(&escape_value(&sample)).unwrap(), sample);
        }
    }
}
