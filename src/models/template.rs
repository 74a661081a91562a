//! `${attribute}` substitution for per-batch configuration values.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::document::BatchAttributes;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z0-9_.\-]+)\s*\}").expect("placeholder pattern is valid")
});

/// Replace every `${name}` with the matching batch attribute.
///
/// Unknown attributes become the empty string.
pub fn render(template: &str, attributes: &BatchAttributes) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            attributes.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Parse a `key=value` attribute argument.
pub fn parse_attribute(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid attribute '{}': expected key=value", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid attribute '{}': key cannot be empty", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> BatchAttributes {
        let mut a = BatchAttributes::new();
        a.insert("filename".to_string(), "doc.json".to_string());
        a.insert("tenant".to_string(), "acme".to_string());
        a
    }

    #[test]
    fn test_render_substitutes_attributes() {
        assert_eq!(render("docs_${tenant}", &attrs()), "docs_acme");
        assert_eq!(render("${ filename }", &attrs()), "doc.json");
        assert_eq!(render("plain", &attrs()), "plain");
    }

    #[test]
    fn test_render_unknown_attribute_is_empty() {
        assert_eq!(render("x${missing}y", &attrs()), "xy");
    }

    #[test]
    fn test_parse_attribute() {
        assert_eq!(
            parse_attribute("tenant=acme").unwrap(),
            ("tenant".to_string(), "acme".to_string())
        );
        assert_eq!(
            parse_attribute("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=x").is_err());
    }
}
