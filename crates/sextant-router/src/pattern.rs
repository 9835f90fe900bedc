//! Path patterns.
//!
//! A pattern is a path with `{name}` placeholders. A placeholder matches one
//! path segment unless it carries a convertor:
//!
//! | Placeholder | Matches |
//! |-------------|---------|
//! | `{id}` / `{id:str}` | one segment |
//! | `{id:int}` | one segment of ASCII digits |
//! | `{rest:path}` | the remainder of the path, slashes included |
//!
//! Patterns compile to anchored regular expressions. Mount prefixes use
//! [`PathPattern::prefix`], which matches the prefix followed by either
//! nothing or a `/`-led remainder.

use regex::Regex;

use crate::error::RouterError;
use crate::params::Params;

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    path: String,
    regex: Regex,
    names: Vec<String>,
}

/// Result of matching a mount prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch {
    /// Parameters captured by the prefix.
    pub params: Params,
    /// The part of the path consumed by the prefix.
    pub matched: String,
    /// The rest of the path, always starting with `/`.
    pub remainder: String,
}

impl PathPattern {
    /// Compile a pattern that must match the whole path.
    pub fn new(path: &str) -> Result<Self, RouterError> {
        if !path.starts_with('/') {
            return Err(RouterError::invalid_pattern(path, "must start with '/'"));
        }
        let (body, names) = compile(path)?;
        Self::build(path, &format!("^{body}$"), names)
    }

    /// Compile a mount prefix. A trailing slash is ignored and the empty
    /// prefix mounts at the root.
    pub fn prefix(path: &str) -> Result<Self, RouterError> {
        let trimmed = path.trim_end_matches('/');
        if !trimmed.is_empty() && !trimmed.starts_with('/') {
            return Err(RouterError::invalid_pattern(path, "must start with '/'"));
        }
        let (body, names) = compile(trimmed)?;
        Self::build(trimmed, &format!("^{body}(/.*)?$"), names)
    }

    fn build(path: &str, regex: &str, names: Vec<String>) -> Result<Self, RouterError> {
        let regex =
            Regex::new(regex).map_err(|e| RouterError::invalid_pattern(path, e.to_string()))?;
        Ok(Self {
            path: path.to_string(),
            regex,
            names,
        })
    }

    /// The pattern as declared.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Names of the placeholders, in order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Match a full path.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        Some(self.collect(&captures))
    }

    /// Match a mount prefix against the start of a path.
    pub fn match_prefix(&self, path: &str) -> Option<PrefixMatch> {
        let captures = self.regex.captures(path)?;
        let rest = captures.get(captures.len() - 1);
        let (matched, remainder) = match rest {
            Some(rest) => (&path[..rest.start()], rest.as_str()),
            None => (path, "/"),
        };
        Some(PrefixMatch {
            params: self.collect(&captures),
            matched: matched.to_string(),
            remainder: remainder.to_string(),
        })
    }

    fn collect(&self, captures: &regex::Captures<'_>) -> Params {
        self.names
            .iter()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|value| (name.clone(), value.as_str().to_string()))
            })
            .collect()
    }
}

fn compile(path: &str) -> Result<(String, Vec<String>), RouterError> {
    let mut body = String::with_capacity(path.len() + 16);
    let mut names: Vec<String> = Vec::new();
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        body.push_str(&regex::escape(&rest[..open]));
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| RouterError::invalid_pattern(path, "unclosed '{'"))?;
        let placeholder = &after[..close];

        let (name, convertor) = placeholder
            .split_once(':')
            .unwrap_or((placeholder, "str"));
        if !is_identifier(name) {
            return Err(RouterError::invalid_pattern(
                path,
                format!("invalid parameter name '{name}'"),
            ));
        }
        if names.iter().any(|existing| existing == name) {
            return Err(RouterError::invalid_pattern(
                path,
                format!("duplicate parameter '{name}'"),
            ));
        }
        let class = match convertor {
            "str" => "[^/]+",
            "int" => "[0-9]+",
            "path" => ".*",
            other => {
                return Err(RouterError::invalid_pattern(
                    path,
                    format!("unknown convertor '{other}'"),
                ));
            }
        };

        body.push_str(&format!("(?P<{name}>{class})"));
        names.push(name.to_string());
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(RouterError::invalid_pattern(path, "unmatched '}'"));
    }
    body.push_str(&regex::escape(rest));

    Ok((body, names))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_static_pattern() {
        let pattern = PathPattern::new("/users").unwrap();
        assert!(pattern.matches("/users").unwrap().is_empty());
        assert!(pattern.matches("/users/").is_none());
        assert!(pattern.matches("/users/1").is_none());
    }

    #[test]
    fn test_params_and_convertors() {
        let pattern = PathPattern::new("/orgs/{org}/users/{id:int}").unwrap();
        let params = pattern.matches("/orgs/acme/users/42").unwrap();
        assert_eq!(params.get("org"), Some("acme"));
        assert_eq!(params.get("id"), Some("42"));
        assert!(pattern.matches("/orgs/acme/users/bob").is_none());
        assert_eq!(pattern.param_names(), ["org", "id"]);

        let files = PathPattern::new("/files/{rest:path}").unwrap();
        let params = files.matches("/files/a/b.txt").unwrap();
        assert_eq!(params.get("rest"), Some("a/b.txt"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let pattern = PathPattern::new("/v1.0/items").unwrap();
        assert!(pattern.matches("/v1.0/items").is_some());
        assert!(pattern.matches("/v1x0/items").is_none());
    }

    #[test]
    fn test_prefix_match() {
        let prefix = PathPattern::prefix("/subapp/").unwrap();
        assert_eq!(prefix.path(), "/subapp");

        let m = prefix.match_prefix("/subapp/subapp-endpoint").unwrap();
        assert_eq!(m.matched, "/subapp");
        assert_eq!(m.remainder, "/subapp-endpoint");

        let m = prefix.match_prefix("/subapp").unwrap();
        assert_eq!(m.remainder, "/");

        assert!(prefix.match_prefix("/subapplication").is_none());
    }

    #[test]
    fn test_prefix_with_params() {
        let prefix = PathPattern::prefix("/tenants/{tenant}").unwrap();
        let m = prefix.match_prefix("/tenants/acme/users").unwrap();
        assert_eq!(m.params.get("tenant"), Some("acme"));
        assert_eq!(m.matched, "/tenants/acme");
        assert_eq!(m.remainder, "/users");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::new("users").is_err());
        assert!(PathPattern::new("/users/{id").is_err());
        assert!(PathPattern::new("/users/id}").is_err());
        assert!(PathPattern::new("/users/{1d}").is_err());
        assert!(PathPattern::new("/users/{id}/{id}").is_err());
        assert!(PathPattern::new("/users/{id:uuid}").is_err());
    }

    proptest! {
        #[test]
        fn test_single_segment_param_captures_segment(segment in "[A-Za-z0-9._~-]{1,16}") {
            let pattern = PathPattern::new("/items/{item}").unwrap();
            let path = format!("/items/{segment}");
            let params = pattern.matches(&path).unwrap();
            prop_assert_eq!(params.get("item"), Some(segment.as_str()));
        }
    }
}
