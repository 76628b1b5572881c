use std::fmt;

use crate::error::ParseError;
use crate::message::uri::{ParamList, Uri};

/// A SIP name-addr: an optional display name, a URI, and header
/// parameters (`tag`, `expires`, ...). A distinguished `Wildcard` variant
/// represents the bare `*` used in REGISTER to unregister all bindings
/// (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Named {
        display_name: Option<String>,
        uri: Uri,
        params: ParamList,
    },
    Wildcard,
}

impl Address {
    pub fn new(uri: Uri) -> Self {
        Address::Named {
            display_name: None,
            uri,
            params: Vec::new(),
        }
    }

    pub fn uri(&self) -> Option<&Uri> {
        match self {
            Address::Named { uri, .. } => Some(uri),
            Address::Wildcard => None,
        }
    }

    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        match self {
            Address::Named { params, .. } => params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_deref()),
            Address::Wildcard => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.param("tag").flatten()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_param("tag", Some(tag.into()));
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: Option<String>) {
        if let Address::Named { params, .. } = self {
            let name = name.into();
            if let Some(entry) = params.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
                entry.1 = value;
            } else {
                params.push((name, value));
            }
        }
    }

    pub fn expires(&self) -> Option<u32> {
        self.param("expires").flatten().and_then(|v| v.parse().ok())
    }

    pub fn parse(input: &str) -> Result<Address, ParseError> {
        crate::codec::uri_parser::parse_address(input)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Wildcard => write!(f, "*"),
            Address::Named {
                display_name,
                uri,
                params,
            } => {
                match display_name {
                    Some(name) => write!(f, "\"{}\" <{}>", name, uri)?,
                    None => write!(f, "<{}>", uri)?,
                }
                for (k, v) in params {
                    match v {
                        Some(v) => write!(f, ";{}={}", k, v)?,
                        None => write!(f, ";{}", k)?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<&str> for Address {
    type Error = ParseError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Address::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_name_and_tag() {
        let a = Address::parse("Alice <sip:alice@atlanta.com>;tag=1928301774").unwrap();
        assert_eq!(a.tag(), Some("1928301774"));
        match &a {
            Address::Named { display_name, .. } => assert_eq!(display_name.as_deref(), Some("Alice")),
            _ => panic!("expected named"),
        }
    }

    #[test]
    fn parses_wildcard() {
        assert_eq!(Address::parse("*").unwrap(), Address::Wildcard);
    }

    #[test]
    fn parses_bare_uri_without_params() {
        let a = Address::parse("sip:bob@biloxi.com").unwrap();
        assert!(a.uri().is_some());
    }

    #[test]
    fn bare_uri_with_top_level_params_is_rejected() {
        // Without angle brackets, a trailing `;tag=...` is ambiguous between
        // a URI param and an address param, so it must be rejected rather
        // than silently absorbed into the URI.
        assert!(Address::parse("sip:bob@biloxi.com;tag=1").is_err());
    }
}
