use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::ParseError;

/// URI scheme (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Sip,
    Sips,
    Tel,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
            Scheme::Tel => "tel",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Sip => 5060,
            Scheme::Sips => 5061,
            Scheme::Tel => 0,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// URI host (spec §3.1): a DNS hostname or an IP literal. IPv6 literals
/// are always serialized bracket-enclosed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Name(String),
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl Host {
    /// Case-insensitive equality for hostnames; IP literals compare exactly.
    fn eq_for_uri(&self, other: &Host) -> bool {
        match (self, other) {
            (Host::Name(a), Host::Name(b)) => a.eq_ignore_ascii_case(b),
            (Host::V4(a), Host::V4(b)) => a == b,
            (Host::V6(a), Host::V6(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Name(n) => write!(f, "{}", n),
            Host::V4(a) => write!(f, "{}", a),
            Host::V6(a) => write!(f, "[{}]", a),
        }
    }
}

/// Ordered key/(optional) value parameter list; order is preserved on
/// both parse and serialize (spec §9 Open Question 1: insertion order).
pub type ParamList = Vec<(String, Option<String>)>;

/// The subset of URI parameters that participate in URI equality
/// (spec §3.1): `user`, `ttl`, `method`, `maddr`, `transport`.
const EQUALITY_PARAMS: [&str; 5] = ["user", "ttl", "method", "maddr", "transport"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Host,
    /// 0 means "use the scheme default".
    pub port: u16,
    pub params: ParamList,
    pub headers: Vec<(String, String)>,
}

impl Uri {
    pub fn new(scheme: Scheme, host: Host) -> Self {
        Uri {
            scheme,
            user: None,
            password: None,
            host,
            port: 0,
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.scheme.default_port()
        } else {
            self.port
        }
    }

    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.params.push((name.into(), value));
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        if let Some(entry) = self
            .params
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.params.push((name, value));
        }
    }

    /// Equality per RFC 3261 §19.1.4 / spec §3.1.
    pub fn equals_for_matching(&self, other: &Uri) -> bool {
        if self.scheme != other.scheme {
            return false;
        }
        if self.user != other.user {
            return false;
        }
        if !self.host.eq_for_uri(&other.host) {
            return false;
        }
        if self.effective_port() != other.effective_port() {
            return false;
        }
        for name in EQUALITY_PARAMS {
            let a = self.param(name);
            let b = other.param(name);
            match (a, b) {
                (None, None) => {}
                (Some(av), Some(bv)) => {
                    if !av.unwrap_or("").eq_ignore_ascii_case(bv.unwrap_or("")) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }

    pub fn parse(input: &str) -> Result<Uri, ParseError> {
        crate::codec::uri_parser::parse_uri(input)
    }
}

impl PartialOrd for Uri {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.to_string().cmp(&other.to_string()))
    }
}
impl Ord for Uri {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

fn percent_encode(s: &str, extra_reserved: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        let c = b as char;
        let safe = c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '.' | '~' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | '=')
            || (c.is_ascii() && !extra_reserved.contains(&c) && !c.is_ascii_control() && c != '%' && c != '@' && c != ':' && c != ';' && c != '?' && c != '/' && c != ' ');
        if safe {
            out.push(c);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}", percent_encode(user, &[]))?;
            if let Some(pass) = &self.password {
                write!(f, ":{}", pass)?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host)?;
        if self.port != 0 {
            write!(f, ":{}", self.port)?;
        }
        for (k, v) in &self.params {
            match v {
                Some(v) => write!(f, ";{}={}", k, v)?,
                None => write!(f, ";{}", k)?,
            }
        }
        if !self.headers.is_empty() {
            write!(f, "?")?;
            for (i, (k, v)) in self.headers.iter().enumerate() {
                if i > 0 {
                    write!(f, "&")?;
                }
                write!(f, "{}={}", k, percent_encode(v, &[]))?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Uri {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = ParseError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Uri::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = ParseError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Uri::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_simple() {
        let uri = Uri::parse("sip:alice@atlanta.com").unwrap();
        assert_eq!(uri.scheme, Scheme::Sip);
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.to_string(), "sip:alice@atlanta.com");
    }

    #[test]
    fn equality_ignores_unlisted_params() {
        let a = Uri::parse("sip:bob@biloxi.com;foo=bar").unwrap();
        let b = Uri::parse("sip:bob@biloxi.com").unwrap();
        assert!(a.equals_for_matching(&b));
    }

    #[test]
    fn equality_default_port() {
        let a = Uri::parse("sip:bob@biloxi.com").unwrap();
        let b = Uri::parse("sip:bob@biloxi.com:5060").unwrap();
        assert!(a.equals_for_matching(&b));
    }

    #[test]
    fn equality_transport_param_must_match() {
        let a = Uri::parse("sip:bob@biloxi.com;transport=tcp").unwrap();
        let b = Uri::parse("sip:bob@biloxi.com;transport=udp").unwrap();
        assert!(!a.equals_for_matching(&b));
    }

    #[test]
    fn ipv6_requires_brackets() {
        let uri = Uri::parse("sip:bob@[2001:db8::1]:5060").unwrap();
        assert!(matches!(uri.host, Host::V6(_)));
        assert_eq!(uri.to_string(), "sip:bob@[2001:db8::1]:5060");
    }
}
