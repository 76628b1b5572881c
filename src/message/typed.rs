use crate::error::{Error, ValidationError};
use crate::message::address::Address;
use crate::message::method::Method;
use crate::message::uri::Uri;

/// Parsed view of a Via header value: `SIP/2.0/<transport> <host>[:<port>][;params]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub params: Vec<(String, Option<String>)>,
}

impl Via {
    pub fn branch(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("branch"))
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn received(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("received"))
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn rport(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("rport"))
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn sent_by(&self) -> String {
        match self.port {
            Some(p) => format!("{}:{}", self.host, p),
            None => self.host.clone(),
        }
    }

    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        if let Some(entry) = self.params.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            entry.1 = value;
        } else {
            self.params.push((name, value));
        }
    }

    pub fn parse(raw: &str) -> Result<Via, Error> {
        // "SIP/2.0/UDP host:port;branch=z9hG4bK...;..."
        let raw = raw.trim();
        let mut parts = raw.splitn(2, char::is_whitespace);
        let proto = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();
        let transport = proto.rsplit('/').next().unwrap_or("UDP").to_uppercase();
        let mut seg = rest.split(';');
        let host_port = seg.next().unwrap_or("").trim();
        let params = seg
            .map(|p| {
                let mut kv = p.splitn(2, '=');
                let k = kv.next().unwrap_or("").trim().to_string();
                let v = kv.next().map(|v| v.trim().to_string());
                (k, v)
            })
            .filter(|(k, _)| !k.is_empty())
            .collect();
        let (host, port) = if let Some(stripped) = host_port.strip_prefix('[') {
            // bracketed IPv6
            if let Some(end) = stripped.find(']') {
                let host = format!("[{}]", &stripped[..end]);
                let after = &stripped[end + 1..];
                let port = after.strip_prefix(':').and_then(|p| p.parse().ok());
                (host, port)
            } else {
                (host_port.to_string(), None)
            }
        } else if let Some(idx) = host_port.rfind(':') {
            let (h, p) = host_port.split_at(idx);
            (h.to_string(), p[1..].parse().ok())
        } else {
            (host_port.to_string(), None)
        };
        Ok(Via {
            transport,
            host,
            port,
            params,
        })
    }
}

impl std::fmt::Display for Via {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.sent_by())?;
        for (k, v) in &self.params {
            match v {
                Some(v) => write!(f, ";{}={}", k, v)?,
                None => write!(f, ";{}", k)?,
            }
        }
        Ok(())
    }
}

/// Parsed CSeq header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    pub seq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn parse(raw: &str) -> Result<CSeq, Error> {
        let raw = raw.trim();
        let mut parts = raw.splitn(2, char::is_whitespace);
        let seq = parts
            .next()
            .ok_or_else(|| mkerr("invalid CSeq"))?
            .parse::<u32>()
            .map_err(|_| mkerr("invalid CSeq sequence number"))?;
        let method = Method::from(parts.next().unwrap_or("").trim());
        Ok(CSeq { seq, method })
    }
}

impl std::fmt::Display for CSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}

fn mkerr(reason: &str) -> Error {
    Error::Validation(ValidationError {
        field: "header".into(),
        reason: reason.to_string(),
    })
}

/// Parsed Subscription-State header value (RFC 3265 §3.2). `expires` is
/// required on `active`/`pending` states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub state: SubState,
    pub expires: Option<u32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    Active,
    Pending,
    Terminated,
}

impl SubscriptionState {
    pub fn parse(raw: &str) -> Result<SubscriptionState, Error> {
        let mut parts = raw.split(';');
        let state = match parts.next().unwrap_or("").trim().to_ascii_lowercase().as_str() {
            "active" => SubState::Active,
            "pending" => SubState::Pending,
            "terminated" => SubState::Terminated,
            other => {
                return Err(mkerr(&format!("unknown subscription-state: {}", other)));
            }
        };
        let mut expires = None;
        let mut reason = None;
        for p in parts {
            let mut kv = p.splitn(2, '=');
            let k = kv.next().unwrap_or("").trim();
            let v = kv.next().map(|v| v.trim());
            match k.to_ascii_lowercase().as_str() {
                "expires" => expires = v.and_then(|v| v.parse().ok()),
                "reason" => reason = v.map(|v| v.to_string()),
                _ => {}
            }
        }
        if matches!(state, SubState::Active | SubState::Pending) && expires.is_none() {
            return Err(mkerr(
                "Subscription-State active/pending requires an expires parameter",
            ));
        }
        Ok(SubscriptionState {
            state,
            expires,
            reason,
        })
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self.state {
            SubState::Active => "active",
            SubState::Pending => "pending",
            SubState::Terminated => "terminated",
        };
        write!(f, "{}", s)?;
        if let Some(e) = self.expires {
            write!(f, ";expires={}", e)?;
        }
        if let Some(r) = &self.reason {
            write!(f, ";reason={}", r)?;
        }
        Ok(())
    }
}

/// Helper to build a `<uri>;params` style Address for Route / Record-Route
/// / Contact header values.
pub fn address_with_uri(uri: Uri, params: Vec<(String, Option<String>)>) -> Address {
    Address::Named {
        display_name: None,
        uri,
        params,
    }
}
