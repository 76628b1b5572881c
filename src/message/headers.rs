use std::fmt;

/// A header name, case-insensitively compared but remembering which
/// well-known header it is so the codec can canonicalize it on emit
/// (spec §3.3 invariant b, §4.1 compact-form expansion).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeaderName {
    Via,
    Route,
    RecordRoute,
    MaxForwards,
    From,
    To,
    CallId,
    CSeq,
    Contact,
    ContentLength,
    ContentType,
    Expires,
    SubscriptionState,
    ReferTo,
    ReferredBy,
    Event,
    Supported,
    Require,
    Allow,
    Accept,
    Subject,
    UserAgent,
    Server,
    WwwAuthenticate,
    Authorization,
    ProxyAuthenticate,
    ProxyAuthorization,
    Other(String),
}

impl HeaderName {
    /// Canonical title-case serialization form (spec §3.3 invariant b,
    /// §4.2/§6.2 wire format).
    pub fn canonical(&self) -> &str {
        match self {
            HeaderName::Via => "Via",
            HeaderName::Route => "Route",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::From => "From",
            HeaderName::To => "To",
            HeaderName::CallId => "Call-ID",
            HeaderName::CSeq => "CSeq",
            HeaderName::Contact => "Contact",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::ContentType => "Content-Type",
            HeaderName::Expires => "Expires",
            HeaderName::SubscriptionState => "Subscription-State",
            HeaderName::ReferTo => "Refer-To",
            HeaderName::ReferredBy => "Referred-By",
            HeaderName::Event => "Event",
            HeaderName::Supported => "Supported",
            HeaderName::Require => "Require",
            HeaderName::Allow => "Allow",
            HeaderName::Accept => "Accept",
            HeaderName::Subject => "Subject",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::Server => "Server",
            HeaderName::WwwAuthenticate => "WWW-Authenticate",
            HeaderName::Authorization => "Authorization",
            HeaderName::ProxyAuthenticate => "Proxy-Authenticate",
            HeaderName::ProxyAuthorization => "Proxy-Authorization",
            HeaderName::Other(s) => s.as_str(),
        }
    }

    /// Parses a header name (including compact forms, spec §3.3 invariant c)
    /// case-insensitively.
    pub fn parse(raw: &str) -> HeaderName {
        // Compact forms explicitly named by spec §4.1: i,m,f,t,v,c,l,k,s
        if raw.len() == 1 {
            match raw.chars().next().unwrap().to_ascii_lowercase() {
                'i' => return HeaderName::CallId,
                'm' => return HeaderName::Contact,
                'f' => return HeaderName::From,
                't' => return HeaderName::To,
                'v' => return HeaderName::Via,
                'c' => return HeaderName::ContentType,
                'l' => return HeaderName::ContentLength,
                'k' => return HeaderName::Supported,
                's' => return HeaderName::Subject,
                _ => {}
            }
        }
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "via" => HeaderName::Via,
            "route" => HeaderName::Route,
            "record-route" => HeaderName::RecordRoute,
            "max-forwards" => HeaderName::MaxForwards,
            "from" => HeaderName::From,
            "to" => HeaderName::To,
            "call-id" => HeaderName::CallId,
            "cseq" => HeaderName::CSeq,
            "contact" => HeaderName::Contact,
            "content-length" => HeaderName::ContentLength,
            "content-type" => HeaderName::ContentType,
            "expires" => HeaderName::Expires,
            "subscription-state" => HeaderName::SubscriptionState,
            "refer-to" => HeaderName::ReferTo,
            "referred-by" => HeaderName::ReferredBy,
            "event" | "o" => HeaderName::Event,
            "supported" => HeaderName::Supported,
            "require" => HeaderName::Require,
            "allow" => HeaderName::Allow,
            "accept" => HeaderName::Accept,
            "subject" => HeaderName::Subject,
            "user-agent" => HeaderName::UserAgent,
            "server" => HeaderName::Server,
            "www-authenticate" => HeaderName::WwwAuthenticate,
            "authorization" => HeaderName::Authorization,
            "proxy-authenticate" => HeaderName::ProxyAuthenticate,
            "proxy-authorization" => HeaderName::ProxyAuthorization,
            _ => HeaderName::Other(raw.to_string()),
        }
    }

    fn eq_key(&self) -> String {
        self.canonical().to_ascii_lowercase()
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub name: HeaderName,
    pub value: String,
}

/// Ordered, duplicate-preserving header store (spec §3.3: "duplicates
/// permitted and significant for Via, Route, Record-Route, Contact").
///
/// Equality is multi-map equality modulo header-name casing (spec §8):
/// the same set of header names, each with the same ordered list of
/// values, regardless of the relative order *between* different header
/// names — the codec is free to reorder header groups on emit (spec
/// §6.2) without breaking the parse(serialize(m)) == m property.
#[derive(Debug, Clone, Default)]
pub struct Headers(pub Vec<RawHeader>);

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        fn grouped(h: &Headers) -> std::collections::BTreeMap<String, Vec<&str>> {
            let mut map: std::collections::BTreeMap<String, Vec<&str>> = std::collections::BTreeMap::new();
            for rh in h.iter() {
                map.entry(rh.name.eq_key()).or_default().push(rh.value.as_str());
            }
            map
        }
        grouped(self) == grouped(other)
    }
}

impl Eq for Headers {}

impl Headers {
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    pub fn push(&mut self, name: HeaderName, value: impl Into<String>) {
        self.0.push(RawHeader {
            name,
            value: value.into(),
        });
    }

    /// Replace the first occurrence of `name`, appending if absent.
    pub fn unique_push(&mut self, name: HeaderName, value: impl Into<String>) {
        let key = name.eq_key();
        let value = value.into();
        if let Some(h) = self.0.iter_mut().find(|h| h.name.eq_key() == key) {
            h.value = value;
        } else {
            self.push(name, value);
        }
    }

    pub fn get(&self, name: &HeaderName) -> Option<&str> {
        let key = name.eq_key();
        self.0
            .iter()
            .find(|h| h.name.eq_key() == key)
            .map(|h| h.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &HeaderName) -> Vec<&'a str> {
        let key = name.eq_key();
        self.0
            .iter()
            .filter(|h| h.name.eq_key() == key)
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn remove_all(&mut self, name: &HeaderName) {
        let key = name.eq_key();
        self.0.retain(|h| h.name.eq_key() != key);
    }

    pub fn retain(&mut self, mut f: impl FnMut(&RawHeader) -> bool) {
        self.0.retain(|h| f(h));
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawHeader> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
