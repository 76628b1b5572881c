use std::fmt;

use crate::error::{Error, ValidationError};
use crate::message::address::Address;
use crate::message::headers::{HeaderName, Headers};
use crate::message::method::Method;
use crate::message::status::StatusCode;
use crate::message::typed::{CSeq, SubscriptionState, Via};
use crate::message::uri::Uri;

/// Fields shared between Request and Response (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new() -> Self {
        Envelope {
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Recomputes Content-Length from the current body, per spec §3.3
    /// invariant (a).
    pub fn sync_content_length(&mut self) {
        self.headers
            .unique_push(HeaderName::ContentLength, self.body.len().to_string());
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope::new()
    }
}

fn missing(name: &'static str) -> Error {
    Error::Validation(ValidationError {
        field: name.to_string(),
        reason: "missing mandatory header".to_string(),
    })
}

/// Shared header accessors used by both Request and Response.
pub trait HeadersExt {
    fn headers(&self) -> &Headers;

    fn call_id(&self) -> Result<&str, Error> {
        self.headers()
            .get(&HeaderName::CallId)
            .ok_or_else(|| missing("Call-ID"))
    }

    fn cseq(&self) -> Result<CSeq, Error> {
        let raw = self
            .headers()
            .get(&HeaderName::CSeq)
            .ok_or_else(|| missing("CSeq"))?;
        CSeq::parse(raw)
    }

    fn via_headers(&self) -> Vec<Via> {
        self.headers()
            .get_all(&HeaderName::Via)
            .into_iter()
            .filter_map(|v| Via::parse(v).ok())
            .collect()
    }

    fn top_via(&self) -> Result<Via, Error> {
        let raw = self
            .headers()
            .get(&HeaderName::Via)
            .ok_or_else(|| missing("Via"))?;
        Via::parse(raw)
    }

    fn from_address(&self) -> Result<Address, Error> {
        let raw = self
            .headers()
            .get(&HeaderName::From)
            .ok_or_else(|| missing("From"))?;
        Address::parse(raw).map_err(Error::from)
    }

    fn to_address(&self) -> Result<Address, Error> {
        let raw = self
            .headers()
            .get(&HeaderName::To)
            .ok_or_else(|| missing("To"))?;
        Address::parse(raw).map_err(Error::from)
    }

    fn contact_address(&self) -> Result<Address, Error> {
        let raw = self
            .headers()
            .get(&HeaderName::Contact)
            .ok_or_else(|| missing("Contact"))?;
        Address::parse(raw).map_err(Error::from)
    }

    fn max_forwards(&self) -> Option<u8> {
        self.headers()
            .get(&HeaderName::MaxForwards)
            .and_then(|v| v.trim().parse().ok())
    }

    fn content_length(&self) -> Option<usize> {
        self.headers()
            .get(&HeaderName::ContentLength)
            .and_then(|v| v.trim().parse().ok())
    }

    fn route_set(&self) -> Vec<Address> {
        self.headers()
            .get_all(&HeaderName::Route)
            .into_iter()
            .filter_map(|v| Address::parse(v).ok())
            .collect()
    }

    fn record_route_set(&self) -> Vec<Address> {
        self.headers()
            .get_all(&HeaderName::RecordRoute)
            .into_iter()
            .filter_map(|v| Address::parse(v).ok())
            .collect()
    }

    fn expires(&self) -> Option<u32> {
        self.headers()
            .get(&HeaderName::Expires)
            .and_then(|v| v.trim().parse().ok())
    }

    fn subscription_state(&self) -> Option<SubscriptionState> {
        self.headers()
            .get(&HeaderName::SubscriptionState)
            .and_then(|v| SubscriptionState::parse(v).ok())
    }

    fn refer_to(&self) -> Option<Address> {
        self.headers()
            .get(&HeaderName::ReferTo)
            .and_then(|v| Address::parse(v).ok())
    }

    fn event(&self) -> Option<&str> {
        self.headers().get(&HeaderName::Event)
    }
}

/// A SIP request (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub envelope: Envelope,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Request {
            method,
            uri,
            envelope: Envelope::new(),
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.envelope.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.envelope.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.envelope.body = body;
        self.envelope.sync_content_length();
    }
}

impl HeadersExt for Request {
    fn headers(&self) -> &Headers {
        &self.envelope.headers
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = crate::codec::builder::encode_request(self);
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

/// A SIP response (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_code: StatusCode,
    pub reason: String,
    pub envelope: Envelope,
}

impl Response {
    pub fn new(status_code: StatusCode) -> Self {
        let reason = status_code.default_reason().to_string();
        Response {
            status_code,
            reason,
            envelope: Envelope::new(),
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.envelope.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.envelope.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.envelope.body = body;
        self.envelope.sync_content_length();
    }
}

impl HeadersExt for Response {
    fn headers(&self) -> &Headers {
        &self.envelope.headers
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = crate::codec::builder::encode_response(self);
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

/// A parsed SIP message: either a Request or a Response (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Message::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            _ => None,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Message::Request(r) => r.body(),
            Message::Response(r) => r.body(),
        }
    }
}

impl HeadersExt for Message {
    fn headers(&self) -> &Headers {
        match self {
            Message::Request(r) => r.headers(),
            Message::Response(r) => r.headers(),
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Message::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Request(r) => write!(f, "{}", r),
            Message::Response(r) => write!(f, "{}", r),
        }
    }
}
