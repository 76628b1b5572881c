//! Deterministic message serializer (spec §4.1 "Serialize contract",
//! §6.2 "Wire format").
//!
//! Emit order is: Via (in original relative order), Route, Max-Forwards,
//! From, To, Call-ID, CSeq, Contact, then every other header in its
//! original insertion order, with Content-Length always last and always
//! recomputed from the actual body length. Compact forms are never
//! emitted — headers are written under their canonical name.

use crate::message::headers::{HeaderName, Headers};
use crate::message::{Message, Request, Response};

pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(format!("{} {} SIP/2.0\r\n", req.method, req.uri).as_bytes());
    encode_headers_and_body(&mut buf, &req.envelope.headers, &req.envelope.body);
    buf
}

pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(format!("SIP/2.0 {} {}\r\n", resp.status_code.0, resp.reason).as_bytes());
    encode_headers_and_body(&mut buf, &resp.envelope.headers, &resp.envelope.body);
    buf
}

pub fn encode_message(msg: &Message) -> Vec<u8> {
    match msg {
        Message::Request(r) => encode_request(r),
        Message::Response(r) => encode_response(r),
    }
}

const LEADING_ORDER: [HeaderName; 8] = [
    HeaderName::Via,
    HeaderName::Route,
    HeaderName::MaxForwards,
    HeaderName::From,
    HeaderName::To,
    HeaderName::CallId,
    HeaderName::CSeq,
    HeaderName::Contact,
];

fn encode_headers_and_body(buf: &mut Vec<u8>, headers: &Headers, body: &[u8]) {
    for name in LEADING_ORDER.iter() {
        for h in headers.iter().filter(|h| &h.name == name) {
            buf.extend_from_slice(format!("{}: {}\r\n", h.name, h.value).as_bytes());
        }
    }
    for h in headers
        .iter()
        .filter(|h| !LEADING_ORDER.contains(&h.name) && h.name != HeaderName::ContentLength)
    {
        buf.extend_from_slice(format!("{}: {}\r\n", h.name, h.value).as_bytes());
    }
    buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);
}
