//! The message parser (spec §4.1 "Parse contract" / "Body handling").
//!
//! Line splitting and folding are done by hand rather than through `nom`:
//! the grammar here is about byte accounting against configurable limits,
//! which reads more plainly as an explicit cursor loop than as combinators.
//! The leaf grammars (URI, Address, Via, CSeq, ...) stay combinator-based
//! in [`crate::codec::uri_parser`] and [`crate::message::typed`].

use crate::codec::limits::{FramingKind, Limits, ParseMode};
use crate::error::{Error, ParseError, ParseErrorKind};
use crate::message::headers::{HeaderName, Headers};
use crate::message::method::Method;
use crate::message::status::StatusCode;
use crate::message::{Envelope, HeadersExt, Message, Request, Response};
use crate::message::uri::Uri;

/// Parses and serializes messages against a fixed set of limits and a
/// strictness mode. Cheap to construct; holds no mutable state.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub limits: Limits,
    pub mode: ParseMode,
    pub framing: FramingKind,
}

impl Default for Codec {
    fn default() -> Self {
        Codec {
            limits: Limits::default(),
            mode: ParseMode::Strict,
            framing: FramingKind::Datagram,
        }
    }
}

impl Codec {
    pub fn new(limits: Limits, mode: ParseMode, framing: FramingKind) -> Self {
        Codec {
            limits,
            mode,
            framing,
        }
    }

    pub fn parse(&self, input: &[u8]) -> Result<Message, Error> {
        if input.len() > self.limits.max_message_size {
            return Err(Error::Parse(ParseError::new(ParseErrorKind::MessageTooLarge)));
        }

        let (raw_lines, body_start) = split_header_lines(input)?;
        if raw_lines.is_empty() {
            return Err(Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)));
        }

        let folded = fold_lines(raw_lines);
        let start_line = std::str::from_utf8(&folded[0])
            .map_err(|_| Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)))?
            .to_string();
        let header_lines = &folded[1..];

        if header_lines.len() > self.limits.max_header_count {
            return Err(Error::Parse(ParseError::new(ParseErrorKind::TooManyHeaders)));
        }

        let mut headers = Headers::new();
        for raw in header_lines {
            if raw.len() > self.limits.max_header_size {
                return Err(Error::Parse(ParseError::new(ParseErrorKind::HeaderTooLarge)));
            }
            let line = std::str::from_utf8(raw)
                .map_err(|_| Error::Parse(ParseError::new(ParseErrorKind::InvalidHeader)))?;
            let (name, value) = split_header_line(line)?;
            headers.push(HeaderName::parse(name.trim()), value.trim().to_string());
        }

        let remainder = &input[body_start..];
        let body = self.take_body(&headers, remainder)?;

        let message = if let Some(rest) = start_line.strip_prefix("SIP/") {
            parse_status_line(rest, headers, body)?
        } else {
            parse_request_line(&start_line, headers, body)?
        };

        if self.mode == ParseMode::Strict {
            validate_mandatory(&message)?;
        }

        Ok(message)
    }

    fn take_body(&self, headers: &Headers, remainder: &[u8]) -> Result<Vec<u8>, Error> {
        match headers
            .get(&HeaderName::ContentLength)
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            Some(declared) => {
                if declared > remainder.len() {
                    return Err(Error::Parse(ParseError::new(ParseErrorKind::BodyLengthMismatch {
                        expected: declared,
                        actual: remainder.len(),
                    })));
                }
                Ok(remainder[..declared].to_vec())
            }
            None => match self.framing {
                FramingKind::Datagram => Ok(remainder.to_vec()),
                FramingKind::Stream => Err(Error::Parse(ParseError::new(
                    ParseErrorKind::MissingContentLengthOnStream,
                ))),
            },
        }
    }
}

/// Splits `input` into raw header-block lines (start line + header lines,
/// CRLF or bare LF terminated) and returns the byte offset where the body
/// begins, i.e. right after the blank line that ends the header block.
fn split_header_lines(input: &[u8]) -> Result<(Vec<&[u8]>, usize), Error> {
    let mut lines = Vec::new();
    let mut cursor = 0usize;
    loop {
        if cursor >= input.len() {
            return Ok((lines, cursor));
        }
        let rest = &input[cursor..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = strip_trailing_cr(&rest[..pos]);
                let next = cursor + pos + 1;
                if line.is_empty() {
                    return Ok((lines, next));
                }
                lines.push(line);
                cursor = next;
            }
            None => {
                let line = strip_trailing_cr(rest);
                if !line.is_empty() {
                    lines.push(line);
                }
                return Ok((lines, input.len()));
            }
        }
    }
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    }
}

/// Joins folded continuation lines (leading SP/HTAB) to the previous
/// header value with a single space, per spec §4.1.
fn fold_lines(lines: Vec<&[u8]>) -> Vec<Vec<u8>> {
    let mut folded: Vec<Vec<u8>> = Vec::new();
    for line in lines {
        let is_continuation = matches!(line.first(), Some(b' ') | Some(b'\t')) && !folded.is_empty();
        if is_continuation {
            let trimmed = trim_leading_ws(line);
            let last = folded.last_mut().expect("checked non-empty above");
            last.push(b' ');
            last.extend_from_slice(trimmed);
        } else {
            folded.push(line.to_vec());
        }
    }
    folded
}

fn trim_leading_ws(line: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < line.len() && (line[i] == b' ' || line[i] == b'\t') {
        i += 1;
    }
    &line[i..]
}

fn split_header_line(line: &str) -> Result<(&str, &str), Error> {
    match line.find(':') {
        Some(idx) => Ok((&line[..idx], &line[idx + 1..])),
        None => Err(Error::Parse(ParseError::new(ParseErrorKind::InvalidHeader))),
    }
}

fn parse_request_line(line: &str, headers: Headers, body: Vec<u8>) -> Result<Message, Error> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)))?;
    let uri = parts
        .next()
        .ok_or_else(|| Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)))?;
    let version = parts
        .next()
        .ok_or_else(|| Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)))?;
    if parts.next().is_some() {
        return Err(Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)));
    }
    check_version(version)?;

    let uri = Uri::parse(uri)?;
    let envelope = Envelope { headers, body };
    Ok(Message::Request(Request {
        method: Method::from(method),
        uri,
        envelope,
    }))
}

fn parse_status_line(rest_after_sip_slash: &str, headers: Headers, body: Vec<u8>) -> Result<Message, Error> {
    // rest_after_sip_slash is everything after "SIP/", e.g. "2.0 180 Ringing"
    let mut parts = rest_after_sip_slash.splitn(2, char::is_whitespace);
    let version_tail = parts.next().unwrap_or("");
    check_version(&format!("SIP/{}", version_tail))?;
    let rest = parts.next().unwrap_or("").trim_start();
    let mut status_parts = rest.splitn(2, char::is_whitespace);
    let code_str = status_parts
        .next()
        .ok_or_else(|| Error::Parse(ParseError::new(ParseErrorKind::InvalidStartLine)))?;
    let code: u16 = code_str
        .parse()
        .map_err(|_| Error::Parse(ParseError::new(ParseErrorKind::InvalidStatusCode)))?;
    if !(100..=699).contains(&code) {
        return Err(Error::Parse(ParseError::new(ParseErrorKind::InvalidStatusCode)));
    }
    let reason = status_parts.next().unwrap_or("").trim().to_string();
    let envelope = Envelope { headers, body };
    Ok(Message::Response(Response {
        status_code: StatusCode(code),
        reason,
        envelope,
    }))
}

/// `SIP/2.0` is a case-sensitive token in both strict and lenient modes.
fn check_version(version: &str) -> Result<(), Error> {
    if version == "SIP/2.0" {
        Ok(())
    } else {
        Err(Error::Parse(ParseError::new(ParseErrorKind::InvalidVersion)))
    }
}

fn validate_mandatory(message: &Message) -> Result<(), Error> {
    for name in [
        HeaderName::To,
        HeaderName::From,
        HeaderName::CallId,
        HeaderName::CSeq,
        HeaderName::Via,
    ] {
        if message.headers().get(&name).is_none() {
            return Err(Error::Parse(ParseError::new(
                ParseErrorKind::MissingMandatoryHeader(mandatory_name(&name)),
            )));
        }
    }
    match message {
        Message::Request(req) => {
            if req.headers().get(&HeaderName::MaxForwards).is_none() {
                return Err(Error::Parse(ParseError::new(
                    ParseErrorKind::MissingMandatoryHeader("Max-Forwards"),
                )));
            }
            if req.method.requires_contact() && req.headers().get(&HeaderName::Contact).is_none() {
                return Err(Error::Parse(ParseError::new(
                    ParseErrorKind::MissingMandatoryHeader("Contact"),
                )));
            }
            let cseq = req.cseq()?;
            if cseq.method != req.method {
                return Err(Error::Parse(ParseError::new(ParseErrorKind::CSeqMethodMismatch)));
            }
        }
        Message::Response(_) => {}
    }
    Ok(())
}

fn mandatory_name(name: &HeaderName) -> &'static str {
    match name {
        HeaderName::To => "To",
        HeaderName::From => "From",
        HeaderName::CallId => "Call-ID",
        HeaderName::CSeq => "CSeq",
        HeaderName::Via => "Via",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invite() -> Vec<u8> {
        concat!(
            "INVITE sip:bob@biloxi.com SIP/2.0\r\n",
            "Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bKnashds8\r\n",
            "Max-Forwards: 70\r\n",
            "To: Bob <sip:bob@biloxi.com>\r\n",
            "From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n",
            "Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n",
            "CSeq: 314159 INVITE\r\n",
            "Contact: <sip:alice@pc33.atlanta.com>\r\n",
            "Content-Length: 4\r\n",
            "\r\n",
            "body"
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn parses_well_formed_invite() {
        let codec = Codec::default();
        let msg = codec.parse(&sample_invite()).unwrap();
        let req = msg.as_request().unwrap();
        assert_eq!(req.method, Method::Invite);
        assert_eq!(req.body(), b"body");
        assert_eq!(req.cseq().unwrap().seq, 314159);
    }

    #[test]
    fn rejects_missing_mandatory_header_in_strict_mode() {
        let mut raw = String::from_utf8(sample_invite()).unwrap();
        raw = raw.replace("Max-Forwards: 70\r\n", "");
        let codec = Codec::default();
        let err = codec.parse(raw.as_bytes()).unwrap_err();
        matches!(err, Error::Parse(_));
    }

    #[test]
    fn lenient_mode_skips_mandatory_check() {
        let mut raw = String::from_utf8(sample_invite()).unwrap();
        raw = raw.replace("Max-Forwards: 70\r\n", "");
        let codec = Codec::new(Limits::default(), ParseMode::Lenient, FramingKind::Datagram);
        assert!(codec.parse(raw.as_bytes()).is_ok());
    }

    #[test]
    fn body_length_mismatch_is_rejected() {
        let raw = sample_invite();
        let raw_str = String::from_utf8(raw).unwrap().replace("Content-Length: 4", "Content-Length: 40");
        let codec = Codec::default();
        let err = codec.parse(raw_str.as_bytes()).unwrap_err();
        matches!(err, Error::Parse(_));
    }

    #[test]
    fn header_folding_joins_continuation_lines() {
        let raw = concat!(
            "OPTIONS sip:bob@biloxi.com SIP/2.0\r\n",
            "Via: SIP/2.0/UDP pc33.atlanta.com\r\n",
            " ;branch=z9hG4bKfold\r\n",
            "Max-Forwards: 70\r\n",
            "To: <sip:bob@biloxi.com>\r\n",
            "From: <sip:alice@atlanta.com>;tag=1\r\n",
            "Call-ID: fold-test\r\n",
            "CSeq: 1 OPTIONS\r\n",
            "Content-Length: 0\r\n",
            "\r\n"
        );
        let codec = Codec::default();
        let msg = codec.parse(raw.as_bytes()).unwrap();
        let via = msg.top_via().unwrap();
        assert_eq!(via.branch(), Some("z9hG4bKfold"));
    }
}
