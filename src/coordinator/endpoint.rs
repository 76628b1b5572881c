//! Endpoint configuration and message-construction helpers (spec §4.4).
//! `EndpointOptions` carries the knobs the coordinator is built from;
//! `make_request`/`make_response` build the mandatory-header skeleton of
//! an outgoing message the way the transaction/dialog layers need it.

use uuid::Uuid;

use crate::codec::{Codec, Limits};
use crate::message::{HeaderName, Method, Request, Response, StatusCode, Uri};
use crate::transaction::TimerBase;

/// Generates a fresh RFC 3261 `branch` token, always prefixed with the
/// magic cookie so downstream stacks recognize RFC 3261-compliant
/// transaction matching.
pub fn make_branch() -> String {
    format!("z9hG4bK{}", Uuid::new_v4().simple())
}

/// Generates a fresh From/To tag.
pub fn make_tag() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generates a fresh Call-ID, optionally suffixed with a host/domain.
pub fn make_call_id(suffix: Option<&str>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    match suffix {
        Some(s) => format!("{}@{}", id, s),
        None => id,
    }
}

/// Endpoint-wide configuration (spec §4.4 "Single logical entity per
/// local endpoint").
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    pub user_agent: String,
    pub callid_suffix: Option<String>,
    pub timer_base: TimerBase,
    pub codec_limits: Limits,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        EndpointOptions {
            user_agent: "sipstack".to_string(),
            callid_suffix: None,
            timer_base: TimerBase::default(),
            codec_limits: Limits::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndpointBuilder {
    options: EndpointOptions,
}

impl EndpointBuilder {
    pub fn new() -> Self {
        EndpointBuilder::default()
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = ua.into();
        self
    }

    pub fn with_callid_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.options.callid_suffix = Some(suffix.into());
        self
    }

    pub fn with_timer_base(mut self, timer_base: TimerBase) -> Self {
        self.options.timer_base = timer_base;
        self
    }

    pub fn with_codec_limits(mut self, limits: Limits) -> Self {
        self.options.codec_limits = limits;
        self
    }

    pub fn build(self) -> Endpoint {
        Endpoint {
            codec: Codec::new(
                self.options.codec_limits,
                crate::codec::ParseMode::Strict,
                crate::codec::FramingKind::Datagram,
            ),
            options: self.options,
        }
    }
}

/// Message-construction and codec surface shared by every component that
/// needs to mint a request/response (transactions, dialogs).
pub struct Endpoint {
    pub options: EndpointOptions,
    pub codec: Codec,
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    /// Builds the mandatory-header skeleton of an outgoing request: Via,
    /// Call-ID, From, To, CSeq, Max-Forwards, User-Agent (spec §4.4).
    pub fn make_request(
        &self,
        method: Method,
        request_uri: Uri,
        via: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        seq: u32,
    ) -> Request {
        let mut request = Request::new(method.clone(), request_uri);
        request.headers_mut().push(HeaderName::Via, via.into());
        request.headers_mut().push(
            HeaderName::CallId,
            make_call_id(self.options.callid_suffix.as_deref()),
        );
        request.headers_mut().push(HeaderName::From, from.into());
        request.headers_mut().push(HeaderName::To, to.into());
        request
            .headers_mut()
            .push(HeaderName::CSeq, format!("{} {}", seq, method));
        request.headers_mut().push(HeaderName::MaxForwards, "70");
        request
            .headers_mut()
            .push(HeaderName::UserAgent, self.options.user_agent.clone());
        request
    }

    /// Builds a response skeleton from a request, copying only the
    /// headers RFC 3261 requires carried over (spec §4.4).
    pub fn make_response(&self, request: &Request, status_code: StatusCode, body: Option<Vec<u8>>) -> Response {
        let mut response = Response::new(status_code);
        for name in [
            HeaderName::Via,
            HeaderName::CallId,
            HeaderName::From,
            HeaderName::To,
            HeaderName::CSeq,
            HeaderName::MaxForwards,
        ] {
            for value in request.headers().get_all(&name) {
                response.headers_mut().push(name.clone(), value.to_string());
            }
        }
        response
            .headers_mut()
            .push(HeaderName::UserAgent, self.options.user_agent.clone());
        if let Some(body) = body {
            response.set_body(body);
        }
        response
    }
}
