use std::fmt;

/// SIP response status code (100-699, spec §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCodeKind {
    Provisional,
    Success,
    Redirection,
    ClientError,
    ServerError,
    GlobalFailure,
}

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const RINGING: StatusCode = StatusCode(180);
    pub const SESSION_PROGRESS: StatusCode = StatusCode(183);
    pub const OK: StatusCode = StatusCode(200);
    pub const ACCEPTED: StatusCode = StatusCode(202);
    pub const MOVED_TEMPORARILY: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const LOOP_DETECTED: StatusCode = StatusCode(482);
    pub const REQUEST_TERMINATED: StatusCode = StatusCode(487);
    pub const CALL_TRANSACTION_DOES_NOT_EXIST: StatusCode = StatusCode(481);
    pub const BUSY_HERE: StatusCode = StatusCode(486);
    pub const SERVER_INTERNAL_ERROR: StatusCode = StatusCode(500);
    pub const PROXY_AUTHENTICATION_REQUIRED: StatusCode = StatusCode(407);

    pub fn kind(&self) -> StatusCodeKind {
        match self.0 {
            100..=199 => StatusCodeKind::Provisional,
            200..=299 => StatusCodeKind::Success,
            300..=399 => StatusCodeKind::Redirection,
            400..=499 => StatusCodeKind::ClientError,
            500..=599 => StatusCodeKind::ServerError,
            _ => StatusCodeKind::GlobalFailure,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self.kind(), StatusCodeKind::Provisional)
    }

    pub fn is_final(&self) -> bool {
        !self.is_provisional()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.kind(), StatusCodeKind::Success)
    }

    /// A reasonable default reason phrase for statuses that don't carry
    /// one explicitly (e.g. synthesized responses).
    pub fn default_reason(&self) -> &'static str {
        match self.0 {
            100 => "Trying",
            180 => "Ringing",
            181 => "Call Is Being Forwarded",
            182 => "Queued",
            183 => "Session Progress",
            200 => "OK",
            202 => "Accepted",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Moved Temporarily",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            481 => "Call/Transaction Does Not Exist",
            482 => "Loop Detected",
            486 => "Busy Here",
            487 => "Request Terminated",
            407 => "Proxy Authentication Required",
            500 => "Server Internal Error",
            501 => "Not Implemented",
            503 => "Service Unavailable",
            600 => "Busy Everywhere",
            603 => "Decline",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for StatusCode {
    fn from(v: u16) -> Self {
        StatusCode(v)
    }
}
