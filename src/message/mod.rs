//! The SIP message model: URIs, addresses, headers, and the
//! Request/Response/Message types built from them (spec §3).

pub mod address;
pub mod headers;
pub mod message;
pub mod method;
pub mod status;
pub mod typed;
pub mod uri;

pub use address::Address;
pub use headers::{HeaderName, Headers, RawHeader};
pub use message::{Envelope, HeadersExt, Message, Request, Response};
pub use method::Method;
pub use status::{StatusCode, StatusCodeKind};
pub use typed::{address_with_uri, CSeq, SubState, SubscriptionState, Via};
pub use uri::{Host, ParamList, Scheme, Uri};
