//! REGISTER client helper. Builds and tracks a registration against a
//! registrar; the caller resolves the registrar's address and drives the
//! transaction, since DNS/interface discovery is outside this crate's
//! scope.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::message::{Address, HeaderName, HeadersExt, Method, Request, Uri};

/// Authentication credential for a digest challenge (RFC 3261 §22).
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub realm: Option<String>,
}

/// Tracks one registration binding's sequence number and last-known
/// expiry across repeated REGISTER/refresh cycles.
pub struct Registration {
    pub aor: Address,
    pub contact: Address,
    pub credential: Option<Credential>,
    last_seq: AtomicU32,
    call_id: String,
}

impl Registration {
    pub fn new(aor: Address, contact: Address, credential: Option<Credential>, call_id: impl Into<String>) -> Self {
        Registration {
            aor,
            contact,
            credential,
            last_seq: AtomicU32::new(0),
            call_id: call_id.into(),
        }
    }

    fn next_seq(&self) -> u32 {
        self.last_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Builds a REGISTER request with the given `expires`. Pass `0` to
    /// unregister a specific binding; pass an `Address::Wildcard` contact
    /// via [`Registration::build_unregister_all`] to remove every binding.
    pub fn build_register(&self, registrar: Uri, expires: u32) -> Request {
        let seq = self.next_seq();
        let mut request = Request::new(Method::Register, registrar);
        request
            .headers_mut()
            .push(HeaderName::From, self.aor.to_string());
        request
            .headers_mut()
            .push(HeaderName::To, self.aor.to_string());
        request
            .headers_mut()
            .push(HeaderName::CallId, self.call_id.clone());
        request
            .headers_mut()
            .push(HeaderName::CSeq, format!("{} REGISTER", seq));
        request.headers_mut().push(HeaderName::MaxForwards, "70");
        request
            .headers_mut()
            .push(HeaderName::Contact, self.contact.to_string());
        request
            .headers_mut()
            .push(HeaderName::Expires, expires.to_string());
        request
    }

    pub fn build_unregister_all(&self, registrar: Uri) -> Request {
        let seq = self.next_seq();
        let mut request = Request::new(Method::Register, registrar);
        request
            .headers_mut()
            .push(HeaderName::From, self.aor.to_string());
        request
            .headers_mut()
            .push(HeaderName::To, self.aor.to_string());
        request
            .headers_mut()
            .push(HeaderName::CallId, self.call_id.clone());
        request
            .headers_mut()
            .push(HeaderName::CSeq, format!("{} REGISTER", seq));
        request.headers_mut().push(HeaderName::MaxForwards, "70");
        request.headers_mut().push(HeaderName::Contact, "*");
        request.headers_mut().push(HeaderName::Expires, "0");
        request
    }

    /// Reads the granted expiry back off a 200 OK, falling back to the
    /// value this Contact was registered with if the response omits one.
    pub fn expires_from_response(&self, response: &crate::message::Response, requested: u32) -> u32 {
        response
            .contact_address()
            .ok()
            .and_then(|c| c.expires())
            .or_else(|| response.expires())
            .unwrap_or(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Uri;

    #[test]
    fn register_cseq_increments_per_call() {
        let aor = Address::parse("sip:alice@atlanta.com").unwrap();
        let contact = Address::parse("sip:alice@192.168.1.100:5060").unwrap();
        let reg = Registration::new(aor, contact, None, "reg-call-id@atlanta.com");
        let registrar = Uri::parse("sip:registrar.atlanta.com").unwrap();

        let r1 = reg.build_register(registrar.clone(), 3600);
        let r2 = reg.build_register(registrar, 3600);
        assert_eq!(r1.cseq().unwrap().seq, 0);
        assert_eq!(r2.cseq().unwrap().seq, 1);
    }
}
