//! REFER-initiated subscription (spec §4.3 "REFER subscription", RFC 3515 /
//! RFC 3265). A successful REFER implicitly creates a subscription whose
//! NOTIFYs carry a `message/sipfrag` body tracking the referred call.

use std::sync::Mutex;

use crate::error::{Error, ValidationError};
use crate::message::typed::SubState;
use crate::message::{HeaderName, HeadersExt, Request, Response, StatusCode};

/// Parses the status line out of a `message/sipfrag` NOTIFY body
/// (`"SIP/2.0 200 OK"`), returning the status code.
fn parse_sipfrag_status(body: &[u8]) -> Option<StatusCode> {
    let text = std::str::from_utf8(body).ok()?;
    let first_line = text.lines().next()?;
    let mut parts = first_line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.eq_ignore_ascii_case("SIP/2.0") {
        return None;
    }
    let code: u16 = parts.next()?.parse().ok()?;
    Some(StatusCode(code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferSubscriptionState {
    Active,
    Terminated,
}

/// Tracks one REFER-created subscription from the 202 Accepted onward.
pub struct ReferSubscription {
    event_id: Option<String>,
    state: Mutex<ReferSubscriptionState>,
}

impl ReferSubscription {
    /// Created once the REFER receives its 2xx (spec §4.3).
    pub fn new(accepted: &Response) -> Result<Self, Error> {
        if !accepted.status_code.is_success() {
            return Err(Error::Validation(ValidationError {
                field: "REFER response".to_string(),
                reason: "a REFER subscription is only created on a 2xx response".to_string(),
            }));
        }
        Ok(ReferSubscription {
            event_id: accepted.headers().get(&HeaderName::Event).map(|s| s.to_string()),
            state: Mutex::new(ReferSubscriptionState::Active),
        })
    }

    pub fn state(&self) -> ReferSubscriptionState {
        *self.state.lock().unwrap()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ReferSubscriptionState::Active
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    /// Feeds an incoming NOTIFY in this subscription and returns the
    /// sip-fragment status it carries, if any. Terminates the
    /// subscription on an explicit `Subscription-State: terminated` or
    /// once the fragment reports a final (>=200) status (spec §4.3).
    pub fn on_notify(&self, notify: &Request) -> Option<StatusCode> {
        let sub_state = notify.subscription_state();
        let fragment_status = parse_sipfrag_status(notify.body());

        let mut terminated = matches!(sub_state.map(|s| s.state), Some(SubState::Terminated));
        if let Some(status) = fragment_status {
            if status.is_final() {
                terminated = true;
            }
        }
        if terminated {
            *self.state.lock().unwrap() = ReferSubscriptionState::Terminated;
        }
        fragment_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Method, Uri};

    fn accepted() -> Response {
        let mut r = Response::new(StatusCode::ACCEPTED);
        r.headers_mut().push(HeaderName::Event, "refer");
        r
    }

    fn notify_with_fragment(status_line: &str, sub_state: &str) -> Request {
        let mut n = Request::new(Method::Notify, Uri::parse("sip:alice@atlanta.com").unwrap());
        n.headers_mut().push(HeaderName::Event, "refer");
        n.headers_mut()
            .push(HeaderName::SubscriptionState, sub_state);
        n.set_body(status_line.as_bytes().to_vec());
        n
    }

    #[test]
    fn active_until_final_fragment() {
        let sub = ReferSubscription::new(&accepted()).unwrap();
        assert!(sub.is_active());

        let trying = notify_with_fragment("SIP/2.0 100 Trying", "active;expires=60");
        sub.on_notify(&trying);
        assert!(sub.is_active());

        let ok = notify_with_fragment("SIP/2.0 200 OK", "terminated;reason=noresource");
        sub.on_notify(&ok);
        assert_eq!(sub.state(), ReferSubscriptionState::Terminated);
    }

    #[test]
    fn terminates_on_final_fragment_without_explicit_terminated_state() {
        let sub = ReferSubscription::new(&accepted()).unwrap();
        let ok = notify_with_fragment("SIP/2.0 200 OK", "active;expires=0");
        sub.on_notify(&ok);
        assert_eq!(sub.state(), ReferSubscriptionState::Terminated);
    }
}
