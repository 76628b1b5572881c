//! The dialog engine (spec §4.3): route-set capture, CSeq discipline,
//! remote-target tracking, and in-dialog request construction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::dialog::id::DialogKey;
use crate::dialog::state::DialogState;
use crate::error::{Error, ValidationError};
use crate::message::{Address, HeaderName, HeadersExt, Method, Request, Response, Uri};
use crate::transaction::TransactionRole;

/// The mutable parts of a dialog, guarded by a single lock held across any
/// read-then-write sequence (spec §5's per-object-mutex license).
struct Mutable {
    state: DialogState,
    remote_tag: String,
    remote_cseq: Option<u32>,
    route_set: Option<Vec<Address>>,
    remote_target: Uri,
}

/// One established (or early) SIP dialog (spec §3.5).
pub struct DialogInner {
    pub role: TransactionRole,
    pub call_id: String,
    pub local_tag: String,
    pub local_uri: Address,
    pub remote_uri: Address,
    pub secure: bool,
    /// CSeq of the request that established this dialog (the INVITE), which
    /// ACK and CANCEL must reuse rather than the next allocatable sequence
    /// (spec §4.3 "ACK and CANCEL reuse the INVITE's sequence").
    establishing_cseq: u32,
    local_cseq: AtomicU32,
    state: Mutex<Mutable>,
}

impl DialogInner {
    /// Builds the early/local half of a dialog from the request that will
    /// establish it (UAC: the outgoing INVITE; UAS: the incoming INVITE).
    pub fn new(
        role: TransactionRole,
        call_id: impl Into<String>,
        local_tag: impl Into<String>,
        local_uri: Address,
        remote_uri: Address,
        remote_target: Uri,
        secure: bool,
        establishing_cseq: u32,
        initial_local_cseq: u32,
    ) -> Self {
        DialogInner {
            role,
            call_id: call_id.into(),
            local_tag: local_tag.into(),
            local_uri,
            remote_uri,
            secure,
            establishing_cseq,
            local_cseq: AtomicU32::new(initial_local_cseq),
            state: Mutex::new(Mutable {
                state: DialogState::Init,
                remote_tag: String::new(),
                remote_cseq: None,
                route_set: None,
                remote_target,
            }),
        }
    }

    pub fn state(&self) -> DialogState {
        self.state.lock().unwrap().state
    }

    pub fn remote_tag(&self) -> String {
        self.state.lock().unwrap().remote_tag.clone()
    }

    pub fn id(&self) -> DialogKey {
        let remote_tag = self.remote_tag();
        DialogKey::new(self.call_id.clone(), self.local_tag.clone(), remote_tag)
    }

    pub fn remote_target(&self) -> Uri {
        self.state.lock().unwrap().remote_target.clone()
    }

    pub fn route_set(&self) -> Vec<Address> {
        self.state.lock().unwrap().route_set.clone().unwrap_or_default()
    }

    fn set_state(&self, guard: &mut Mutable, new: DialogState) {
        guard.state = new;
    }

    /// First tagged response (UAC) or sent tagged provisional (UAS):
    /// captures the remote tag and, once, the route set (spec §4.3
    /// "Route set ... Computed exactly once per dialog").
    pub fn on_dialog_establishing_response(&self, response: &Response) -> Result<(), Error> {
        let to = response.to_address()?;
        let tag = to.tag().unwrap_or("").to_string();
        let mut guard = self.state.lock().unwrap();
        if guard.remote_tag.is_empty() && !tag.is_empty() {
            guard.remote_tag = tag;
        }
        if guard.route_set.is_none() {
            let mut records = response.record_route_set();
            if self.role == TransactionRole::Client {
                // UAC: top Record-Route becomes the first Route (spec §4.3).
            } else {
                records.reverse();
            }
            guard.route_set = Some(records);
        }
        if let Ok(contact) = response.contact_address() {
            guard.remote_target = contact.uri().cloned().unwrap_or(guard.remote_target.clone());
        }
        if response.status_code.is_provisional() {
            if !guard.remote_tag.is_empty() {
                self.set_state(&mut guard, DialogState::Early);
            } else {
                self.set_state(&mut guard, DialogState::Ringing);
            }
        } else if response.status_code.is_success() {
            self.set_state(&mut guard, DialogState::Confirmed);
        } else {
            self.set_state(&mut guard, DialogState::Terminated);
        }
        Ok(())
    }

    /// UAS side: captures the route set and remote target from the
    /// dialog-establishing request, then records the response being sent.
    pub fn on_dialog_establishing_request(&self, request: &Request) -> Result<(), Error> {
        let mut guard = self.state.lock().unwrap();
        if guard.route_set.is_none() {
            let mut records = request.record_route_set();
            records.reverse();
            guard.route_set = Some(records);
        }
        if let Ok(contact) = request.contact_address() {
            guard.remote_target = contact.uri().cloned().unwrap_or(guard.remote_target.clone());
        }
        Ok(())
    }

    pub fn on_local_response_sent(&self, response: &Response) {
        let mut guard = self.state.lock().unwrap();
        if response.status_code.is_provisional() {
            self.set_state(&mut guard, DialogState::Early);
        } else if response.status_code.is_success() {
            self.set_state(&mut guard, DialogState::Confirmed);
        } else {
            self.set_state(&mut guard, DialogState::Terminated);
        }
    }

    pub fn begin_terminating(&self) {
        let mut guard = self.state.lock().unwrap();
        self.set_state(&mut guard, DialogState::Terminating);
    }

    pub fn terminate(&self) {
        let mut guard = self.state.lock().unwrap();
        self.set_state(&mut guard, DialogState::Terminated);
    }

    pub fn update_remote_target(&self, uri: Uri) {
        self.state.lock().unwrap().remote_target = uri;
    }

    /// Allocates the next local CSeq for an outgoing non-ACK/CANCEL request
    /// (spec §4.3 "CSeq discipline").
    pub fn next_local_cseq(&self) -> u32 {
        self.local_cseq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_local_cseq(&self) -> u32 {
        self.local_cseq.load(Ordering::SeqCst)
    }

    /// Validates and records an incoming in-dialog request's CSeq (spec
    /// §4.3: first accepted unconditionally, subsequent must strictly
    /// increase; ACK never checked here).
    pub fn accept_remote_cseq(&self, method: &Method, seq: u32) -> Result<(), Error> {
        if *method == Method::Ack {
            return Ok(());
        }
        let mut guard = self.state.lock().unwrap();
        match guard.remote_cseq {
            None => {
                guard.remote_cseq = Some(seq);
                Ok(())
            }
            Some(last) if seq > last => {
                guard.remote_cseq = Some(seq);
                Ok(())
            }
            Some(_) => Err(Error::Validation(ValidationError {
                field: "CSeq".to_string(),
                reason: "in-dialog request CSeq did not strictly increase".to_string(),
            })),
        }
    }

    /// Builds an outgoing in-dialog request (spec §4.3 "Outgoing request
    /// construction within a dialog").
    pub fn build_request(&self, method: Method, reuse_cseq: Option<u32>) -> Request {
        let guard = self.state.lock().unwrap();
        let route_set = guard.route_set.clone().unwrap_or_default();
        let remote_target = guard.remote_target.clone();
        let remote_tag = guard.remote_tag.clone();
        drop(guard);

        let topmost_has_lr = route_set
            .first()
            .map(|a| a.param("lr").is_some())
            .unwrap_or(false);

        let request_uri = if route_set.is_empty() || topmost_has_lr {
            remote_target.clone()
        } else {
            route_set
                .first()
                .and_then(|a| a.uri().cloned())
                .unwrap_or_else(|| remote_target.clone())
        };

        let mut request = Request::new(method.clone(), request_uri);

        let to = self.remote_uri.clone().with_tag(remote_tag);
        let from = self.local_uri.clone().with_tag(self.local_tag.clone());
        request.headers_mut().push(HeaderName::From, from.to_string());
        request.headers_mut().push(HeaderName::To, to.to_string());
        request.headers_mut().push(HeaderName::CallId, self.call_id.clone());

        let seq = match method {
            Method::Ack | Method::Cancel => reuse_cseq.unwrap_or(self.establishing_cseq),
            _ => self.next_local_cseq(),
        };
        request
            .headers_mut()
            .push(HeaderName::CSeq, format!("{} {}", seq, method));
        request.headers_mut().push(HeaderName::MaxForwards, "70");

        if route_set.is_empty() {
            // no Route headers
        } else if topmost_has_lr {
            for r in &route_set {
                request.headers_mut().push(HeaderName::Route, r.to_string());
            }
        } else {
            for r in route_set.iter().skip(1) {
                request.headers_mut().push(HeaderName::Route, r.to_string());
            }
            request
                .headers_mut()
                .push(HeaderName::Route, Address::new(remote_target).to_string());
        }

        request
    }
}

pub type SharedDialog = Arc<DialogInner>;
