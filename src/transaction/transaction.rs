//! The four transaction FSMs (spec §4.2), unified behind one `Transaction`
//! type tagged by [`TransactionKind`] rather than expressed through
//! inheritance (spec §9). State is guarded by a single `tokio::sync::Mutex`
//! held across each read-then-write sequence — the single-writer-per-object
//! discipline spec §5 asks for, implemented as a lock rather than an actor
//! task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::Error;
use crate::message::headers::HeaderName;
use crate::message::{HeadersExt, Message, Method, Request, Response};
use crate::transaction::key::TransactionKey;
use crate::transaction::state::{TimerBase, TimerName, TransactionKind, TransactionState};
use crate::transaction::timer::Timer;
use crate::transport::{SipAddr, Transport};

/// A scheduled transaction timer, keyed so the coordinator's shared timer
/// wheel can route a firing back to the owning transaction (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFire {
    pub key: TransactionKey,
    pub name: TimerName,
}

pub type ResponseObserver = Box<dyn Fn(&Response) + Send + Sync>;
pub type StateObserver = Box<dyn Fn(TransactionState, TransactionState) + Send + Sync>;
pub type TimeoutObserver = Box<dyn Fn() + Send + Sync>;

/// Observer callback slots every transaction owns (spec §4.2 "Every
/// transaction additionally owns ... observer callback slots").
#[derive(Default)]
pub struct Observers {
    pub on_response: Option<ResponseObserver>,
    pub on_state_change: Option<StateObserver>,
    pub on_timeout: Option<TimeoutObserver>,
}

struct Inner {
    state: TransactionState,
    responses: Vec<Response>,
    timer_ids: HashMap<TimerName, u64>,
    retransmit_interval: Duration,
    cancel_sent: bool,
    observers: Observers,
}

pub struct Transaction {
    pub key: TransactionKey,
    pub kind: TransactionKind,
    pub request: Request,
    pub reliable: bool,
    pub remote: SipAddr,
    transport: Arc<dyn Transport>,
    timers: Arc<Timer<TimerFire>>,
    timer_base: TimerBase,
    inner: tokio::sync::Mutex<Inner>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: TransactionKey,
        kind: TransactionKind,
        request: Request,
        transport: Arc<dyn Transport>,
        remote: SipAddr,
        timers: Arc<Timer<TimerFire>>,
        timer_base: TimerBase,
        observers: Observers,
    ) -> Self {
        let reliable = transport.is_reliable();
        let initial_state = match kind {
            TransactionKind::ClientNonInvite | TransactionKind::ServerNonInvite => TransactionState::Trying,
            TransactionKind::ClientInvite => TransactionState::Calling,
            TransactionKind::ServerInvite => TransactionState::Proceeding,
        };
        Transaction {
            key,
            kind,
            reliable,
            remote,
            transport,
            timers,
            timer_base,
            request,
            inner: tokio::sync::Mutex::new(Inner {
                state: initial_state,
                responses: Vec::new(),
                timer_ids: HashMap::new(),
                retransmit_interval: timer_base.a(),
                cancel_sent: false,
                observers,
            }),
        }
    }

    pub async fn state(&self) -> TransactionState {
        self.inner.lock().await.state
    }

    pub async fn last_response(&self) -> Option<Response> {
        self.inner.lock().await.responses.last().cloned()
    }

    /// Entry actions for a freshly created client transaction: send the
    /// request and arm the retransmit/terminal timers (spec §4.2.1/§4.2.2).
    pub async fn start_client(&self) -> Result<(), Error> {
        self.send_raw(&Message::Request(self.request.clone())).await?;
        let mut inner = self.inner.lock().await;
        match self.kind {
            TransactionKind::ClientNonInvite => {
                if !self.reliable {
                    inner.retransmit_interval = self.timer_base.e();
                    self.arm(&mut inner, TimerName::E, self.timer_base.e());
                }
                self.arm(&mut inner, TimerName::F, self.timer_base.f());
            }
            TransactionKind::ClientInvite => {
                if !self.reliable {
                    inner.retransmit_interval = self.timer_base.a();
                    self.arm(&mut inner, TimerName::A, self.timer_base.a());
                }
                self.arm(&mut inner, TimerName::B, self.timer_base.b());
            }
            _ => {
                return Err(Error::TransactionError(
                    "start_client called on a server transaction".into(),
                    self.key.clone(),
                ))
            }
        }
        Ok(())
    }

    fn arm(&self, inner: &mut Inner, name: TimerName, after: Duration) {
        let id = self.timers.timeout(
            after,
            TimerFire {
                key: self.key.clone(),
                name,
            },
        );
        inner.timer_ids.insert(name, id);
    }

    fn disarm(&self, inner: &mut Inner, name: TimerName) {
        if let Some(id) = inner.timer_ids.remove(&name) {
            self.timers.cancel(id);
        }
    }

    async fn send_raw(&self, message: &Message) -> Result<(), Error> {
        self.transport.send(message, &self.remote).await?;
        Ok(())
    }

    fn set_state(&self, inner: &mut Inner, new: TransactionState) {
        let old = inner.state;
        if old == new {
            return;
        }
        inner.state = new;
        debug!(key = %self.key, ?old, ?new, "transaction state change");
        if let Some(cb) = &inner.observers.on_state_change {
            cb(old, new);
        }
    }

    /// Drives the NICT/ICT FSM on an inbound response (spec §4.2.1/§4.2.2).
    pub async fn on_response(&self, response: Response) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        match self.kind {
            TransactionKind::ClientNonInvite => self.on_response_nict(&mut inner, response).await,
            TransactionKind::ClientInvite => self.on_response_ict(&mut inner, response).await,
            _ => Err(Error::TransactionError(
                "on_response called on a server transaction".into(),
                self.key.clone(),
            )),
        }
    }

    async fn on_response_nict(&self, inner: &mut Inner, response: Response) -> Result<(), Error> {
        match inner.state {
            TransactionState::Completed | TransactionState::Terminated => {
                // Absorbed: a retransmission the peer sent before seeing
                // our implicit ACK-by-silence.
            }
            TransactionState::Trying | TransactionState::Proceeding => {
                let is_final = response.status_code.is_final();
                if let Some(cb) = &inner.observers.on_response {
                    cb(&response);
                }
                inner.responses.push(response);
                if is_final {
                    self.disarm(inner, TimerName::E);
                    self.disarm(inner, TimerName::F);
                    self.set_state(inner, TransactionState::Completed);
                    if self.reliable {
                        self.set_state(inner, TransactionState::Terminated);
                    } else {
                        self.arm(inner, TimerName::K, self.timer_base.k());
                    }
                } else {
                    self.set_state(inner, TransactionState::Proceeding);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_response_ict(&self, inner: &mut Inner, response: Response) -> Result<(), Error> {
        match inner.state {
            TransactionState::Terminated => {}
            TransactionState::Completed => {
                if response.status_code.is_final() && !response.status_code.is_success() {
                    self.send_ack(&response).await?;
                }
            }
            TransactionState::Calling | TransactionState::Proceeding => {
                self.disarm(inner, TimerName::A);
                if response.status_code.is_provisional() {
                    if let Some(cb) = &inner.observers.on_response {
                        cb(&response);
                    }
                    inner.responses.push(response);
                    self.set_state(inner, TransactionState::Proceeding);
                } else if response.status_code.is_success() {
                    self.disarm(inner, TimerName::B);
                    if let Some(cb) = &inner.observers.on_response {
                        cb(&response);
                    }
                    inner.responses.push(response);
                    self.set_state(inner, TransactionState::Terminated);
                } else {
                    self.disarm(inner, TimerName::B);
                    if let Some(cb) = &inner.observers.on_response {
                        cb(&response);
                    }
                    self.send_ack(&response).await?;
                    inner.responses.push(response);
                    self.set_state(inner, TransactionState::Completed);
                    if self.reliable {
                        self.set_state(inner, TransactionState::Terminated);
                    } else {
                        self.arm(inner, TimerName::D, self.timer_base.d());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Builds and sends the ACK for a non-2xx final response (spec §4.2.5).
    async fn send_ack(&self, response: &Response) -> Result<(), Error> {
        let ack = self.build_ack(response)?;
        self.send_raw(&Message::Request(ack)).await
    }

    fn build_ack(&self, response: &Response) -> Result<Request, Error> {
        let mut ack = Request::new(Method::Ack, self.request.uri.clone());
        let invite_cseq = self.request.cseq()?;
        if let Some(via) = self.request.headers().get(&HeaderName::Via) {
            ack.headers_mut().push(HeaderName::Via, via.to_string());
        }
        if let Some(from) = self.request.headers().get(&HeaderName::From) {
            ack.headers_mut().push(HeaderName::From, from.to_string());
        }
        if let Some(to) = response.headers().get(&HeaderName::To) {
            ack.headers_mut().push(HeaderName::To, to.to_string());
        }
        if let Some(call_id) = self.request.headers().get(&HeaderName::CallId) {
            ack.headers_mut().push(HeaderName::CallId, call_id.to_string());
        }
        ack.headers_mut()
            .push(HeaderName::CSeq, format!("{} ACK", invite_cseq.seq));
        ack.headers_mut().push(HeaderName::MaxForwards, "70");
        for route in self.request.headers().get_all(&HeaderName::Route) {
            ack.headers_mut().push(HeaderName::Route, route.to_string());
        }
        Ok(ack)
    }

    /// Fires on a retransmit timer (A/E/G) or a terminal timer
    /// (B/D/F/H/I/J/K); dispatch happens via the coordinator's timer
    /// driver (spec §4.4).
    pub async fn on_timer(&self, name: TimerName) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        match (self.kind, name) {
            (TransactionKind::ClientNonInvite, TimerName::E) => {
                if matches!(inner.state, TransactionState::Trying | TransactionState::Proceeding) {
                    self.send_raw(&Message::Request(self.request.clone())).await?;
                    let cap = self.timer_base.t2;
                    let next = if inner.state == TransactionState::Proceeding {
                        cap
                    } else {
                        (inner.retransmit_interval * 2).min(cap)
                    };
                    inner.retransmit_interval = next;
                    self.arm(&mut inner, TimerName::E, next);
                }
            }
            (TransactionKind::ClientNonInvite, TimerName::F) => self.timeout(&mut inner),
            (TransactionKind::ClientNonInvite, TimerName::K) => {
                self.set_state(&mut inner, TransactionState::Terminated)
            }
            (TransactionKind::ClientInvite, TimerName::A) => {
                if inner.state == TransactionState::Calling {
                    self.send_raw(&Message::Request(self.request.clone())).await?;
                    let next = (inner.retransmit_interval * 2).min(self.timer_base.t2);
                    inner.retransmit_interval = next;
                    self.arm(&mut inner, TimerName::A, next);
                }
            }
            (TransactionKind::ClientInvite, TimerName::B) => self.timeout(&mut inner),
            (TransactionKind::ClientInvite, TimerName::D) => {
                self.set_state(&mut inner, TransactionState::Terminated)
            }
            (TransactionKind::ServerNonInvite, TimerName::J) => {
                self.set_state(&mut inner, TransactionState::Terminated)
            }
            (TransactionKind::ServerInvite, TimerName::G) => {
                if inner.state == TransactionState::Completed {
                    if let Some(last) = inner.responses.last().cloned() {
                        self.send_raw(&Message::Response(last)).await?;
                    }
                    let next = (inner.retransmit_interval * 2).min(self.timer_base.t2);
                    inner.retransmit_interval = next;
                    self.arm(&mut inner, TimerName::G, next);
                }
            }
            (TransactionKind::ServerInvite, TimerName::H) => self.timeout(&mut inner),
            (TransactionKind::ServerInvite, TimerName::I) => {
                self.set_state(&mut inner, TransactionState::Terminated)
            }
            _ => {}
        }
        Ok(())
    }

    fn timeout(&self, inner: &mut Inner) {
        self.set_state(inner, TransactionState::Terminated);
        if let Some(cb) = &inner.observers.on_timeout {
            cb();
        }
    }

    /// Server-side: an inbound request retransmission or, for IST, an ACK
    /// (spec §4.2.3/§4.2.4).
    pub async fn on_request(&self, request: &Request) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        match self.kind {
            TransactionKind::ServerNonInvite => {
                if inner.state == TransactionState::Completed {
                    if let Some(last) = inner.responses.last().cloned() {
                        self.send_raw(&Message::Response(last)).await?;
                    }
                }
            }
            TransactionKind::ServerInvite => {
                if request.method == Method::Ack {
                    if inner.state == TransactionState::Completed {
                        self.disarm(&mut inner, TimerName::G);
                        self.disarm(&mut inner, TimerName::H);
                        self.set_state(&mut inner, TransactionState::Confirmed);
                        if self.reliable {
                            self.set_state(&mut inner, TransactionState::Terminated);
                        } else {
                            self.arm(&mut inner, TimerName::I, self.timer_base.i());
                        }
                    }
                    // ACK in Confirmed: absorbed (retransmission).
                } else if matches!(
                    inner.state,
                    TransactionState::Proceeding | TransactionState::Completed
                ) {
                    if let Some(last) = inner.responses.last().cloned() {
                        self.send_raw(&Message::Response(last)).await?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Application-driven: send a response on a server transaction
    /// (spec §4.2.3/§4.2.4).
    pub async fn respond(&self, response: Response) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if !matches!(self.kind, TransactionKind::ServerNonInvite | TransactionKind::ServerInvite) {
            return Err(Error::TransactionError(
                "respond called on a client transaction".into(),
                self.key.clone(),
            ));
        }
        self.send_raw(&Message::Response(response.clone())).await?;
        match self.kind {
            TransactionKind::ServerNonInvite => {
                if response.status_code.is_provisional() {
                    self.set_state(&mut inner, TransactionState::Proceeding);
                } else {
                    inner.responses.push(response);
                    self.set_state(&mut inner, TransactionState::Completed);
                    if self.reliable {
                        self.set_state(&mut inner, TransactionState::Terminated);
                    } else {
                        self.arm(&mut inner, TimerName::J, self.timer_base.j());
                    }
                }
            }
            TransactionKind::ServerInvite => {
                if response.status_code.is_success() {
                    self.set_state(&mut inner, TransactionState::Terminated);
                } else if response.status_code.is_provisional() {
                    // remains in Proceeding; further 1xx permitted
                } else {
                    inner.responses.push(response);
                    self.set_state(&mut inner, TransactionState::Completed);
                    if !self.reliable {
                        self.arm(&mut inner, TimerName::G, self.timer_base.g());
                    }
                    self.arm(&mut inner, TimerName::H, self.timer_base.h());
                }
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sends CANCEL for a pending client INVITE transaction (spec
    /// §4.2.2 "Cancel operation"). Only valid in Proceeding; repeated
    /// calls after the first are no-ops.
    /// Builds this INVITE transaction's CANCEL (spec §4.2.2). The CANCEL
    /// must be driven as its own NICT sharing the INVITE's branch — this
    /// only validates preconditions, builds the request once, and marks it
    /// issued so a second call is rejected rather than producing a
    /// duplicate CANCEL; the caller (`Coordinator::send_cancel`) registers
    /// and starts the actual client transaction.
    pub async fn cancel(&self) -> Result<Request, Error> {
        if self.kind != TransactionKind::ClientInvite {
            return Err(Error::TransactionError(
                "CANCEL is only valid on a client INVITE transaction".into(),
                self.key.clone(),
            ));
        }
        let mut inner = self.inner.lock().await;
        if inner.state != TransactionState::Proceeding {
            return Err(Error::TransactionError(
                "CANCEL is only valid while the INVITE transaction is in Proceeding".into(),
                self.key.clone(),
            ));
        }
        if inner.cancel_sent {
            return Err(Error::TransactionError(
                "CANCEL already issued for this transaction".into(),
                self.key.clone(),
            ));
        }
        let cancel = self.build_cancel(&inner)?;
        inner.cancel_sent = true;
        Ok(cancel)
    }

    fn build_cancel(&self, inner: &Inner) -> Result<Request, Error> {
        let mut cancel = Request::new(Method::Cancel, self.request.uri.clone());
        if let Some(via) = self.request.headers().get(&HeaderName::Via) {
            cancel.headers_mut().push(HeaderName::Via, via.to_string());
        }
        if let Some(from) = self.request.headers().get(&HeaderName::From) {
            cancel.headers_mut().push(HeaderName::From, from.to_string());
        }
        let to = inner
            .responses
            .iter()
            .find_map(|r| r.headers().get(&HeaderName::To))
            .or_else(|| self.request.headers().get(&HeaderName::To));
        if let Some(to) = to {
            cancel.headers_mut().push(HeaderName::To, to.to_string());
        }
        if let Some(call_id) = self.request.headers().get(&HeaderName::CallId) {
            cancel
                .headers_mut()
                .push(HeaderName::CallId, call_id.to_string());
        }
        let invite_cseq = self.request.cseq()?;
        cancel
            .headers_mut()
            .push(HeaderName::CSeq, format!("{} CANCEL", invite_cseq.seq));
        cancel.headers_mut().push(HeaderName::MaxForwards, "70");
        Ok(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::limits::FramingKind;
    use crate::message::{Method as M, StatusCode, Uri};
    use crate::transport::mock::MockTransport;
    use crate::transport::SipAddr as Addr;
    use std::net::SocketAddr;

    fn sample_request(method: M) -> Request {
        let mut req = Request::new(method.clone(), Uri::parse("sip:bob@biloxi.com").unwrap());
        req.headers_mut().push(HeaderName::Via, "SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds");
        req.headers_mut().push(HeaderName::From, "Alice <sip:alice@atlanta.com>;tag=1928301774");
        req.headers_mut().push(HeaderName::To, "Bob <sip:bob@biloxi.com>");
        req.headers_mut().push(HeaderName::CallId, "a84b4c76e66710@pc33.atlanta.com");
        req.headers_mut().push(HeaderName::CSeq, format!("314159 {}", method));
        req.headers_mut().push(HeaderName::MaxForwards, "70");
        req
    }

    fn local_addr(port: u16) -> Addr {
        Addr::new(format!("127.0.0.1:{}", port).parse::<SocketAddr>().unwrap(), "UDP")
    }

    #[tokio::test]
    async fn nict_terminates_on_final_response() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new(local_addr(5000), false));
        let timers = Arc::new(Timer::new());
        let req = sample_request(M::Options);
        let key = TransactionKey::for_client_request(&req, "z9hG4bK776asdhds");
        let txn = Transaction::new(
            key,
            TransactionKind::ClientNonInvite,
            req,
            transport,
            local_addr(5001),
            timers,
            TimerBase::default(),
            Observers::default(),
        );
        txn.start_client().await.unwrap();
        assert_eq!(txn.state().await, TransactionState::Trying);
        let mut resp = Response::new(StatusCode::OK);
        resp.headers_mut().push(HeaderName::CSeq, "314159 OPTIONS");
        txn.on_response(resp).await.unwrap();
        assert_eq!(txn.state().await, TransactionState::Terminated);
    }

    #[tokio::test]
    async fn ict_sends_ack_on_non_2xx() {
        let transport = Arc::new(MockTransport::new(local_addr(5002), false));
        let timers = Arc::new(Timer::new());
        let req = sample_request(M::Invite);
        let key = TransactionKey::for_client_request(&req, "z9hG4bK776asdhds");
        let txn = Transaction::new(
            key,
            TransactionKind::ClientInvite,
            req,
            transport.clone(),
            local_addr(5003),
            timers,
            TimerBase::default(),
            Observers::default(),
        );
        txn.start_client().await.unwrap();
        let mut ringing = Response::new(StatusCode::RINGING);
        ringing.headers_mut().push(HeaderName::To, "Bob <sip:bob@biloxi.com>;tag=a6c85cf");
        txn.on_response(ringing).await.unwrap();
        assert_eq!(txn.state().await, TransactionState::Proceeding);

        let mut busy = Response::new(StatusCode::BUSY_HERE);
        busy.headers_mut().push(HeaderName::To, "Bob <sip:bob@biloxi.com>;tag=a6c85cf");
        txn.on_response(busy).await.unwrap();
        assert_eq!(txn.state().await, TransactionState::Completed);

        let sent = transport.sent_messages();
        assert!(sent.iter().any(|(m, _)| m.as_request().map(|r| r.method == M::Ack).unwrap_or(false)));
    }

    #[tokio::test]
    async fn cancel_rejected_outside_proceeding() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new(local_addr(5004), false));
        let timers = Arc::new(Timer::new());
        let req = sample_request(M::Invite);
        let key = TransactionKey::for_client_request(&req, "z9hG4bK776asdhds");
        let txn = Transaction::new(
            key,
            TransactionKind::ClientInvite,
            req,
            transport,
            local_addr(5005),
            timers,
            TimerBase::default(),
            Observers::default(),
        );
        txn.start_client().await.unwrap();
        assert!(txn.cancel().await.is_err());
        let _ = FramingKind::Datagram;
    }
}
