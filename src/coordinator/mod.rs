//! The stack coordinator (spec §4.4): the single logical entity per local
//! endpoint that owns the transaction table, the dialog table, the UAS
//! observer registry, and the shared timer driver.

pub mod endpoint;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::coordinator::endpoint::{make_branch, Endpoint};
use crate::dialog::{DialogInner, DialogKey};
use crate::error::Error;
use crate::message::{HeadersExt, Message, Method, Request, Response};
use crate::transaction::{
    Observers, TimerFire, Transaction, TransactionKey, TransactionKind, TransactionRole,
};
use crate::transaction::timer::Timer;
use crate::transport::{Incoming, SipAddr, Transport};

/// Which FSM an incoming/outgoing request spawns (spec §4.2.3/§4.2.4 vs
/// §4.2.1/§4.2.2).
fn kind_for_request(method: &Method, role: TransactionRole) -> TransactionKind {
    let is_invite = matches!(method, Method::Invite);
    match (role, is_invite) {
        (TransactionRole::Client, true) => TransactionKind::ClientInvite,
        (TransactionRole::Client, false) => TransactionKind::ClientNonInvite,
        (TransactionRole::Server, true) => TransactionKind::ServerInvite,
        (TransactionRole::Server, false) => TransactionKind::ServerNonInvite,
    }
}

/// Detects a forwarding loop: the same branch token appearing twice in a
/// request's own Via list means it has already passed through this branch
/// once before (spec §7.2 "a loop-detected Via produces 482").
fn has_looped_via(request: &Request) -> bool {
    let mut seen = std::collections::HashSet::new();
    for raw in request.headers().get_all(&crate::message::HeaderName::Via) {
        if let Ok(via) = crate::message::Via::parse(raw) {
            if let Some(branch) = via.branch() {
                if !seen.insert(branch.to_string()) {
                    return true;
                }
            }
        }
    }
    false
}

pub type OnRequest = Box<dyn Fn(Request, Arc<Transaction>) + Send + Sync>;
pub type OnDialogRequest = Box<dyn Fn(Request, Arc<DialogInner>) + Send + Sync>;
pub type OnResponse = Box<dyn Fn(Response, Arc<Transaction>) + Send + Sync>;

/// Upward hooks the application registers (spec §6.3).
#[derive(Default)]
pub struct Hooks {
    pub on_request: Option<OnRequest>,
    pub on_dialog_request: Option<OnDialogRequest>,
    pub on_response: Option<OnResponse>,
}

/// The stack coordinator: one per local endpoint (spec §4.4).
pub struct Coordinator {
    pub endpoint: Arc<Endpoint>,
    transport: Arc<dyn Transport>,
    timers: Arc<Timer<TimerFire>>,
    transactions: RwLock<HashMap<TransactionKey, Arc<Transaction>>>,
    dialogs: RwLock<HashMap<DialogKey, Arc<DialogInner>>>,
    hooks: Mutex<Hooks>,
}

impl Coordinator {
    pub fn new(endpoint: Endpoint, transport: Arc<dyn Transport>) -> Arc<Self> {
        let coordinator = Arc::new(Coordinator {
            endpoint: Arc::new(endpoint),
            transport: transport.clone(),
            timers: Arc::new(Timer::new()),
            transactions: RwLock::new(HashMap::new()),
            dialogs: RwLock::new(HashMap::new()),
            hooks: Mutex::new(Hooks::default()),
        });
        let handler_coordinator = coordinator.clone();
        transport.on_message(Box::new(move |incoming: Incoming| {
            let coordinator = handler_coordinator.clone();
            tokio::spawn(async move {
                coordinator.on_incoming(incoming).await;
            });
        }));
        coordinator
    }

    pub fn set_hooks(&self, hooks: Hooks) {
        *self.hooks.lock().unwrap() = hooks;
    }

    pub fn register_dialog(&self, dialog: Arc<DialogInner>) {
        self.dialogs.write().unwrap().insert(dialog.id(), dialog);
    }

    pub fn find_dialog(&self, key: &DialogKey) -> Option<Arc<DialogInner>> {
        self.dialogs.read().unwrap().get(key).cloned()
    }

    pub fn remove_dialog(&self, key: &DialogKey) {
        self.dialogs.write().unwrap().remove(key);
    }

    /// Starts the shared timer driver as a background task. The returned
    /// handle can be dropped to stop polling; transactions already
    /// terminated are unaffected.
    pub fn spawn_timer_driver(self: &Arc<Self>, tick: Duration) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let fired = coordinator.timers.poll(Instant::now());
                for fire in fired {
                    let txn = coordinator.transactions.read().unwrap().get(&fire.key).cloned();
                    if let Some(txn) = txn {
                        if let Err(e) = txn.on_timer(fire.name).await {
                            warn!(key = %fire.key, ?fire.name, error = %e, "timer dispatch failed");
                        }
                    }
                }
            }
        })
    }

    /// Constructs and starts a client transaction for an application
    /// request (spec §4.4 "on outgoing application requests it
    /// constructs client transactions").
    pub async fn send_request(&self, request: Request, target: SipAddr) -> Result<Arc<Transaction>, Error> {
        let branch = request
            .headers()
            .get(&crate::message::HeaderName::Via)
            .and_then(|v| crate::message::Via::parse(v).ok())
            .and_then(|v| v.branch().map(|s| s.to_string()))
            .unwrap_or_else(make_branch);
        let key = TransactionKey::for_client_request(&request, &branch);
        let kind = kind_for_request(&request.method, TransactionRole::Client);
        let txn = Arc::new(Transaction::new(
            key.clone(),
            kind,
            request,
            self.transport.clone(),
            target,
            self.timers.clone(),
            self.endpoint.options.timer_base,
            Observers::default(),
        ));
        self.transactions.write().unwrap().insert(key, txn.clone());
        txn.start_client().await?;
        Ok(txn)
    }

    /// Sends a CANCEL for an in-progress client INVITE transaction, driven
    /// as its own NICT sharing the INVITE's branch (spec §4.2.2), rather
    /// than a single fire-and-forget send — so it gets retransmission
    /// (Timer E) and timeout (Timer F) behavior like any other non-INVITE
    /// client transaction, and its own final response is matched back to
    /// it rather than to the INVITE transaction.
    pub async fn send_cancel(&self, invite_txn: &Arc<Transaction>) -> Result<Arc<Transaction>, Error> {
        let cancel_request = invite_txn.cancel().await?;
        let key = TransactionKey::for_client_request(&cancel_request, &invite_txn.key.branch);
        let txn = Arc::new(Transaction::new(
            key.clone(),
            TransactionKind::ClientNonInvite,
            cancel_request,
            self.transport.clone(),
            invite_txn.remote.clone(),
            self.timers.clone(),
            self.endpoint.options.timer_base,
            Observers::default(),
        ));
        self.transactions.write().unwrap().insert(key, txn.clone());
        txn.start_client().await?;
        Ok(txn)
    }

    async fn on_incoming(&self, incoming: Incoming) {
        let source = incoming.source;
        match incoming.message {
            Message::Request(request) => self.on_incoming_request(request, source).await,
            Message::Response(response) => self.on_incoming_response(response).await,
        }
    }

    /// Demultiplexes a response to its client transaction (spec §4.2.6:
    /// matched on `(branch, CSeq method)`, CANCEL normalized to INVITE).
    async fn on_incoming_response(&self, response: Response) {
        let via = match response.top_via() {
            Ok(v) => v,
            Err(_) => return,
        };
        let branch = via.branch().unwrap_or("").to_string();
        let cseq = match response.cseq() {
            Ok(c) => c,
            Err(_) => return,
        };
        let key = TransactionKey::new(branch, cseq.method, TransactionRole::Client);
        let txn = self.transactions.read().unwrap().get(&key).cloned();
        if let Some(txn) = txn {
            if let Some(cb) = self.hooks.lock().unwrap().on_response.as_ref() {
                cb(response.clone(), txn.clone());
            }
            if let Err(e) = txn.on_response(response).await {
                warn!(key = %key, error = %e, "response dispatch failed");
            }
        } else {
            debug!(key = %key, "response matched no client transaction");
        }
    }

    /// Demultiplexes an inbound request against existing server
    /// transactions, creating a new one when none matches (spec §4.2.6,
    /// §4.4).
    async fn on_incoming_request(&self, request: Request, source: SipAddr) {
        let via = match request.top_via() {
            Ok(v) => v,
            Err(_) => return,
        };
        let branch = via.branch().unwrap_or("").to_string();
        let key = TransactionKey::for_server_request(&request, &branch);

        let existing = self.transactions.read().unwrap().get(&key).cloned();
        if let Some(txn) = existing {
            if let Err(e) = txn.on_request(&request).await {
                warn!(key = %key, error = %e, "request re-dispatch failed");
            }
            return;
        }

        let kind = kind_for_request(&request.method, TransactionRole::Server);
        let txn = Arc::new(Transaction::new(
            key.clone(),
            kind,
            request.clone(),
            self.transport.clone(),
            source,
            self.timers.clone(),
            self.endpoint.options.timer_base,
            Observers::default(),
        ));
        self.transactions.write().unwrap().insert(key, txn.clone());

        if matches!(request.method, Method::Other(_)) {
            warn!(method = %request.method, "rejecting unsupported method");
            let response = self.endpoint.make_response(&request, crate::message::StatusCode::METHOD_NOT_ALLOWED, None);
            let _ = txn.respond(response).await;
            return;
        }

        if has_looped_via(&request) {
            warn!(key = %key, "rejecting request with a looped Via");
            let response = self.endpoint.make_response(&request, crate::message::StatusCode::LOOP_DETECTED, None);
            let _ = txn.respond(response).await;
            return;
        }

        if let Some(dialog) = self.dialog_for_request(&request) {
            let seq = request.cseq().map(|c| c.seq).unwrap_or(0);
            if let Err(e) = dialog.accept_remote_cseq(&request.method, seq) {
                warn!(error = %e, "rejecting in-dialog request with stale CSeq");
                let response = self.endpoint.make_response(&request, crate::message::StatusCode::SERVER_INTERNAL_ERROR, None);
                let _ = txn.respond(response).await;
                return;
            }
            if let Some(cb) = self.hooks.lock().unwrap().on_dialog_request.as_ref() {
                cb(request, dialog);
            }
        } else if let Some(cb) = self.hooks.lock().unwrap().on_request.as_ref() {
            cb(request, txn);
        }
    }

    fn dialog_for_request(&self, request: &Request) -> Option<Arc<DialogInner>> {
        let call_id = request.call_id().ok()?.to_string();
        let from_tag = request.from_address().ok()?.tag()?.to_string();
        let to_tag = request.to_address().ok().and_then(|t| t.tag().map(|s| s.to_string()));
        let dialogs = self.dialogs.read().unwrap();
        // We are the UAS: our local tag is the request's To-tag, the
        // remote tag is its From-tag.
        if let Some(to_tag) = to_tag {
            let key = DialogKey::new(call_id, to_tag, from_tag);
            return dialogs.get(&key).cloned();
        }
        None
    }
}
