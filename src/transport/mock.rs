//! An in-memory [`Transport`] used by this crate's own tests (spec §6.1
//! consumed at the interface boundary; no concrete carrier is shipped).
//!
//! Two `MockTransport`s can be wired together with [`MockTransport::connect`]
//! so that a `send` on one synchronously invokes the registered handler on
//! the other, simulating a lossless point-to-point link. `inject` lets a
//! test hand a message to a transport's handler directly, as if it had
//! arrived over the wire from an address nothing is wired to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::Message;
use crate::transport::{Incoming, SipAddr, Transport, MAX_DATAGRAM_SIZE};
use crate::error::TransportErrorKind;

type Handler = Box<dyn Fn(Incoming) + Send + Sync>;

struct Inner {
    local: SipAddr,
    reliable: bool,
    handler: Mutex<Option<Handler>>,
    sent: Mutex<Vec<(Message, SipAddr)>>,
    routes: Mutex<HashMap<SipAddr, Arc<Inner>>>,
}

#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    pub fn new(local: SipAddr, reliable: bool) -> Self {
        MockTransport {
            inner: Arc::new(Inner {
                local,
                reliable,
                handler: Mutex::new(None),
                sent: Mutex::new(Vec::new()),
                routes: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn local_addr(&self) -> &SipAddr {
        &self.inner.local
    }

    /// Wires two transports together bidirectionally so sends addressed
    /// to the other's `local_addr` are delivered synchronously.
    pub fn connect(&self, other: &MockTransport) {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert(other.inner.local.clone(), other.inner.clone());
        other
            .inner
            .routes
            .lock()
            .unwrap()
            .insert(self.inner.local.clone(), self.inner.clone());
    }

    pub fn sent_messages(&self) -> Vec<(Message, SipAddr)> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn clear_sent(&self) {
        self.inner.sent.lock().unwrap().clear();
    }

    /// Hands `message` to this transport's registered handler directly,
    /// as though it had just arrived from `source`.
    pub fn inject(&self, message: Message, source: SipAddr) {
        if let Some(handler) = self.inner.handler.lock().unwrap().as_ref() {
            handler(Incoming { message, source });
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &Message, target: &SipAddr) -> Result<(), TransportError> {
        let encoded = crate::codec::builder::encode_message(message);
        if !self.inner.reliable && encoded.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::new(
                TransportErrorKind::TooLarge,
                format!("{} bytes exceeds datagram limit", encoded.len()),
            ));
        }
        self.inner
            .sent
            .lock()
            .unwrap()
            .push((message.clone(), target.clone()));
        let peer = self.inner.routes.lock().unwrap().get(target).cloned();
        if let Some(peer) = peer {
            let handler = peer.handler.lock().unwrap();
            if let Some(handler) = handler.as_ref() {
                handler(Incoming {
                    message: message.clone(),
                    source: self.inner.local.clone(),
                });
            }
        }
        Ok(())
    }

    fn on_message(&self, handler: Box<dyn Fn(Incoming) + Send + Sync>) {
        *self.inner.handler.lock().unwrap() = Some(handler);
    }

    fn is_reliable(&self) -> bool {
        self.inner.reliable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Method, Request, Uri};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn connected_transports_deliver_synchronously() {
        let a = MockTransport::new(
            SipAddr::new("127.0.0.1:5060".parse::<SocketAddr>().unwrap(), "UDP"),
            false,
        );
        let b = MockTransport::new(
            SipAddr::new("127.0.0.1:5061".parse::<SocketAddr>().unwrap(), "UDP"),
            false,
        );
        a.connect(&b);

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        b.on_message(Box::new(move |_incoming| {
            received_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let req = Request::new(Method::Options, Uri::parse("sip:bob@biloxi.com").unwrap());
        a.send(&Message::Request(req), b.local_addr()).await.unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert_eq!(a.sent_messages().len(), 1);
    }
}
