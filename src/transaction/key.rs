use std::fmt;

use crate::message::{Method, Request};

/// Which side of the transaction this key identifies (spec §3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionRole {
    Client,
    Server,
}

/// `(branch, method-for-matching, role)` (spec §3.4). CANCEL shares the
/// INVITE's branch but runs as its own NICT (spec §4.2.2), so it is keyed
/// under its own method — only an inbound ACK is normalized to the
/// INVITE's method, since an ACK to a non-2xx is absorbed by the existing
/// server INVITE transaction rather than starting one of its own
/// (spec §4.2.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub branch: String,
    pub method: Method,
    pub role: TransactionRole,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, method: Method, role: TransactionRole) -> Self {
        TransactionKey {
            branch: branch.into(),
            method: method_for_matching(method),
            role,
        }
    }

    pub fn for_server_request(req: &Request, branch: &str) -> Self {
        TransactionKey::new(branch.to_string(), req.method.clone(), TransactionRole::Server)
    }

    pub fn for_client_request(req: &Request, branch: &str) -> Self {
        TransactionKey::new(branch.to_string(), req.method.clone(), TransactionRole::Client)
    }
}

/// An ACK matches on the INVITE's method (spec §4.2.6); CANCEL keeps its
/// own method since it is a distinct NICT sharing the INVITE's branch.
fn method_for_matching(method: Method) -> Method {
    match method {
        Method::Ack => Method::Invite,
        other => other,
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            TransactionRole::Client => "client",
            TransactionRole::Server => "server",
        };
        write!(f, "{}/{}/{}", self.branch, self.method, role)
    }
}
