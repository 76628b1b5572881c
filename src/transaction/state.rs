use std::time::Duration;

/// RFC 3261 §17.1.1.1 timer bases (spec §3.6). `T1` is the round-trip-time
/// estimate all the other named timers scale from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerBase {
    pub t1: Duration,
    pub t2: Duration,
    pub t4: Duration,
}

impl Default for TimerBase {
    fn default() -> Self {
        TimerBase {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
        }
    }
}

impl TimerBase {
    pub fn a(&self) -> Duration {
        self.t1
    }
    pub fn b(&self) -> Duration {
        self.t1 * 64
    }
    pub fn d(&self) -> Duration {
        Duration::from_secs(32)
    }
    pub fn e(&self) -> Duration {
        self.t1
    }
    pub fn f(&self) -> Duration {
        self.t1 * 64
    }
    pub fn g(&self) -> Duration {
        self.t1
    }
    pub fn h(&self) -> Duration {
        self.t1 * 64
    }
    pub fn i(&self) -> Duration {
        self.t4
    }
    pub fn j(&self) -> Duration {
        self.t1 * 64
    }
    pub fn k(&self) -> Duration {
        self.t4
    }
}

/// Which FSM a transaction runs, tagged rather than expressed through
/// inheritance (spec §9 "Tagged variants in place of inheritance").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ClientNonInvite,
    ClientInvite,
    ServerNonInvite,
    ServerInvite,
}

/// The union of all four FSMs' states (spec §4.2.1–§4.2.4). Not every
/// state is reachable from every kind; `Transaction::state` only ever
/// holds one that is valid for its own `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Trying,
    Calling,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

/// The RFC 3261 transaction timers (spec §3.6), named as in the RFC
/// rather than by what they do. `C` is a proxy-only timer (dialog
/// forwarding is out of scope per spec §1) and is never armed here; it
/// stays in the enum because it's part of the named timer vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}
