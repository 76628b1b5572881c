//! The transaction layer (spec §4.2): client/server, INVITE/non-INVITE
//! finite state machines behind one [`transaction::Transaction`] type.

pub mod key;
pub mod state;
pub mod timer;
pub mod transaction;

pub use key::{TransactionKey, TransactionRole};
pub use state::{TimerBase, TimerName, TransactionKind, TransactionState};
pub use timer::Timer;
pub use transaction::{Observers, ResponseObserver, StateObserver, TimeoutObserver, TimerFire, Transaction};
