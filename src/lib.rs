//! A SIP user-agent protocol engine: message codec, transaction engine,
//! dialog engine, and the stack coordinator tying them together (RFC
//! 3261 core, REFER/RFC 3515, event subscription/RFC 3265).
//!
//! No concrete network carrier ships here — applications implement
//! [`transport::Transport`] over their own sockets/streams and hand the
//! coordinator parsed messages; [`transport::mock`] is provided for this
//! crate's own tests.

pub mod codec;
pub mod coordinator;
pub mod dialog;
pub mod error;
pub mod message;
pub mod transaction;
pub mod transport;

pub use error::{Error, Result};
