//! Message parsing and serialization (spec §4.1).

pub mod builder;
pub mod limits;
pub mod parser;
pub mod uri_parser;

pub use builder::{encode_message, encode_request, encode_response};
pub use limits::{FramingKind, Limits, ParseMode};
pub use parser::Codec;
